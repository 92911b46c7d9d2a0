/// Migration import
///
/// Turns a claim URL or migration id into a project: reads and decodes the
/// on-chain migration account, resolves both tokens (mint + metadata +
/// off-chain JSON), picks the new token's best pool and writes the project,
/// its two pools and the migration between them.
use crate::config::Config;
use crate::decoder::{
    decode_metadata_account, decode_migration_account, decode_mint_account, extract_migration_id,
    metadata_pda, migration_pda, MetadataFetcher, MigrationAccountRecord, MigrationLayout,
    MigrationStatus, TokenInfo,
};
use crate::discovery::{DiscoveredPool, PoolDiscovery};
use crate::errors::{SyncError, SyncResult};
use crate::ledger::LedgerRpc;
use crate::logger::{self, LogTag};
use crate::scanner::BurnSource;
use crate::storage::{
    BurnSourceRecord, ImportedProject, MigrationRecord, NewProject, PoolRecord, ProjectImport,
    ProjectRecord, SyncStore,
};
use chrono::Utc;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOptions {
    pub dry_run: bool,
    /// Register the new token's mint as a burn source
    pub track_burns: bool,
}

#[derive(Debug, Clone)]
pub struct ImportOutcome {
    pub account: MigrationAccountRecord,
    pub status: MigrationStatus,
    pub old_token: TokenInfo,
    pub new_token: TokenInfo,
    /// Stored project, `None` in dry run
    pub project: Option<ProjectRecord>,
    pub planned_project: NewProject,
    pub pools: Vec<PoolRecord>,
    pub migration: MigrationRecord,
    pub burn_source: Option<BurnSourceRecord>,
    pub dry_run: bool,
}

/// Lowercase alphanumerics of the symbol, else the lowercased migration id
pub fn project_slug(symbol: &str, migration_id: &str) -> String {
    let slug: String = symbol
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    if slug.is_empty() {
        migration_id.to_lowercase()
    } else {
        slug
    }
}

fn parse_program_id(field: &str, value: &str) -> SyncResult<Pubkey> {
    Pubkey::from_str(value)
        .map_err(|e| SyncError::configuration(format!("{} '{}' is not a valid pubkey: {}", field, value, e)))
}

pub struct MigrationImporter {
    ledger: Arc<dyn LedgerRpc>,
    discovery: Arc<PoolDiscovery>,
    metadata: Arc<MetadataFetcher>,
    store: Arc<dyn SyncStore>,
    migration_program: Pubkey,
    metadata_program: Pubkey,
    layout: MigrationLayout,
    max_string_len: usize,
    default_decimals: u8,
}

impl MigrationImporter {
    pub fn new(
        config: &Config,
        ledger: Arc<dyn LedgerRpc>,
        discovery: Arc<PoolDiscovery>,
        metadata: Arc<MetadataFetcher>,
        store: Arc<dyn SyncStore>,
    ) -> SyncResult<Self> {
        let meta = &config.metadata;
        Ok(Self {
            ledger,
            discovery,
            metadata,
            store,
            migration_program: parse_program_id("metadata.migration_program_id", &meta.migration_program_id)?,
            metadata_program: parse_program_id("metadata.metadata_program_id", &meta.metadata_program_id)?,
            layout: MigrationLayout::new(&meta.migration_discriminator, meta.max_string_len),
            max_string_len: meta.max_string_len,
            default_decimals: meta.default_decimals,
        })
    }

    /// Fetch and decode the migration account for `url_or_id`
    pub async fn fetch_migration(&self, url_or_id: &str) -> SyncResult<MigrationAccountRecord> {
        let migration_id = extract_migration_id(url_or_id)?;
        let pda = migration_pda(&self.migration_program, &migration_id)?;

        logger::info(
            LogTag::Import,
            &format!("Looking up migration {} at {}", migration_id, pda),
        );

        let data = self
            .ledger
            .get_account_info(&pda.to_string())
            .await?
            .ok_or_else(|| SyncError::not_found(format!("migration account {} ({})", migration_id, pda)))?;

        Ok(decode_migration_account(&data, &self.layout)?)
    }

    /// Mint decimals/supply, on-chain metadata, then off-chain overrides
    ///
    /// Missing or undecodable accounts fall back to defaults; only upstream
    /// failures propagate.
    pub async fn resolve_token(&self, mint: &Pubkey) -> SyncResult<TokenInfo> {
        let address = mint.to_string();
        let mut token = TokenInfo::unknown(&address, self.default_decimals);

        match self.ledger.get_account_info(&address).await? {
            Some(data) => match decode_mint_account(&data) {
                Ok(info) => {
                    token.decimals = info.decimals;
                    token.supply = info.supply;
                }
                Err(e) => logger::warning(
                    LogTag::Import,
                    &format!("Mint {} undecodable, using {} decimals: {}", address, self.default_decimals, e),
                ),
            },
            None => logger::warning(
                LogTag::Import,
                &format!("Mint {} not found, using {} decimals", address, self.default_decimals),
            ),
        }

        let pda = metadata_pda(&self.metadata_program, mint)?;
        let onchain = match self.ledger.get_account_info(&pda.to_string()).await? {
            Some(data) => match decode_metadata_account(&data, self.max_string_len) {
                Ok(meta) => Some(meta),
                Err(e) => {
                    logger::warning(
                        LogTag::Import,
                        &format!("Metadata for {} undecodable: {}", address, e),
                    );
                    None
                }
            },
            None => None,
        };

        if let Some(meta) = onchain {
            token.apply_onchain(&meta);
            if let Some(offchain) = self.metadata.fetch(&meta.uri).await {
                token.apply_offchain(&offchain);
            }
        }

        logger::debug(
            LogTag::Import,
            &format!("Resolved {} as {} ({} decimals)", address, token.symbol, token.decimals),
        );
        Ok(token)
    }

    /// Old tokens held by the migration account, 0 when the node cannot say
    async fn total_migrated(&self, migration_id: &str) -> f64 {
        let address = match migration_pda(&self.migration_program, migration_id) {
            Ok(pda) => pda.to_string(),
            Err(_) => return 0.0,
        };
        match self.ledger.get_token_account_balance(&address).await {
            Ok(amount) => amount.unwrap_or(0.0),
            Err(e) => {
                logger::warning(
                    LogTag::Import,
                    &format!("Migration stats for {} unavailable: {}", migration_id, e),
                );
                0.0
            }
        }
    }

    async fn best_pool(&self, token: &TokenInfo) -> DiscoveredPool {
        match self.discovery.discover_best_pool(&token.address).await {
            Ok(Some(pool)) => pool,
            Ok(None) => {
                logger::warning(
                    LogTag::Import,
                    &format!("No pool for {}, using the token address as pool", token.symbol),
                );
                DiscoveredPool::pseudo_pool(&token.address)
            }
            Err(e) => {
                logger::warning(
                    LogTag::Import,
                    &format!("Pool discovery failed for {}: {}; using the token address", token.symbol, e),
                );
                DiscoveredPool::pseudo_pool(&token.address)
            }
        }
    }

    pub async fn import(&self, url_or_id: &str, dry_run: bool) -> SyncResult<ImportOutcome> {
        self.import_with_options(url_or_id, ImportOptions { dry_run, ..Default::default() })
            .await
    }

    pub async fn import_with_options(&self, url_or_id: &str, options: ImportOptions) -> SyncResult<ImportOutcome> {
        let account = self.fetch_migration(url_or_id).await?;

        if let Some(existing) = self.store.find_project_by_migration_id(&account.migration_id)? {
            return Err(SyncError::PersistenceConflict {
                key: format!(
                    "migration {} already imported as project '{}'",
                    account.migration_id, existing.slug
                ),
            });
        }

        let old_token = self.resolve_token(&account.old_token_mint).await?;
        let new_token = self.resolve_token(&account.new_token_mint).await?;
        let pool = self.best_pool(&new_token).await;
        let status = account.status_at(Utc::now().timestamp());
        let total_migrated = self.total_migrated(&account.migration_id).await;

        let planned_project = NewProject {
            slug: project_slug(&new_token.symbol, &account.migration_id),
            name: if new_token.name != "Unknown" {
                new_token.name.clone()
            } else {
                account.project_name.clone()
            },
            migration_id: account.migration_id.clone(),
        };

        let legacy_pool = pool_record(0, &old_token, &DiscoveredPool::pseudo_pool(&old_token.address), 0);
        let current_pool = pool_record(0, &new_token, &pool, 1);
        let migration = MigrationRecord {
            id: 0,
            project_id: 0,
            from_pool_order: 0,
            to_pool_order: 1,
            label: format!("{} -> {}", old_token.symbol, new_token.symbol),
            migration_timestamp: account.end_timestamp,
            start_timestamp: account.start_timestamp,
            exchange_rate: account.exchange_rate,
            status,
            total_migrated,
        };
        let burn_source = options.track_burns.then(|| BurnSourceRecord {
            id: 0,
            project_id: 0,
            address: new_token.address.clone(),
            kind: BurnSource::TokenMint,
            mint: new_token.address.clone(),
            decimals: new_token.decimals,
        });

        if options.dry_run {
            logger::info(
                LogTag::Import,
                &format!(
                    "Dry run: would import '{}' ({}) {}",
                    planned_project.name, planned_project.slug, migration.label
                ),
            );
            return Ok(ImportOutcome {
                account,
                status,
                old_token,
                new_token,
                project: None,
                planned_project,
                pools: vec![legacy_pool, current_pool],
                migration,
                burn_source,
                dry_run: true,
            });
        }

        let ImportedProject {
            project,
            pools,
            migration,
            burn_source,
        } = self.store.import_project(&ProjectImport {
            project: planned_project.clone(),
            pools: vec![legacy_pool, current_pool],
            migration,
            burn_source,
        })?;

        logger::info(
            LogTag::Import,
            &format!(
                "Imported '{}' as project #{} ({}), pool {} on {}",
                project.name, project.id, migration.label, pools[1].pool_address, pools[1].dex_type
            ),
        );

        Ok(ImportOutcome {
            account,
            status,
            old_token,
            new_token,
            project: Some(project),
            planned_project,
            pools,
            migration,
            burn_source,
            dry_run: false,
        })
    }
}

fn pool_record(project_id: i64, token: &TokenInfo, pool: &DiscoveredPool, order_index: i64) -> PoolRecord {
    PoolRecord {
        id: 0,
        project_id,
        pool_address: pool.pool_address.clone(),
        token_address: token.address.clone(),
        token_symbol: token.symbol.clone(),
        token_name: token.name.clone(),
        token_decimals: token.decimals,
        dex_type: pool.dex_type.as_str().to_string(),
        liquidity_usd: pool.liquidity_usd,
        order_index,
        image: token.image.clone(),
        website: token.website.clone(),
        twitter: token.twitter.clone(),
        telegram: token.telegram.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApisConfig;
    use crate::decoder::migration::tests::encode_migration;
    use crate::discovery::{MarketDataSource, MarketPair, PairLiquidity};
    use crate::ledger::{ParsedTransaction, SignatureInfo};
    use crate::scheduler::RequestScheduler;
    use crate::storage::SqliteStore;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::time::Duration;

    /// Raw accounts plus token balances, both keyed by address
    struct AccountLedger(HashMap<String, Vec<u8>>, HashMap<String, f64>);

    #[async_trait]
    impl LedgerRpc for AccountLedger {
        async fn get_signatures_for_address(
            &self,
            _address: &str,
            _limit: usize,
            _before: Option<&str>,
        ) -> SyncResult<Vec<SignatureInfo>> {
            Ok(Vec::new())
        }

        async fn get_parsed_transaction(&self, _signature: &str) -> SyncResult<Option<ParsedTransaction>> {
            Ok(None)
        }

        async fn get_account_info(&self, address: &str) -> SyncResult<Option<Vec<u8>>> {
            Ok(self.0.get(address).cloned())
        }

        async fn get_token_account_balance(&self, address: &str) -> SyncResult<Option<f64>> {
            Ok(self.1.get(address).copied())
        }
    }

    struct Pairs(Vec<MarketPair>);

    #[async_trait]
    impl MarketDataSource for Pairs {
        async fn get_pairs_for_token(&self, _token_address: &str) -> SyncResult<Vec<MarketPair>> {
            Ok(self.0.clone())
        }
    }

    fn mint_account(decimals: u8) -> Vec<u8> {
        let mut data = vec![0u8; 82];
        data[36..44].copy_from_slice(&1_000_000u64.to_le_bytes());
        data[44] = decimals;
        data[45] = 1;
        data
    }

    fn metadata_account(mint: &Pubkey, name: &str, symbol: &str) -> Vec<u8> {
        let mut data = vec![4u8];
        data.extend_from_slice(Pubkey::new_unique().as_ref());
        data.extend_from_slice(mint.as_ref());
        for value in [name, symbol, ""] {
            data.extend_from_slice(&(value.len() as u32).to_le_bytes());
            data.extend_from_slice(value.as_bytes());
        }
        data
    }

    struct Fixture {
        importer: MigrationImporter,
        store: Arc<SqliteStore>,
        new_mint: Pubkey,
    }

    fn fixture(pairs: Vec<MarketPair>) -> Fixture {
        let config = Config::default();
        let program = Pubkey::from_str(&config.metadata.migration_program_id).unwrap();
        let metadata_program = Pubkey::from_str(&config.metadata.metadata_program_id).unwrap();
        let old_mint = Pubkey::new_unique();
        let new_mint = Pubkey::new_unique();

        let vault = migration_pda(&program, "mig79").unwrap().to_string();
        let balances = HashMap::from([(vault.clone(), 1_250_000.5)]);
        let mut accounts = HashMap::new();
        accounts.insert(
            vault,
            encode_migration(
                [1; 8],
                "mig79",
                "Example Project",
                old_mint,
                new_mint,
                1_700_000_000,
                1_702_000_000,
                2_000_000,
            ),
        );
        accounts.insert(old_mint.to_string(), mint_account(6));
        accounts.insert(
            metadata_pda(&metadata_program, &old_mint).unwrap().to_string(),
            metadata_account(&old_mint, "Old Token", "OLD"),
        );
        // New mint has no mint account: decimals fall back to the default
        accounts.insert(
            metadata_pda(&metadata_program, &new_mint).unwrap().to_string(),
            metadata_account(&new_mint, "New Token", "NEW"),
        );

        let scheduler = Arc::new(RequestScheduler::new(ApisConfig::default()));
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let importer = MigrationImporter::new(
            &config,
            Arc::new(AccountLedger(accounts, balances)),
            Arc::new(PoolDiscovery::new(Arc::new(Pairs(pairs)), &config.discovery)),
            Arc::new(MetadataFetcher::new(scheduler, Duration::from_secs(1))),
            store.clone(),
        )
        .unwrap();

        Fixture {
            importer,
            store,
            new_mint,
        }
    }

    fn raydium_pair() -> MarketPair {
        MarketPair {
            chain_id: "solana".to_string(),
            dex_id: "raydium".to_string(),
            pair_address: "POOL-NEW".to_string(),
            liquidity: Some(PairLiquidity { usd: Some(25_000.0) }),
            ..Default::default()
        }
    }

    #[test]
    fn test_project_slug() {
        assert_eq!(project_slug("$NEW-Token", "mig7"), "newtoken");
        assert_eq!(project_slug("🚀", "MIG79"), "mig79");
        assert_eq!(project_slug("", "mig1"), "mig1");
    }

    #[test]
    fn test_bad_program_id_is_configuration_error() {
        let err = parse_program_id("metadata.migration_program_id", "not-a-key").unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_import_writes_project_pools_and_migration() {
        let f = fixture(vec![raydium_pair()]);

        let outcome = f
            .importer
            .import_with_options(
                "https://migrate.fun/claim/mig79",
                ImportOptions {
                    dry_run: false,
                    track_burns: true,
                },
            )
            .await
            .unwrap();

        let project = outcome.project.unwrap();
        assert_eq!(project.slug, "new");
        assert_eq!(project.name, "New Token");
        assert_eq!(outcome.status, MigrationStatus::Completed);

        let pools = f.store.list_pools(project.id).unwrap();
        assert_eq!(pools.len(), 2);
        assert_eq!(pools[0].token_symbol, "OLD");
        assert_eq!(pools[0].token_decimals, 6);
        assert_eq!(pools[0].dex_type, "unknown");
        assert_eq!(pools[1].pool_address, "POOL-NEW");
        assert_eq!(pools[1].dex_type, "raydium");
        assert_eq!(pools[1].token_decimals, 9);

        let migrations = f.store.list_migrations(project.id).unwrap();
        assert_eq!(migrations[0].label, "OLD -> NEW");
        assert_eq!(migrations[0].migration_timestamp, 1_702_000_000);
        assert!((migrations[0].exchange_rate - 2.0).abs() < 1e-9);
        assert_eq!(migrations[0].status, MigrationStatus::Completed);
        assert!((migrations[0].total_migrated - 1_250_000.5).abs() < 1e-9);

        let sources = f.store.list_burn_sources(project.id).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].mint, f.new_mint.to_string());
    }

    #[tokio::test]
    async fn test_missing_pool_falls_back_to_token_address() {
        let f = fixture(Vec::new());
        let outcome = f.importer.import("mig79", false).await.unwrap();
        assert_eq!(outcome.pools[1].pool_address, f.new_mint.to_string());
        assert_eq!(outcome.pools[1].dex_type, "unknown");
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let f = fixture(vec![raydium_pair()]);
        let outcome = f.importer.import("mig79", true).await.unwrap();

        assert!(outcome.dry_run);
        assert!(outcome.project.is_none());
        assert_eq!(outcome.planned_project.slug, "new");
        assert!(f.store.list_active_projects().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_second_import_is_conflict() {
        let f = fixture(vec![raydium_pair()]);
        f.importer.import("mig79", false).await.unwrap();

        let err = f.importer.import("mig79", false).await.unwrap_err();
        assert!(matches!(err, SyncError::PersistenceConflict { .. }));
        assert_eq!(f.store.list_active_projects().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_migration_is_not_found() {
        let f = fixture(Vec::new());
        let err = f.importer.import("mig404", false).await.unwrap_err();
        assert!(matches!(err, SyncError::NotFound { .. }));
    }
}

//! Migration program account layout
//!
//! ```text
//! [0..8)    discriminator
//! u32 len + bytes   project id
//! u32 len + bytes   project name
//! 32 bytes  old token mint
//! 32 bytes  new token mint
//! 64 bytes  vault accounts (not decoded)
//! i64       start timestamp (unix seconds)
//! i64       end timestamp
//! u64       exchange rate, fixed point 1e6
//! ```

use super::reader::ByteReader;
use crate::errors::{DecodeError, SyncError, SyncResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

pub const DISCRIMINATOR_LEN: usize = 8;
pub const VAULT_SECTION_LEN: usize = 64;
pub const EXCHANGE_RATE_SCALE: f64 = 1_000_000.0;

/// Size of an account whose two strings are empty
pub const MIN_MIGRATION_ACCOUNT_LEN: usize = DISCRIMINATOR_LEN + 4 + 4 + 32 + 32 + VAULT_SECTION_LEN + 8 + 8 + 8;

/// PDA seeds cannot exceed this many bytes
const MAX_SEED_LEN: usize = 32;

static CLAIM_URL_RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"/claim/(\w+)").ok());
static BARE_ID_RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^\w+$").ok());

/// Layout checks applied on top of the positional read
#[derive(Debug, Clone, Default)]
pub struct MigrationLayout {
    /// Expected first 8 bytes, when known
    pub discriminator: Option<[u8; DISCRIMINATOR_LEN]>,
    pub max_string_len: usize,
}

impl MigrationLayout {
    pub fn new(discriminator: &[u8], max_string_len: usize) -> Self {
        let discriminator = <[u8; DISCRIMINATOR_LEN]>::try_from(discriminator).ok();
        Self {
            discriminator,
            max_string_len,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MigrationAccountRecord {
    pub migration_id: String,
    pub project_name: String,
    pub old_token_mint: Pubkey,
    pub new_token_mint: Pubkey,
    pub start_timestamp: i64,
    pub end_timestamp: i64,
    pub exchange_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationStatus {
    Active,
    Completed,
}

impl MigrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationStatus::Active => "active",
            MigrationStatus::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(MigrationStatus::Active),
            "completed" => Some(MigrationStatus::Completed),
            _ => None,
        }
    }
}

impl MigrationAccountRecord {
    /// Scheduled and running migrations are both active; ended ones are completed
    pub fn status_at(&self, now: i64) -> MigrationStatus {
        if now < self.end_timestamp {
            MigrationStatus::Active
        } else {
            MigrationStatus::Completed
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Decode a migration account
///
/// Fails on any short read, on a discriminator mismatch (when the layout
/// names one), and on values that only a misaligned read would produce.
pub fn decode_migration_account(
    data: &[u8],
    layout: &MigrationLayout,
) -> Result<MigrationAccountRecord, DecodeError> {
    let mut reader = ByteReader::new(data);

    let discriminator = reader.read_bytes("discriminator", DISCRIMINATOR_LEN)?;
    if let Some(expected) = layout.discriminator {
        if discriminator != expected {
            return Err(DecodeError::DiscriminatorMismatch {
                expected: hex(&expected),
                found: hex(discriminator),
            });
        }
    }

    let migration_id = reader.read_string("project_id", layout.max_string_len)?;
    let project_name = reader.read_string("project_name", layout.max_string_len)?;
    let old_token_mint = reader.read_pubkey("old_token_mint")?;
    let new_token_mint = reader.read_pubkey("new_token_mint")?;
    reader.skip("vaults", VAULT_SECTION_LEN)?;
    let start_timestamp = reader.read_i64("start_timestamp")?;
    let end_timestamp = reader.read_i64("end_timestamp")?;
    let raw_rate = reader.read_u64("exchange_rate")?;

    if old_token_mint == Pubkey::default() || new_token_mint == Pubkey::default() {
        return Err(DecodeError::InvalidAccount {
            reason: "token mint is the zero address".to_string(),
        });
    }
    if start_timestamp < 0 || end_timestamp < start_timestamp {
        return Err(DecodeError::InvalidAccount {
            reason: format!(
                "migration window {}..{} is not a valid time range",
                start_timestamp, end_timestamp
            ),
        });
    }

    Ok(MigrationAccountRecord {
        migration_id,
        project_name,
        old_token_mint,
        new_token_mint,
        start_timestamp,
        end_timestamp,
        exchange_rate: raw_rate as f64 / EXCHANGE_RATE_SCALE,
    })
}

/// `https://migrate.fun/claim/mig79` -> `mig79`; a bare id passes through
pub fn extract_migration_id(input: &str) -> SyncResult<String> {
    let input = input.trim();

    if let Some(caps) = CLAIM_URL_RE.as_ref().and_then(|re| re.captures(input)) {
        if let Some(id) = caps.get(1) {
            return Ok(id.as_str().to_string());
        }
    }

    if BARE_ID_RE
        .as_ref()
        .map(|re| re.is_match(input))
        .unwrap_or(false)
    {
        return Ok(input.to_string());
    }

    Err(SyncError::validation(
        "migration",
        format!(
            "'{}' is neither a migration id nor a claim URL (https://migrate.fun/claim/<id>)",
            input
        ),
    ))
}

/// Migration account address: seeds `["migration", id]`
pub fn migration_pda(program_id: &Pubkey, migration_id: &str) -> SyncResult<Pubkey> {
    if migration_id.len() > MAX_SEED_LEN {
        return Err(SyncError::validation(
            "migration",
            format!("id longer than {} bytes", MAX_SEED_LEN),
        ));
    }
    Pubkey::try_find_program_address(&[b"migration", migration_id.as_bytes()], program_id)
        .map(|(pda, _)| pda)
        .ok_or_else(|| SyncError::internal(format!("no PDA for migration {}", migration_id)))
}

/// Metadata account address: seeds `["metadata", program, mint]`
pub fn metadata_pda(metadata_program: &Pubkey, mint: &Pubkey) -> SyncResult<Pubkey> {
    Pubkey::try_find_program_address(
        &[b"metadata", metadata_program.as_ref(), mint.as_ref()],
        metadata_program,
    )
    .map(|(pda, _)| pda)
    .ok_or_else(|| SyncError::internal(format!("no metadata PDA for {}", mint)))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn encode_migration(
        discriminator: [u8; 8],
        id: &str,
        name: &str,
        old_mint: Pubkey,
        new_mint: Pubkey,
        start: i64,
        end: i64,
        raw_rate: u64,
    ) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&discriminator);
        data.extend_from_slice(&(id.len() as u32).to_le_bytes());
        data.extend_from_slice(id.as_bytes());
        data.extend_from_slice(&(name.len() as u32).to_le_bytes());
        data.extend_from_slice(name.as_bytes());
        data.extend_from_slice(old_mint.as_ref());
        data.extend_from_slice(new_mint.as_ref());
        data.extend_from_slice(&[7u8; VAULT_SECTION_LEN]);
        data.extend_from_slice(&start.to_le_bytes());
        data.extend_from_slice(&end.to_le_bytes());
        data.extend_from_slice(&raw_rate.to_le_bytes());
        data
    }

    fn layout() -> MigrationLayout {
        MigrationLayout::new(&[], 256)
    }

    #[test]
    fn test_decode_full_account() {
        let old_mint = Pubkey::new_unique();
        let new_mint = Pubkey::new_unique();
        let data = encode_migration(
            [1; 8],
            "mig79",
            "Example Project",
            old_mint,
            new_mint,
            1_700_000_000,
            1_702_000_000,
            2_500_000,
        );

        let record = decode_migration_account(&data, &layout()).unwrap();
        assert_eq!(record.migration_id, "mig79");
        assert_eq!(record.project_name, "Example Project");
        assert_eq!(record.old_token_mint, old_mint);
        assert_eq!(record.new_token_mint, new_mint);
        assert_eq!(record.start_timestamp, 1_700_000_000);
        assert_eq!(record.end_timestamp, 1_702_000_000);
        assert!((record.exchange_rate - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_every_truncation_is_an_error() {
        let data = encode_migration(
            [1; 8],
            "mig1",
            "P",
            Pubkey::new_unique(),
            Pubkey::new_unique(),
            10,
            20,
            1_000_000,
        );
        for len in 0..data.len() {
            let result = decode_migration_account(&data[..len], &layout());
            assert!(
                matches!(result, Err(DecodeError::Truncated { .. })),
                "length {} decoded without error",
                len
            );
        }
        assert!(decode_migration_account(&data, &layout()).is_ok());
    }

    #[test]
    fn test_minimum_length_constant() {
        let data = encode_migration(
            [0; 8],
            "",
            "",
            Pubkey::new_unique(),
            Pubkey::new_unique(),
            0,
            0,
            0,
        );
        assert_eq!(data.len(), MIN_MIGRATION_ACCOUNT_LEN);
    }

    #[test]
    fn test_discriminator_check() {
        let data = encode_migration(
            [9; 8],
            "mig2",
            "P",
            Pubkey::new_unique(),
            Pubkey::new_unique(),
            10,
            20,
            1,
        );
        let strict = MigrationLayout::new(&[1, 2, 3, 4, 5, 6, 7, 8], 256);
        let err = decode_migration_account(&data, &strict).unwrap_err();
        assert!(matches!(err, DecodeError::DiscriminatorMismatch { .. }));

        let matching = MigrationLayout::new(&[9; 8], 256);
        assert!(decode_migration_account(&data, &matching).is_ok());
    }

    #[test]
    fn test_misaligned_values_rejected() {
        let data = encode_migration(
            [0; 8],
            "mig3",
            "P",
            Pubkey::new_unique(),
            Pubkey::new_unique(),
            500,
            100,
            1,
        );
        let err = decode_migration_account(&data, &layout()).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidAccount { .. }));

        let data = encode_migration([0; 8], "mig4", "P", Pubkey::default(), Pubkey::new_unique(), 1, 2, 1);
        assert!(decode_migration_account(&data, &layout()).is_err());
    }

    #[test]
    fn test_status() {
        let record = MigrationAccountRecord {
            migration_id: "m".to_string(),
            project_name: "p".to_string(),
            old_token_mint: Pubkey::new_unique(),
            new_token_mint: Pubkey::new_unique(),
            start_timestamp: 100,
            end_timestamp: 200,
            exchange_rate: 1.0,
        };
        assert_eq!(record.status_at(50), MigrationStatus::Active);
        assert_eq!(record.status_at(150), MigrationStatus::Active);
        assert_eq!(record.status_at(200), MigrationStatus::Completed);
    }

    #[test]
    fn test_extract_migration_id() {
        assert_eq!(
            extract_migration_id("https://migrate.fun/claim/mig79").unwrap(),
            "mig79"
        );
        assert_eq!(
            extract_migration_id("https://migrate.fun/claim/mig12?ref=x").unwrap(),
            "mig12"
        );
        assert_eq!(extract_migration_id(" mig5 ").unwrap(), "mig5");
        assert_eq!(
            extract_migration_id("https://migrate.fun/projects").unwrap_err().kind(),
            "validation"
        );
    }

    #[test]
    fn test_pdas_are_deterministic() {
        let program = Pubkey::new_unique();
        let a = migration_pda(&program, "mig79").unwrap();
        let b = migration_pda(&program, "mig79").unwrap();
        let c = migration_pda(&program, "mig80").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);

        assert!(migration_pda(&program, &"x".repeat(40)).is_err());

        let mint = Pubkey::new_unique();
        assert_eq!(
            metadata_pda(&program, &mint).unwrap(),
            metadata_pda(&program, &mint).unwrap()
        );
    }
}

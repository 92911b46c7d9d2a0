//! Binary account decoding
//!
//! Purely positional readers for migration program accounts, token metadata
//! accounts and SPL mints. Every read is bounds-checked and surfaces a
//! [`DecodeError`](crate::errors::DecodeError) instead of truncating.

pub mod metadata;
pub mod migration;
pub mod reader;

pub use metadata::{
    decode_metadata_account, decode_mint_account, normalize_metadata_uri, parse_offchain_metadata,
    MetadataFetcher, MintInfo, OffchainMetadata, OnChainMetadata, TokenInfo,
};
pub use migration::{
    decode_migration_account, extract_migration_id, metadata_pda, migration_pda,
    MigrationAccountRecord, MigrationLayout, MigrationStatus,
};
pub use reader::ByteReader;

/// Log tags identify which subsystem emitted a line

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LogTag {
    System,
    Config,
    Scheduler,
    Rpc,
    Decoder,
    Scanner,
    Discovery,
    Ohlcv,
    Holders,
    Storage,
    Import,
    Sync,
    Test,
    Other(String),
}

impl LogTag {
    /// Fixed-width console label
    pub fn to_plain_string(&self) -> String {
        match self {
            LogTag::System => "SYSTEM".to_string(),
            LogTag::Config => "CONFIG".to_string(),
            LogTag::Scheduler => "SCHED".to_string(),
            LogTag::Rpc => "RPC".to_string(),
            LogTag::Decoder => "DECODER".to_string(),
            LogTag::Scanner => "SCANNER".to_string(),
            LogTag::Discovery => "DISCOVER".to_string(),
            LogTag::Ohlcv => "OHLCV".to_string(),
            LogTag::Holders => "HOLDERS".to_string(),
            LogTag::Storage => "STORAGE".to_string(),
            LogTag::Import => "IMPORT".to_string(),
            LogTag::Sync => "SYNC".to_string(),
            LogTag::Test => "TEST".to_string(),
            LogTag::Other(s) => s.to_uppercase(),
        }
    }

    /// Key used by `--debug <key>` flags
    pub fn to_debug_key(&self) -> String {
        match self {
            LogTag::System => "system".to_string(),
            LogTag::Config => "config".to_string(),
            LogTag::Scheduler => "scheduler".to_string(),
            LogTag::Rpc => "rpc".to_string(),
            LogTag::Decoder => "decoder".to_string(),
            LogTag::Scanner => "scanner".to_string(),
            LogTag::Discovery => "discovery".to_string(),
            LogTag::Ohlcv => "ohlcv".to_string(),
            LogTag::Holders => "holders".to_string(),
            LogTag::Storage => "storage".to_string(),
            LogTag::Import => "import".to_string(),
            LogTag::Sync => "sync".to_string(),
            LogTag::Test => "test".to_string(),
            LogTag::Other(s) => s.to_lowercase(),
        }
    }
}

impl std::fmt::Display for LogTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_plain_string())
    }
}

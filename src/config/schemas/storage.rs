use crate::config_struct;

config_struct! {
    /// SQLite persistence
    pub struct DatabaseConfig {
        path: String = "data/migtrack.db".to_string(),
    }
}

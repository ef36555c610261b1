pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const HISTORY_FILE_NAME: &str = "history.txt";
pub const ENV_FILE_NAME: &str = ".env";
pub const LOG_ENV_VAR: &str = "SMART_FHIR_LOG";
pub const BINARY_NAME: &str = env!("CARGO_BIN_NAME");

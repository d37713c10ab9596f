// Configuration module
// Public interface for configuration loading

mod loader;
mod settings;

pub use loader::{default_config_path, load_config, load_config_from, ENV_API_URL, ENV_TIMEOUT_SECS};
pub use settings::{ClientConfig, DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};

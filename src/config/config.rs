use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

use super::logging::LoggingConfig;
use super::types::{ApiConfig, AuthConfig, CacheConfig, PostsConfig};

/// Environment variable that overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "POSTPULSE_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "./config.yaml";

/// A top-level enum for versioned configurations.
#[derive(Deserialize, Serialize, JsonSchema)]
#[serde(tag = "version")]
pub enum Config {
    #[serde(rename = "1.0.0")]
    ConfigV1(ConfigV1),
}

/// Main config for v1.0.0.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct ConfigV1 {
    pub bind_address: String,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub api: ApiConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub posts: PostsConfig,
}

impl Config {
    pub fn into_latest(self) -> ConfigV1 {
        match self {
            Config::ConfigV1(c) => c,
        }
    }
}

/// Builds the figment used for loading: the YAML file, then
/// `POSTPULSE_`-prefixed environment variables (`__` separates nesting).
pub fn figment_for(path: &str) -> Figment {
    Figment::new()
        .merge(Yaml::file(path))
        .merge(Env::prefixed("POSTPULSE_").ignore(&["CONFIG"]).split("__"))
}

/// Load config from `POSTPULSE_CONFIG` or "config.yaml" in the current directory.
pub fn load_config() -> ConfigV1 {
    let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    match figment_for(&path).extract::<Config>() {
        Ok(cfg) => cfg.into_latest(),
        Err(e) => {
            eprintln!("Error loading configuration from '{}': {}", path, e);
            std::process::exit(1);
        }
    }
}

/// Print the JSON schema for the configuration to stdout.
pub fn print_schema() {
    let schema = schema_for!(Config);
    match serde_json::to_string_pretty(&schema) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("Failed to render schema: {}", e),
    }
}

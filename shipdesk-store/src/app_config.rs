use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub shipping: ShippingConfig,
    pub carriers: CarriersConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ShippingConfig {
    /// Carrier used when auto-select is off and no carrier is specified
    pub default_carrier: String,
    #[serde(default)]
    pub auto_select_cheapest: bool,
    /// Warehouse pincode all shipments originate from
    pub origin_pincode: String,
    #[serde(default = "default_token_ttl")]
    pub token_ttl_seconds: u64,
}

// 55 minutes; carrier sessions run an hour
fn default_token_ttl() -> u64 {
    3300
}

#[derive(Debug, Deserialize, Clone)]
pub struct CarriersConfig {
    pub shiprocket: ShiprocketSettings,
    pub delhivery: DelhiverySettings,
    pub nimbuspost: NimbusSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ShiprocketSettings {
    pub base_url: String,
    pub email: String,
    pub password: String,
    pub pickup_location: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DelhiverySettings {
    pub base_url: String,
    pub api_key: String,
    pub pickup_name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NimbusSettings {
    pub base_url: String,
    pub email: String,
    pub password: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `SHIPDESK_CARRIERS__SHIPROCKET__PASSWORD=...`
            .add_source(config::Environment::with_prefix("SHIPDESK").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub billing: BillingConfig,
    #[serde(default)]
    pub phonepe: PhonePeConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub session_duration_hours: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BillingConfig {
    /// One-time admission fee charged when a payer is onboarded.
    pub admission_fee: Decimal,
    /// Monthly rate given to a new payer's subscription.
    pub default_monthly_rate: Decimal,
    /// Days an unpaid monthly invoice may stay overdue before the
    /// membership stops counting as active.
    pub grace_days: i64,
    #[serde(default)]
    pub auto_run: bool,
    pub auto_run_interval_hours: u64,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            admission_fee: dec!(2000.00),
            default_monthly_rate: dec!(750.00),
            grace_days: 30,
            auto_run: false,
            auto_run_interval_hours: 24,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PhonePeConfig {
    #[serde(default)]
    pub enabled: bool,
    pub merchant_id: Option<String>,
    pub salt_key: Option<String>,
    pub salt_index: Option<String>,
    pub base_url: Option<String>,
    pub callback_url: Option<String>,
    pub redirect_url: Option<String>,
    #[serde(default = "default_gateway_timeout")]
    pub timeout_secs: u64,
}

fn default_gateway_timeout() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct NotificationConfig {
    pub whatsapp: Option<WhatsAppConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WhatsAppConfig {
    pub enabled: bool,
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
    #[serde(default = "default_twilio_api_base")]
    pub api_base: String,
}

fn default_twilio_api_base() -> String {
    "https://api.twilio.com".to_string()
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.base_url", "http://localhost:8080")?
            .set_default("database.url", "sqlite://clubledger.db?mode=rwc")?
            .set_default("database.max_connections", 10)?
            .set_default("auth.session_duration_hours", 24)?
            .set_default("billing.admission_fee", "2000.00")?
            .set_default("billing.default_monthly_rate", "750.00")?
            .set_default("billing.grace_days", 30)?
            .set_default("billing.auto_run", false)?
            .set_default("billing.auto_run_interval_hours", 24)?
            .set_default("phonepe.enabled", false)?

            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))

            // Add environment variables (with CLUBLEDGER__ prefix, double underscore separates levels)
            .add_source(Environment::with_prefix("CLUBLEDGER").separator("__"))

            .build()?;

        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                base_url: "http://localhost:8080".to_string(),
            },
            database: DatabaseConfig {
                url: "sqlite://clubledger.db?mode=rwc".to_string(),
                max_connections: 10,
            },
            auth: AuthConfig {
                session_duration_hours: 24,
            },
            billing: BillingConfig::default(),
            phonepe: PhonePeConfig {
                timeout_secs: default_gateway_timeout(),
                ..Default::default()
            },
            notifications: NotificationConfig { whatsapp: None },
        }
    }
}

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use vpnshop_shared::platega;

/// Process configuration, read once at start-up and shared by `Arc`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub bot_token: String,
    /// Used for the t.me redirects after checkout.
    pub bot_username: String,
    pub admin_id: i64,
    pub price: i64,
    pub currency: String,
    pub vpn_duration_days: i64,
    /// Public base URL of the web server, without trailing slash.
    pub web_url: String,
    pub listen_port: u16,
    pub database_url: String,
    /// `{token}` is replaced with the fulfillment token.
    pub connect_link_template: String,
    pub platega: PlategaSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlategaSettings {
    pub merchant_id: String,
    pub secret: String,
    pub base_url: String,
    pub payment_method: i32,
    pub create_timeout_secs: u64,
    pub status_timeout_secs: u64,
    /// Require the merchant credentials on incoming callbacks.
    pub verify_callbacks: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            bot_username: String::new(),
            admin_id: 0,
            price: 100,
            currency: "RUB".to_string(),
            vpn_duration_days: 30,
            web_url: "http://localhost:8000".to_string(),
            listen_port: 8000,
            database_url: "sqlite://vpn.db".to_string(),
            connect_link_template: "happvpn://config/{token}".to_string(),
            platega: PlategaSettings::default(),
        }
    }
}

impl Default for PlategaSettings {
    fn default() -> Self {
        Self {
            merchant_id: String::new(),
            secret: String::new(),
            base_url: platega::DEFAULT_BASE_URL.to_string(),
            payment_method: platega::METHOD_SBP_QR,
            create_timeout_secs: 30,
            status_timeout_secs: 10,
            verify_callbacks: false,
        }
    }
}

impl PlategaSettings {
    pub fn is_configured(&self) -> bool {
        !self.merchant_id.trim().is_empty() && !self.secret.trim().is_empty()
    }

    pub fn create_timeout(&self) -> Duration {
        Duration::from_secs(self.create_timeout_secs)
    }

    pub fn status_timeout(&self) -> Duration {
        Duration::from_secs(self.status_timeout_secs)
    }
}

impl Settings {
    /// Loads from the first TOML file found, otherwise from the environment.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut candidates: Vec<PathBuf> = Vec::new();
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(anyhow::anyhow!("Config file {} does not exist", path.display()));
            }
            candidates.push(path.to_path_buf());
        }
        candidates.push(PathBuf::from("/etc/vpnshop/vpnshop.toml"));
        candidates.push(PathBuf::from("./vpnshop.toml"));

        for path in candidates {
            if let Ok(contents) = fs::read_to_string(&path) {
                tracing::info!("Loading config from {}", path.display());
                return Self::from_toml(&contents)
                    .with_context(|| format!("Invalid config file {}", path.display()));
            }
        }

        tracing::info!("Loading config from environment");
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(contents)?;
        Ok(settings.normalized())
    }

    pub fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Settings::default();
        let text = |key: &str, default: &str| -> String {
            get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let settings = Settings {
            bot_token: text("BOT_TOKEN", ""),
            bot_username: text("BOT_USERNAME", ""),
            admin_id: parse_var(&get, "ADMIN_ID", defaults.admin_id)?,
            price: parse_var(&get, "PRICE", defaults.price)?,
            currency: text("CURRENCY", &defaults.currency),
            vpn_duration_days: parse_var(&get, "VPN_DURATION", defaults.vpn_duration_days)?,
            web_url: text("WEB_URL", &defaults.web_url),
            listen_port: parse_var(&get, "LISTEN_PORT", defaults.listen_port)?,
            database_url: text("DATABASE_URL", &defaults.database_url),
            connect_link_template: text("CONNECT_LINK_TEMPLATE", &defaults.connect_link_template),
            platega: PlategaSettings {
                merchant_id: text("PLATEGA_MERCHANT_ID", ""),
                secret: text("PLATEGA_API_KEY", ""),
                base_url: text("PLATEGA_BASE_URL", &defaults.platega.base_url),
                payment_method: parse_var(&get, "PLATEGA_PAYMENT_METHOD", defaults.platega.payment_method)?,
                create_timeout_secs: parse_var(&get, "PLATEGA_CREATE_TIMEOUT", defaults.platega.create_timeout_secs)?,
                status_timeout_secs: parse_var(&get, "PLATEGA_STATUS_TIMEOUT", defaults.platega.status_timeout_secs)?,
                verify_callbacks: parse_var(&get, "PLATEGA_VERIFY_CALLBACKS", defaults.platega.verify_callbacks)?,
            },
        };

        Ok(settings.normalized())
    }

    fn normalized(mut self) -> Self {
        self.web_url = self.web_url.trim_end_matches('/').to_string();
        self.platega.base_url = self.platega.base_url.trim_end_matches('/').to_string();
        self.bot_username = self.bot_username.trim_start_matches('@').to_string();
        self
    }

    pub fn success_url(&self) -> String {
        format!("{}/success", self.web_url)
    }

    pub fn fail_url(&self) -> String {
        format!("{}/fail", self.web_url)
    }

    pub fn callback_url(&self) -> String {
        format!("{}/platega-callback", self.web_url)
    }

    pub fn deliverable_url(&self, token: &str) -> String {
        format!("{}/vpn/{}", self.web_url, token)
    }

    pub fn connect_link(&self, token: &str) -> String {
        self.connect_link_template.replace("{token}", token)
    }

    /// Deep link back into the bot, e.g. `?start=success`.
    pub fn bot_link(&self, start: Option<&str>) -> String {
        let base = if self.bot_username.is_empty() {
            "https://t.me".to_string()
        } else {
            format!("https://t.me/{}", self.bot_username)
        };
        match start {
            Some(param) if !self.bot_username.is_empty() => format!("{}?start={}", base, param),
            _ => base,
        }
    }

    pub fn is_admin(&self, telegram_id: i64) -> bool {
        self.admin_id != 0 && self.admin_id == telegram_id
    }
}

fn parse_var<T, F>(get: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value '{}': {}", key, raw, e)),
        None => Ok(default),
    }
}

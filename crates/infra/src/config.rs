//! Process-wide settings.
//!
//! Settings are read once at startup and handed to the domain explicitly; the
//! catalog crate never looks at the environment.

use thiserror::Error;

use shopcat_catalog::ReconciliationConfig;

/// Environment variable controlling automatic shop product categories.
pub const AUTO_SHOP_PRODUCT_CATEGORIES_VAR: &str = "SHOPCAT_AUTO_SHOP_PRODUCT_CATEGORIES";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: expected a boolean (true/false/1/0/yes/no/on/off), got {value:?}")]
    InvalidBool { var: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    /// Keep the primary category inside the membership set and promote the
    /// first submitted member when no primary is given.
    pub auto_shop_product_categories: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_shop_product_categories: true,
        }
    }
}

impl Settings {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary lookup; unset variables keep their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut settings = Self::default();

        if let Some(raw) = lookup(AUTO_SHOP_PRODUCT_CATEGORIES_VAR) {
            settings.auto_shop_product_categories = parse_bool(AUTO_SHOP_PRODUCT_CATEGORIES_VAR, &raw)?;
        }

        tracing::debug!(
            auto_shop_product_categories = settings.auto_shop_product_categories,
            "settings loaded"
        );
        Ok(settings)
    }

    pub fn reconciliation(&self) -> ReconciliationConfig {
        ReconciliationConfig {
            auto_assign_categories: self.auto_shop_product_categories,
        }
    }
}

fn parse_bool(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            var,
            value: raw.to_string(),
        }),
    }
}

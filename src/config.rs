use std::{env, fmt::Display, str::FromStr, time::Duration};

use anyhow::{Context, Result};

use crate::flags::{BugFlag, DEFAULT_CART_ITEM_LIMIT, DEFAULT_IMAGE_BASE_URL, DEFAULT_ORDER_SERVICE_URL, FlagSet};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub environment: String,
    pub server_addr: String,
    /// Unset means the in-memory cart store.
    pub database_url: Option<String>,
    pub order_service_timeout: Duration,
    pub flags: FlagSet,
}

/// Reads the configuration from the process environment (after `.env` has been loaded).
pub fn load() -> Result<AppConfig> {
    from_lookup(|name| env::var(name).ok())
}

/// Same as [`load`] with an explicit variable source.
pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<AppConfig> {
    let string = |name: &str, default: &str| {
        lookup(name)
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| default.to_string())
    };

    let mut flags = FlagSet {
        cart_item_limit: parse_var(&lookup, "CART_ITEM_LIMIT", DEFAULT_CART_ITEM_LIMIT)?,
        order_service_url: string("ORDER_SERVICE_URL", DEFAULT_ORDER_SERVICE_URL),
        image_base_url: string("IMAGE_BASE_URL", DEFAULT_IMAGE_BASE_URL),
        ..FlagSet::default()
    };
    if flags.cart_item_limit < 1 {
        anyhow::bail!("CART_ITEM_LIMIT must be at least 1");
    }

    for bug in BugFlag::ALL {
        let enabled = parse_var(&lookup, bug.env_var(), false)?;
        flags.set(bug, enabled);
    }

    let timeout_secs: u64 = parse_var(&lookup, "ORDER_SERVICE_TIMEOUT_SECS", 10)?;

    Ok(AppConfig {
        environment: string("APP_ENV", "production"),
        server_addr: string("SERVER_ADDR", "0.0.0.0:8080"),
        database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
        order_service_timeout: Duration::from_secs(timeout_secs),
        flags,
    })
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(name).filter(|value| !value.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|err| anyhow::anyhow!("{}", err))
            .with_context(|| format!("Invalid value for {}: {:?}", name, raw)),
        None => Ok(default),
    }
}

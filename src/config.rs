//! Runner configuration
//!
//! Everything is loaded once at startup from the environment (a `.env` file
//! is honored by the binaries) and passed by reference into the components
//! that need it. Nothing here mutates after load.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Default broker endpoint for the unofficial API
pub const DEFAULT_BASE_URL: &str = "https://api.qxbroker.com";

/// Default grace period after contract expiry before a missing close record
/// counts as a timeout.
pub const DEFAULT_RESULT_GRACE_SECS: u64 = 5;

/// Which broker account orders are placed against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    #[default]
    Practice,
    Live,
}

impl AccountType {
    /// Value the broker API expects in the `account` field.
    pub fn as_api_str(&self) -> &'static str {
        match self {
            AccountType::Practice => "demo",
            AccountType::Live => "real",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "practice" | "demo" => Some(AccountType::Practice),
            "live" | "real" => Some(AccountType::Live),
            _ => None,
        }
    }
}

/// Senders permitted to trigger trades via chat.
///
/// Loaded once from `ALLOWED_CHAT_IDS`; checked on every inbound message;
/// never mutated at runtime.
#[derive(Debug, Clone, Default)]
pub struct AllowList(HashSet<i64>);

impl AllowList {
    /// Parse a comma-separated list of chat ids. Blank entries are skipped,
    /// non-numeric entries are skipped with a warning.
    pub fn from_csv(raw: &str) -> Self {
        let mut ids = HashSet::new();
        for entry in raw.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            match entry.parse::<i64>() {
                Ok(id) => {
                    ids.insert(id);
                }
                Err(_) => {
                    warn!("Ignoring non-numeric chat id in ALLOWED_CHAT_IDS: {entry}");
                }
            }
        }
        Self(ids)
    }

    pub fn contains(&self, chat_id: i64) -> bool {
        self.0.contains(&chat_id)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Configuration loaded from environment
#[derive(Debug, Clone)]
pub struct Config {
    pub email: String,
    pub password: String,
    pub account: AccountType,
    pub base_url: String,
    /// Telegram bot token; only the signal receiver requires it
    pub telegram_token: Option<String>,
    pub allowed_chats: AllowList,
    pub result_grace_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let email = std::env::var("QUOTEX_EMAIL")
            .map_err(|_| anyhow::anyhow!("QUOTEX_EMAIL environment variable required"))?;

        let password = std::env::var("QUOTEX_PASSWORD")
            .map_err(|_| anyhow::anyhow!("QUOTEX_PASSWORD environment variable required"))?;

        let account = match std::env::var("QUOTEX_ACCOUNT") {
            Ok(raw) => AccountType::parse(&raw)
                .ok_or_else(|| anyhow::anyhow!("Invalid QUOTEX_ACCOUNT `{raw}` (use practice or live)"))?,
            Err(_) => AccountType::Practice,
        };

        let base_url = std::env::var("QUOTEX_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let telegram_token = std::env::var("TELEGRAM_TOKEN").ok();

        let allowed_chats =
            AllowList::from_csv(&std::env::var("ALLOWED_CHAT_IDS").unwrap_or_default());

        let result_grace_secs = match std::env::var("RESULT_GRACE_SECS") {
            Ok(raw) => raw
                .parse::<u64>()
                .map_err(|e| anyhow::anyhow!("Invalid RESULT_GRACE_SECS: {e}"))?,
            Err(_) => DEFAULT_RESULT_GRACE_SECS,
        };

        Ok(Self {
            email,
            password,
            account,
            base_url,
            telegram_token,
            allowed_chats,
            result_grace_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mutex to serialize tests that modify environment variables.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn allow_list_parses_csv() {
        let list = AllowList::from_csv("123, 456 ,789");
        assert_eq!(list.len(), 3);
        assert!(list.contains(123));
        assert!(list.contains(456));
        assert!(list.contains(789));
        assert!(!list.contains(999));
    }

    #[test]
    fn allow_list_skips_blank_and_bad_entries() {
        let list = AllowList::from_csv("123,,abc, ,-42");
        assert_eq!(list.len(), 2);
        assert!(list.contains(123));
        assert!(list.contains(-42));
    }

    #[test]
    fn empty_allow_list_contains_nobody() {
        let list = AllowList::from_csv("");
        assert!(list.is_empty());
        assert!(!list.contains(0));
    }

    #[test]
    fn account_type_parsing() {
        assert_eq!(AccountType::parse("practice"), Some(AccountType::Practice));
        assert_eq!(AccountType::parse("DEMO"), Some(AccountType::Practice));
        assert_eq!(AccountType::parse("live"), Some(AccountType::Live));
        assert_eq!(AccountType::parse("real"), Some(AccountType::Live));
        assert_eq!(AccountType::parse("margin"), None);
    }

    #[test]
    fn from_env_requires_credentials() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("QUOTEX_EMAIL");
        std::env::remove_var("QUOTEX_PASSWORD");

        assert!(Config::from_env().is_err());
    }

    #[test]
    fn from_env_applies_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("QUOTEX_EMAIL", "trader@example.com");
        std::env::set_var("QUOTEX_PASSWORD", "hunter2");
        std::env::remove_var("QUOTEX_ACCOUNT");
        std::env::remove_var("QUOTEX_BASE_URL");
        std::env::remove_var("TELEGRAM_TOKEN");
        std::env::remove_var("ALLOWED_CHAT_IDS");
        std::env::remove_var("RESULT_GRACE_SECS");

        let config = Config::from_env().unwrap();
        assert_eq!(config.account, AccountType::Practice);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.result_grace_secs, DEFAULT_RESULT_GRACE_SECS);
        assert!(config.telegram_token.is_none());
        assert!(config.allowed_chats.is_empty());

        std::env::remove_var("QUOTEX_EMAIL");
        std::env::remove_var("QUOTEX_PASSWORD");
    }

    #[test]
    fn from_env_rejects_bad_account() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("QUOTEX_EMAIL", "trader@example.com");
        std::env::set_var("QUOTEX_PASSWORD", "hunter2");
        std::env::set_var("QUOTEX_ACCOUNT", "margin");

        assert!(Config::from_env().is_err());

        std::env::remove_var("QUOTEX_EMAIL");
        std::env::remove_var("QUOTEX_PASSWORD");
        std::env::remove_var("QUOTEX_ACCOUNT");
    }
}

use log::{debug, info};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::config::{Config, UiTheme};
use crate::credits::Credits;
use crate::error::{
    AuthError, AuthorizationError, PersistenceError, Result, ValidationError,
};

pub const ACCOUNTS_FILE: &str = "users.json";

/// Writes to a sibling temp file, syncs it, then renames it over `path`.
pub(crate) async fn write_atomic(path: &Path, data: &[u8]) -> Result<(), PersistenceError> {
    let io_err = |source: std::io::Error| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.map_err(io_err)?;
    }

    let temp_path = path.with_extension("tmp");
    {
        let mut file = fs::File::create(&temp_path).await.map_err(io_err)?;
        file.write_all(data).await.map_err(io_err)?;
        file.sync_all().await.map_err(io_err)?;
    }
    fs::rename(&temp_path, path).await.map_err(io_err)?;
    debug!("wrote {} bytes to {}", data.len(), path.display());
    Ok(())
}

fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

/// How a password is kept on disk. New accounts are always hashed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Credential {
    Hashed { password_hash: String },
    Plain { password: String },
}

impl Credential {
    pub fn hashed(password: &str) -> Self {
        Credential::Hashed {
            password_hash: hash_password(password),
        }
    }

    pub fn verify(&self, password: &str) -> bool {
        match self {
            Credential::Hashed { password_hash } => *password_hash == hash_password(password),
            Credential::Plain { password: stored } => stored == password,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    #[serde(flatten)]
    pub credential: Credential,
    pub balance: Credits,
}

/// Accounts keyed by username, backed by one JSON file. Also persists admin changes to the config file.
#[derive(Debug)]
pub struct AccountStore {
    accounts_path: PathBuf,
    config_path: PathBuf,
    accounts: BTreeMap<String, Account>,
}

impl AccountStore {
    /// Missing file yields an empty store. Malformed JSON, missing fields or a negative balance are `CorruptData`.
    pub async fn load(
        accounts_path: impl Into<PathBuf>,
        config_path: impl Into<PathBuf>,
    ) -> Result<Self, PersistenceError> {
        let accounts_path = accounts_path.into();
        let accounts = match fs::read_to_string(&accounts_path).await {
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                PersistenceError::CorruptData {
                    path: accounts_path.clone(),
                    reason: e.to_string(),
                }
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => {
                return Err(PersistenceError::Io {
                    path: accounts_path,
                    source,
                })
            }
        };
        info!(
            "loaded {} accounts from {}",
            accounts.len(),
            accounts_path.display()
        );

        Ok(AccountStore {
            accounts_path,
            config_path: config_path.into(),
            accounts,
        })
    }

    pub async fn save(&self) -> Result<(), PersistenceError> {
        let content = serde_json::to_string_pretty(&self.accounts).map_err(|e| {
            PersistenceError::CorruptData {
                path: self.accounts_path.clone(),
                reason: e.to_string(),
            }
        })?;
        write_atomic(&self.accounts_path, content.as_bytes()).await
    }

    pub fn accounts(&self) -> &BTreeMap<String, Account> {
        &self.accounts
    }

    pub fn get(&self, username: &str) -> Option<&Account> {
        self.accounts.get(username)
    }

    pub fn balance(&self, username: &str) -> Option<Credits> {
        self.get(username).map(|a| a.balance)
    }

    pub async fn create_account(
        &mut self,
        username: &str,
        password: &str,
        start_balance: Credits,
    ) -> Result<&Account> {
        let username = username.trim();
        if username.is_empty() || username.chars().any(char::is_whitespace) {
            return Err(AuthError::InvalidUsername(username.to_string()).into());
        }
        if self.accounts.contains_key(username) {
            return Err(AuthError::DuplicateUser(username.to_string()).into());
        }
        if !start_balance.is_within_limit() {
            return Err(ValidationError::AboveLimit(start_balance).into());
        }

        self.accounts.insert(
            username.to_string(),
            Account {
                credential: Credential::hashed(password),
                balance: start_balance,
            },
        );
        if let Err(e) = self.save().await {
            self.accounts.remove(username);
            return Err(e.into());
        }
        info!("registered {username} with {start_balance}");
        Ok(&self.accounts[username])
    }

    pub fn authenticate(&self, username: &str, password: &str) -> Result<&Account, AuthError> {
        self.accounts
            .get(username.trim())
            .filter(|account| account.credential.verify(password))
            .ok_or(AuthError::InvalidCredentials)
    }

    /// Persists a new balance. The in-memory value is restored if the write fails.
    pub async fn update_balance(&mut self, username: &str, balance: Credits) -> Result<()> {
        if !balance.is_within_limit() {
            return Err(ValidationError::AboveLimit(balance).into());
        }
        let account = self
            .accounts
            .get_mut(username)
            .ok_or_else(|| AuthError::UnknownUser(username.to_string()))?;
        let previous = std::mem::replace(&mut account.balance, balance);

        if let Err(e) = self.save().await {
            if let Some(account) = self.accounts.get_mut(username) {
                account.balance = previous;
            }
            return Err(e.into());
        }
        Ok(())
    }

    pub async fn set_start_balance(
        &self,
        actor: &str,
        amount: Credits,
        config: &Config,
    ) -> Result<Config> {
        if amount.is_zero() {
            return Err(ValidationError::NonPositiveAmount.into());
        }
        if !amount.is_within_limit() {
            return Err(ValidationError::AboveLimit(amount).into());
        }
        let updated = Config {
            default_start_balance: amount,
            ..config.clone()
        };
        self.persist_config(actor, "set the starting balance", config, updated)
            .await
    }

    pub async fn set_theme(&self, actor: &str, theme: UiTheme, config: &Config) -> Result<Config> {
        let updated = Config {
            ui_theme: theme,
            ..config.clone()
        };
        self.persist_config(actor, "change the theme", config, updated)
            .await
    }

    async fn persist_config(
        &self,
        actor: &str,
        action: &'static str,
        current: &Config,
        updated: Config,
    ) -> Result<Config> {
        if !current.is_admin(actor) {
            return Err(AuthorizationError {
                actor: actor.to_string(),
                action,
            }
            .into());
        }
        updated.save(&self.config_path).await?;
        info!("{actor} changed config: {action}");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CONFIG_FILE;
    use crate::error::RouletteError;
    use tempfile::{tempdir, TempDir};

    async fn open(dir: &TempDir) -> AccountStore {
        AccountStore::load(
            dir.path().join(ACCOUNTS_FILE),
            dir.path().join(CONFIG_FILE),
        )
        .await
        .unwrap()
    }

    fn write_accounts(dir: &TempDir, content: &str) {
        std::fs::write(dir.path().join(ACCOUNTS_FILE), content).unwrap();
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = open(&dir).await;
        assert!(store.accounts().is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load_round_trip() {
        let dir = tempdir().unwrap();
        let mut store = open(&dir).await;
        store
            .create_account("alice", "secret", Credits::whole(100))
            .await
            .unwrap();
        store
            .create_account("bob", "hunter2", Credits::from_cents(1250))
            .await
            .unwrap();
        store.update_balance("alice", Credits::whole(90)).await.unwrap();

        let reloaded = open(&dir).await;
        assert_eq!(reloaded.accounts(), store.accounts());
        assert_eq!(reloaded.balance("alice"), Some(Credits::whole(90)));
        assert!(!dir.path().join("users.tmp").exists());
    }

    #[tokio::test]
    async fn test_balance_at_limit_round_trips() {
        let dir = tempdir().unwrap();
        let mut store = open(&dir).await;
        store
            .create_account("whale", "pw", Credits::MAX)
            .await
            .unwrap();
        store
            .create_account("almost", "pw", Credits::from_cents(Credits::MAX.cents() - 1))
            .await
            .unwrap();
        assert_eq!(open(&dir).await.accounts(), store.accounts());

        let too_much = Credits::from_cents(12_345_678_901_234_567);
        let err = store
            .create_account("alice", "pw", too_much)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RouletteError::Validation(ValidationError::AboveLimit(_))
        ));
        assert!(store.get("alice").is_none());
        assert!(store.update_balance("whale", too_much).await.is_err());
        assert_eq!(store.balance("whale"), Some(Credits::MAX));
    }

    #[tokio::test]
    async fn test_oversized_balance_on_disk_is_corrupt() {
        let dir = tempdir().unwrap();
        write_accounts(
            &dir,
            r#"{"alice": {"password_hash": "00", "balance": 1e300}}"#,
        );
        let result = AccountStore::load(
            dir.path().join(ACCOUNTS_FILE),
            dir.path().join(CONFIG_FILE),
        )
        .await;
        assert!(matches!(result, Err(PersistenceError::CorruptData { .. })));
    }

    #[tokio::test]
    async fn test_failed_write_keeps_previous_balance() {
        let dir = tempdir().unwrap();
        let mut store = open(&dir).await;
        store
            .create_account("alice", "pw", Credits::whole(100))
            .await
            .unwrap();
        std::fs::create_dir(dir.path().join("users.tmp")).unwrap();

        let err = store
            .update_balance("alice", Credits::whole(5))
            .await
            .unwrap_err();
        assert!(matches!(err, RouletteError::Persistence(PersistenceError::Io { .. })));
        assert_eq!(store.balance("alice"), Some(Credits::whole(100)));
        assert_eq!(open(&dir).await.balance("alice"), Some(Credits::whole(100)));
    }

    #[tokio::test]
    async fn test_failed_write_does_not_register() {
        let dir = tempdir().unwrap();
        let mut store = open(&dir).await;
        store
            .create_account("alice", "pw", Credits::whole(100))
            .await
            .unwrap();
        std::fs::create_dir(dir.path().join("users.tmp")).unwrap();

        let err = store
            .create_account("bob", "pw", Credits::whole(100))
            .await
            .unwrap_err();
        assert!(matches!(err, RouletteError::Persistence(_)));
        assert!(store.get("bob").is_none());
        assert_eq!(store.accounts().len(), 1);

        std::fs::remove_dir(dir.path().join("users.tmp")).unwrap();
        store
            .create_account("bob", "pw", Credits::whole(100))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_user() {
        let dir = tempdir().unwrap();
        let mut store = open(&dir).await;
        store
            .create_account("admin", "pw", Credits::whole(100))
            .await
            .unwrap();
        let err = store
            .create_account("admin", "other", Credits::whole(100))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RouletteError::Auth(AuthError::DuplicateUser(ref name)) if name == "admin"
        ));
    }

    #[tokio::test]
    async fn test_rejects_blank_username() {
        let dir = tempdir().unwrap();
        let mut store = open(&dir).await;
        for name in ["", "   ", "two words"] {
            let err = store
                .create_account(name, "pw", Credits::whole(1))
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                RouletteError::Auth(AuthError::InvalidUsername(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_authenticate() {
        let dir = tempdir().unwrap();
        let mut store = open(&dir).await;
        store
            .create_account("alice", "secret", Credits::whole(100))
            .await
            .unwrap();

        assert!(store.authenticate("alice", "secret").is_ok());
        assert_eq!(
            store.authenticate("alice", "wrong").unwrap_err(),
            AuthError::InvalidCredentials
        );
        assert_eq!(
            store.authenticate("nobody", "secret").unwrap_err(),
            AuthError::InvalidCredentials
        );
    }

    #[tokio::test]
    async fn test_password_is_hashed_on_disk() {
        let dir = tempdir().unwrap();
        let mut store = open(&dir).await;
        store
            .create_account("alice", "secret", Credits::whole(100))
            .await
            .unwrap();
        let raw = std::fs::read_to_string(dir.path().join(ACCOUNTS_FILE)).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["alice"]["password_hash"], hash_password("secret"));
        assert_eq!(json["alice"]["balance"], 100.0);
        assert!(!raw.contains("\"secret\""));
    }

    #[tokio::test]
    async fn test_plain_credentials_are_accepted() {
        let dir = tempdir().unwrap();
        write_accounts(&dir, r#"{"carol": {"password": "pw", "balance": 12.5}}"#);
        let store = open(&dir).await;
        assert_eq!(store.balance("carol"), Some(Credits::from_cents(1250)));
        assert!(store.authenticate("carol", "pw").is_ok());
        assert!(store.authenticate("carol", "PW").is_err());
    }

    #[tokio::test]
    async fn test_corrupt_files() {
        for content in [
            "not json at all",
            r#"{"alice": {"password_hash": "00"}}"#,
            r#"{"alice": {"balance": 10.0}}"#,
            r#"{"alice": {"password_hash": "00", "balance": -1.0}}"#,
            r#"["alice"]"#,
        ] {
            let dir = tempdir().unwrap();
            write_accounts(&dir, content);
            let result = AccountStore::load(
                dir.path().join(ACCOUNTS_FILE),
                dir.path().join(CONFIG_FILE),
            )
            .await;
            assert!(
                matches!(result, Err(PersistenceError::CorruptData { .. })),
                "{content}"
            );
        }
    }

    #[tokio::test]
    async fn test_update_unknown_user() {
        let dir = tempdir().unwrap();
        let mut store = open(&dir).await;
        let err = store
            .update_balance("ghost", Credits::whole(1))
            .await
            .unwrap_err();
        assert!(matches!(err, RouletteError::Auth(AuthError::UnknownUser(_))));
    }

    #[tokio::test]
    async fn test_non_admin_cannot_set_start_balance() {
        let dir = tempdir().unwrap();
        let store = open(&dir).await;
        let config = Config::default();
        let err = store
            .set_start_balance("alice", Credits::whole(500), &config)
            .await
            .unwrap_err();
        assert!(matches!(err, RouletteError::Authorization(_)));
        assert!(!dir.path().join(CONFIG_FILE).exists());
    }

    #[tokio::test]
    async fn test_admin_sets_start_balance() {
        let dir = tempdir().unwrap();
        let store = open(&dir).await;
        let config = Config::default();

        let updated = store
            .set_start_balance("admin", Credits::whole(500), &config)
            .await
            .unwrap();
        assert_eq!(updated.default_start_balance, Credits::whole(500));
        assert_eq!(updated.admin_users, config.admin_users);

        let on_disk = Config::load(&dir.path().join(CONFIG_FILE)).await.unwrap();
        assert_eq!(on_disk, updated);

        let err = store
            .set_start_balance("admin", Credits::ZERO, &updated)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RouletteError::Validation(ValidationError::NonPositiveAmount)
        ));

        let err = store
            .set_start_balance("admin", Credits::from_cents(Credits::MAX.cents() + 1), &updated)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RouletteError::Validation(ValidationError::AboveLimit(_))
        ));
    }

    #[tokio::test]
    async fn test_admin_sets_theme() {
        let dir = tempdir().unwrap();
        let store = open(&dir).await;
        let updated = store
            .set_theme("admin", UiTheme::Dark, &Config::default())
            .await
            .unwrap();
        assert_eq!(updated.ui_theme, UiTheme::Dark);
        assert!(store
            .set_theme("bob", UiTheme::Light, &updated)
            .await
            .is_err());
    }
}

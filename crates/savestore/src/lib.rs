use std::env;
use std::path::PathBuf;

use thiserror::Error;

mod atomic_io;
pub mod bindings;
pub mod checksum;
pub mod cipher;
pub mod data;
pub mod record;
pub mod store;

pub use bindings::{BindingConflict, BindingOverride, BindingOverrideStore, BindingOverrides};
pub use cipher::CipherError;
pub use data::{GameDataType, PlayerStats};
pub use record::{Record, RecordError, RECORD_FORMAT_VERSION};
pub use store::{
    FileStatus, InspectReport, LoadOutcome, LoadSource, SaveError, SecureStore, BACKUP_SUFFIX,
    SAVE_EXTENSION,
};

pub const SAVE_DIR_ENV_VAR: &str = "SAVESTORE_DIR";
pub const SALT_ENV_VAR: &str = "SAVESTORE_SALT";
pub const PASSPHRASE_ENV_VAR: &str = "SAVESTORE_PASSPHRASE";

pub const DEFAULT_CHECKSUM_SALT: &str = "YourUniqueGameSecretKey_ChangeThis_2024";
pub const DEFAULT_ENCRYPTION_PASSPHRASE: &str = "MyGame2024Secret";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub save_dir: PathBuf,
    pub checksum_salt: String,
    pub encryption_passphrase: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            save_dir: PathBuf::from("LOG").join("GameData"),
            checksum_salt: DEFAULT_CHECKSUM_SALT.to_string(),
            encryption_passphrase: DEFAULT_ENCRYPTION_PASSPHRASE.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
}

impl StoreConfig {
    /// Defaults, overridden by `SAVESTORE_DIR`, `SAVESTORE_SALT` and
    /// `SAVESTORE_PASSPHRASE` when they are set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(dir) = read_env(SAVE_DIR_ENV_VAR)? {
            config.save_dir = PathBuf::from(dir);
        }
        if let Some(salt) = read_env(SALT_ENV_VAR)? {
            config.checksum_salt = salt;
        }
        if let Some(passphrase) = read_env(PASSPHRASE_ENV_VAR)? {
            config.encryption_passphrase = passphrase;
        }
        Ok(config)
    }

    pub fn with_save_dir(mut self, save_dir: impl Into<PathBuf>) -> Self {
        self.save_dir = save_dir.into();
        self
    }
}

fn read_env(var: &'static str) -> Result<Option<String>, ConfigError> {
    match env::var(var) {
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(source) => Err(ConfigError::EnvVar { var, source }),
    }
}

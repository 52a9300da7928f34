use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::atomic_io::{copy_atomic, remove_if_exists, write_text_atomic};
use crate::cipher::CipherError;
use crate::record::{read_record, Record, RecordError};
use crate::StoreConfig;

pub const SAVE_EXTENSION: &str = "sav";
pub const BACKUP_SUFFIX: &str = ".backup";

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("cannot save empty content")]
    EmptyContent,
    #[error("invalid save key '{key}': {reason}")]
    InvalidKey { key: String, reason: &'static str },
    #[error("failed to create save directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode record for '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write record {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to remove record {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Cipher(#[from] CipherError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Primary,
    Backup,
    Nothing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOutcome {
    pub data: Option<String>,
    /// Set whenever the primary record existed but failed verification, even
    /// if the backup then supplied a value.
    pub was_tampered: bool,
    pub source: LoadSource,
}

impl LoadOutcome {
    fn nothing(was_tampered: bool) -> Self {
        Self {
            data: None,
            was_tampered,
            source: LoadSource::Nothing,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    Missing,
    Valid {
        version: u32,
        encrypted: bool,
        timestamp: String,
        plaintext_len: usize,
    },
    Invalid {
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct InspectReport {
    pub key: String,
    pub primary_path: PathBuf,
    pub primary: FileStatus,
    pub backup_path: PathBuf,
    pub backup: FileStatus,
}

impl InspectReport {
    pub fn render_human_readable(&self) -> String {
        [
            format!("key: {}", self.key),
            format!(
                "primary: {} ({})",
                describe_status(&self.primary),
                self.primary_path.display()
            ),
            format!(
                "backup: {} ({})",
                describe_status(&self.backup),
                self.backup_path.display()
            ),
        ]
        .join("\n")
    }
}

fn describe_status(status: &FileStatus) -> String {
    match status {
        FileStatus::Missing => "missing".to_string(),
        FileStatus::Valid {
            version,
            encrypted,
            timestamp,
            plaintext_len,
        } => format!(
            "valid v{version} encrypted={encrypted} saved_at={timestamp} bytes={plaintext_len}"
        ),
        FileStatus::Invalid { reason } => format!("invalid: {reason}"),
    }
}

/// Keyed save files under one directory: `<key>.sav` plus a single
/// `<key>.sav.backup` holding the previous generation.
#[derive(Debug, Clone)]
pub struct SecureStore {
    config: StoreConfig,
}

impl SecureStore {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn record_path(&self, key: &str) -> PathBuf {
        self.config.save_dir.join(format!("{key}.{SAVE_EXTENSION}"))
    }

    pub fn backup_path(&self, key: &str) -> PathBuf {
        self.config
            .save_dir
            .join(format!("{key}.{SAVE_EXTENSION}{BACKUP_SUFFIX}"))
    }

    /// Fails closed: any error is logged and reported as `false`.
    pub fn save(&self, key: &str, plaintext: &str, encrypt: bool) -> bool {
        match self.try_save(key, plaintext, encrypt) {
            Ok(_) => true,
            Err(err) => {
                error!(key = %key, error = %err, "save_failed");
                false
            }
        }
    }

    pub fn try_save(
        &self,
        key: &str,
        plaintext: &str,
        encrypt: bool,
    ) -> Result<PathBuf, SaveError> {
        validate_key(key)?;
        if plaintext.is_empty() {
            return Err(SaveError::EmptyContent);
        }

        let save_dir = &self.config.save_dir;
        fs::create_dir_all(save_dir).map_err(|source| SaveError::CreateDir {
            path: save_dir.clone(),
            source,
        })?;

        let record = Record::seal(
            plaintext,
            encrypt,
            &self.config.checksum_salt,
            &self.config.encryption_passphrase,
        )?;
        let json = record.to_json_pretty().map_err(|source| SaveError::Encode {
            key: key.to_string(),
            source,
        })?;

        let path = self.record_path(key);
        if path.is_file() {
            self.rotate_backup(key, &path);
        }
        write_text_atomic(&path, &json).map_err(|source| SaveError::Write {
            path: path.clone(),
            source,
        })?;

        info!(
            key = %key,
            path = %path.display(),
            encrypted = encrypt,
            checksum = %record.checksum,
            "save_written"
        );
        Ok(path)
    }

    /// Only a primary that still verifies replaces the backup, so saving over
    /// a tampered file keeps the last good generation.
    fn rotate_backup(&self, key: &str, path: &Path) {
        if let Err(err) = self.open_file(path) {
            warn!(
                key = %key,
                path = %path.display(),
                error = %err,
                "save_backup_skipped_invalid_primary"
            );
            return;
        }

        let backup = self.backup_path(key);
        if let Err(err) = copy_atomic(path, &backup) {
            warn!(
                key = %key,
                backup_path = %backup.display(),
                error = %err,
                "save_backup_failed"
            );
        }
    }

    /// A missing primary is reported as absent without consulting the
    /// backup; any other primary failure falls back to the backup.
    pub fn load(&self, key: &str) -> LoadOutcome {
        if let Err(err) = validate_key(key) {
            error!(key = %key, error = %err, "load_rejected");
            return LoadOutcome::nothing(false);
        }

        let path = self.record_path(key);
        if !path.exists() {
            warn!(key = %key, path = %path.display(), "save_missing");
            return LoadOutcome::nothing(false);
        }

        match self.open_file(&path) {
            Ok(plaintext) => {
                info!(key = %key, path = %path.display(), "save_loaded_verified");
                LoadOutcome {
                    data: Some(plaintext),
                    was_tampered: false,
                    source: LoadSource::Primary,
                }
            }
            Err(err) => {
                log_record_failure(key, &path, &err);
                self.load_backup(key)
            }
        }
    }

    fn load_backup(&self, key: &str) -> LoadOutcome {
        let backup = self.backup_path(key);
        if !backup.exists() {
            warn!(key = %key, backup_path = %backup.display(), "save_backup_missing");
            return LoadOutcome::nothing(true);
        }

        warn!(key = %key, backup_path = %backup.display(), "save_backup_attempt");
        match self.open_file(&backup) {
            Ok(plaintext) => {
                info!(key = %key, backup_path = %backup.display(), "save_backup_loaded");
                LoadOutcome {
                    data: Some(plaintext),
                    was_tampered: true,
                    source: LoadSource::Backup,
                }
            }
            Err(err) => {
                error!(
                    key = %key,
                    backup_path = %backup.display(),
                    error = %err,
                    "save_backup_corrupt"
                );
                LoadOutcome::nothing(true)
            }
        }
    }

    fn open_file(&self, path: &Path) -> Result<String, RecordError> {
        read_record(path)?.open(
            &self.config.checksum_salt,
            &self.config.encryption_passphrase,
        )
    }

    pub fn save_typed<T: Serialize>(&self, key: &str, value: &T, encrypt: bool) -> bool {
        match serde_json::to_string(value) {
            Ok(json) => self.save(key, &json, encrypt),
            Err(source) => {
                let err = SaveError::Encode {
                    key: key.to_string(),
                    source,
                };
                error!(key = %key, error = %err, "save_failed");
                false
            }
        }
    }

    /// Falls back to `T::default()` when nothing verified loads or the stored
    /// JSON does not describe a `T`.
    pub fn load_typed<T: DeserializeOwned + Default>(&self, key: &str) -> (T, bool) {
        let outcome = self.load(key);
        let Some(json) = outcome.data else {
            return (T::default(), outcome.was_tampered);
        };
        match serde_json::from_str::<T>(&json) {
            Ok(value) => (value, outcome.was_tampered),
            Err(err) => {
                warn!(key = %key, error = %err, "load_typed_parse_failed_using_default");
                (T::default(), outcome.was_tampered)
            }
        }
    }

    /// Verifies primary and backup independently, without fallback.
    pub fn inspect(&self, key: &str) -> Result<InspectReport, SaveError> {
        validate_key(key)?;
        let primary_path = self.record_path(key);
        let backup_path = self.backup_path(key);
        Ok(InspectReport {
            key: key.to_string(),
            primary: self.file_status(&primary_path),
            primary_path,
            backup: self.file_status(&backup_path),
            backup_path,
        })
    }

    fn file_status(&self, path: &Path) -> FileStatus {
        if !path.exists() {
            return FileStatus::Missing;
        }
        let record = match read_record(path) {
            Ok(record) => record,
            Err(err) => {
                return FileStatus::Invalid {
                    reason: err.to_string(),
                }
            }
        };
        match record.open(
            &self.config.checksum_salt,
            &self.config.encryption_passphrase,
        ) {
            Ok(plaintext) => FileStatus::Valid {
                version: record.version,
                encrypted: record.encrypted,
                timestamp: record.timestamp,
                plaintext_len: plaintext.len(),
            },
            Err(err) => FileStatus::Invalid {
                reason: err.to_string(),
            },
        }
    }

    /// Removes primary and backup. Returns whether anything was removed.
    pub fn delete(&self, key: &str) -> Result<bool, SaveError> {
        validate_key(key)?;
        let mut removed = false;
        for path in [self.record_path(key), self.backup_path(key)] {
            removed |= remove_if_exists(&path).map_err(|source| SaveError::Remove {
                path: path.clone(),
                source,
            })?;
        }
        info!(key = %key, removed, "save_deleted");
        Ok(removed)
    }
}

fn validate_key(key: &str) -> Result<(), SaveError> {
    let reason = if key.trim().is_empty() {
        Some("key is empty")
    } else if key == "." || key == ".." {
        Some("key is a relative directory")
    } else if key.contains(['/', '\\']) {
        Some("key contains a path separator")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(SaveError::InvalidKey {
            key: key.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

fn log_record_failure(key: &str, path: &Path, err: &RecordError) {
    match err {
        RecordError::ChecksumMismatch {
            expected,
            calculated,
        } => error!(
            key = %key,
            path = %path.display(),
            expected = %expected,
            calculated = %calculated,
            "save_checksum_mismatch_tampered"
        ),
        other => error!(
            key = %key,
            path = %path.display(),
            error = %other,
            "save_record_unreadable"
        ),
    }
}

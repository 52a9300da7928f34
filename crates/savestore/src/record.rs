use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::checksum::checksum;
use crate::cipher::{self, CipherError};

pub const RECORD_FORMAT_VERSION: u32 = 1;

/// On-disk wrapper around one saved value.
///
/// `checksum` always covers the plaintext, never the ciphertext, so a record
/// can be verified only after it has been decrypted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Record {
    #[serde(default)]
    pub version: u32,
    pub encrypted: bool,
    pub checksum: String,
    pub data: String,
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("failed to read record {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse record {path} at {json_path}: {source}")]
    Parse {
        path: PathBuf,
        json_path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("record version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
    #[error("failed to decrypt record data: {0}")]
    Decrypt(#[from] CipherError),
    #[error("checksum mismatch: expected {expected}, calculated {calculated}")]
    ChecksumMismatch {
        expected: String,
        calculated: String,
    },
}

impl Record {
    pub fn seal(
        plaintext: &str,
        encrypt: bool,
        salt: &str,
        passphrase: &str,
    ) -> Result<Self, CipherError> {
        let data = if encrypt {
            let key = cipher::derive_key(passphrase)?;
            cipher::encrypt(&key, plaintext)
        } else {
            plaintext.to_string()
        };

        Ok(Self {
            version: RECORD_FORMAT_VERSION,
            encrypted: encrypt,
            checksum: checksum(salt, plaintext),
            data,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
        })
    }

    /// Decrypts if needed and verifies the checksum, returning the plaintext.
    pub fn open(&self, salt: &str, passphrase: &str) -> Result<String, RecordError> {
        if self.version > RECORD_FORMAT_VERSION {
            return Err(RecordError::UnsupportedVersion {
                found: self.version,
                supported: RECORD_FORMAT_VERSION,
            });
        }

        let plaintext = if self.encrypted {
            let key = cipher::derive_key(passphrase)?;
            cipher::decrypt(&key, &self.data)?
        } else {
            self.data.clone()
        };

        let calculated = checksum(salt, &plaintext);
        if calculated != self.checksum {
            return Err(RecordError::ChecksumMismatch {
                expected: self.checksum.clone(),
                calculated,
            });
        }
        Ok(plaintext)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(raw: &str, path: &Path) -> Result<Self, RecordError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        let record = serde_path_to_error::deserialize::<_, Record>(&mut deserializer)
            .map_err(|error| {
                let json_path = error.path().to_string();
                RecordError::Parse {
                    path: path.to_path_buf(),
                    json_path,
                    source: error.into_inner(),
                }
            })?;
        deserializer.end().map_err(|source| RecordError::Parse {
            path: path.to_path_buf(),
            json_path: ".".to_string(),
            source,
        })?;
        Ok(record)
    }
}

pub(crate) fn read_record(path: &Path) -> Result<Record, RecordError> {
    let raw = fs::read_to_string(path).map_err(|source| RecordError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Record::from_json(&raw, path)
}

// Path: crates/crypto/src/wallet.rs
//! File-backed and in-memory identity wallets.
//!
//! Both wallets store [`IdentityRecord`]s: PEM certificate plus PKCS#8 PEM
//! private key. Records never become usable identities until [`enroll`]
//! re-imports the key into a crypto suite, at which point only an opaque
//! handle circulates.

use dashmap::DashMap;
use std::fs;
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

use weft_api::{CryptoSuite, Wallet};
use weft_types::error::{CryptoError, WalletError};
use weft_types::identity::{Identity, IdentityRecord};

/// Re-imports a stored record into `suite` and produces a usable identity.
pub fn enroll(
    suite: &dyn CryptoSuite,
    record: &IdentityRecord,
) -> Result<Identity, CryptoError> {
    let key_pem = Zeroizing::new(record.private_key_pem.clone());
    let key = suite.import_key(&key_pem)?;
    Ok(Identity {
        msp_id: record.msp_id.clone(),
        certificate: record.certificate_pem.clone().into_bytes(),
        key,
    })
}

/// A wallet keeping one JSON file per label under a directory.
#[derive(Debug)]
pub struct FileWallet {
    dir: PathBuf,
}

impl FileWallet {
    /// Opens (and creates, if needed) a wallet rooted at `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, WalletError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| WalletError::Io(e.to_string()))?;
        Ok(Self { dir })
    }

    fn path_for(&self, label: &str) -> PathBuf {
        self.dir.join(format!("{}.json", label))
    }
}

impl Wallet for FileWallet {
    fn get(&self, label: &str) -> Result<IdentityRecord, WalletError> {
        let path = self.path_for(label);
        if !path.exists() {
            return Err(WalletError::NotFound(label.to_string()));
        }
        let contents =
            Zeroizing::new(fs::read_to_string(&path).map_err(|e| WalletError::Io(e.to_string()))?);
        serde_json::from_str(&contents).map_err(|e| WalletError::Serde(e.to_string()))
    }

    fn put(&self, label: &str, record: &IdentityRecord) -> Result<(), WalletError> {
        let json = serde_json::to_string_pretty(record)
            .map_err(|e| WalletError::Serde(e.to_string()))?;
        fs::write(self.path_for(label), json).map_err(|e| WalletError::Io(e.to_string()))
    }

    fn list(&self) -> Result<Vec<String>, WalletError> {
        let mut labels = Vec::new();
        let entries = fs::read_dir(&self.dir).map_err(|e| WalletError::Io(e.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|e| WalletError::Io(e.to_string()))?;
            let name = entry.file_name();
            if let Some(label) = name.to_string_lossy().strip_suffix(".json") {
                labels.push(label.to_string());
            }
        }
        labels.sort();
        Ok(labels)
    }

    fn remove(&self, label: &str) -> Result<(), WalletError> {
        let path = self.path_for(label);
        if !path.exists() {
            return Err(WalletError::NotFound(label.to_string()));
        }
        fs::remove_file(path).map_err(|e| WalletError::Io(e.to_string()))
    }
}

/// A wallet that lives entirely in memory. Useful for tests and for
/// deployments that inject credentials from the environment.
#[derive(Debug, Default)]
pub struct MemoryWallet {
    records: DashMap<String, IdentityRecord>,
}

impl MemoryWallet {
    /// Creates an empty wallet.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Wallet for MemoryWallet {
    fn get(&self, label: &str) -> Result<IdentityRecord, WalletError> {
        self.records
            .get(label)
            .map(|r| r.clone())
            .ok_or_else(|| WalletError::NotFound(label.to_string()))
    }

    fn put(&self, label: &str, record: &IdentityRecord) -> Result<(), WalletError> {
        self.records.insert(label.to_string(), record.clone());
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>, WalletError> {
        let mut labels: Vec<String> = self.records.iter().map(|e| e.key().clone()).collect();
        labels.sort();
        Ok(labels)
    }

    fn remove(&self, label: &str) -> Result<(), WalletError> {
        self.records
            .remove(label)
            .map(|_| ())
            .ok_or_else(|| WalletError::NotFound(label.to_string()))
    }
}

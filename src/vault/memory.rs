use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use super::{Frontmatter, FrontmatterStore, VaultError, VaultFile};

/// In-process document store used as a host double and by tests.
#[derive(Debug, Default)]
pub struct MemoryVault {
    files: Mutex<BTreeMap<VaultFile, Frontmatter>>,
    failing_writes: Mutex<BTreeSet<String>>,
    failing_reads: Mutex<BTreeSet<String>>,
    writes: Mutex<usize>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: &str, frontmatter: Frontmatter) -> VaultFile {
        let file = VaultFile::new(path);
        self.files.lock().insert(file.clone(), frontmatter);
        file
    }

    /// Inserts a file whose front-matter holds `key: value`.
    pub fn insert_with(&self, path: &str, key: &str, value: Value) -> VaultFile {
        self.insert(path, Frontmatter::from([(key.to_string(), value)]))
    }

    pub fn frontmatter(&self, path: &str) -> Option<Frontmatter> {
        self.files.lock().get(&VaultFile::new(path)).cloned()
    }

    pub fn fail_writes_to(&self, path: &str) {
        self.failing_writes
            .lock()
            .insert(VaultFile::new(path).path().to_string());
    }

    pub fn fail_reads_of(&self, path: &str) {
        self.failing_reads
            .lock()
            .insert(VaultFile::new(path).path().to_string());
    }

    pub fn write_count(&self) -> usize {
        *self.writes.lock()
    }
}

#[async_trait]
impl FrontmatterStore for MemoryVault {
    async fn list_files(&self) -> Result<Vec<VaultFile>, VaultError> {
        Ok(self.files.lock().keys().cloned().collect())
    }

    async fn read_frontmatter(&self, file: &VaultFile) -> Result<Frontmatter, VaultError> {
        if self.failing_reads.lock().contains(file.path()) {
            return Err(VaultError::Io {
                path: file.path().to_string(),
                source: std::io::Error::other("simulated read failure"),
            });
        }
        self.files
            .lock()
            .get(file)
            .cloned()
            .ok_or_else(|| VaultError::NotFound(file.path().to_string()))
    }

    async fn write_frontmatter_key(
        &self,
        file: &VaultFile,
        key: &str,
        value: Value,
    ) -> Result<(), VaultError> {
        if self.failing_writes.lock().contains(file.path()) {
            return Err(VaultError::WriteRejected {
                path: file.path().to_string(),
                message: "simulated write failure".to_string(),
            });
        }
        let mut files = self.files.lock();
        let frontmatter = files
            .get_mut(file)
            .ok_or_else(|| VaultError::NotFound(file.path().to_string()))?;
        frontmatter.insert(key.to_string(), value);
        *self.writes.lock() += 1;
        Ok(())
    }
}

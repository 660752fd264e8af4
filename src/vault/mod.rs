//! Host document-store seam.
//!
//! The status core never parses documents itself; it reads a front-matter
//! mapping per file and replaces single keys wholesale through
//! [`FrontmatterStore`].

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

mod fs;
#[cfg(test)]
mod memory;

pub use fs::FsVault;
#[cfg(test)]
pub use memory::MemoryVault;

pub const MARKDOWN_EXTENSION: &str = "md";

pub type Frontmatter = BTreeMap<String, Value>;

/// A document addressed by its vault-relative, `/`-separated path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct VaultFile {
    path: String,
}

impl VaultFile {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into().replace('\\', "/");
        Self {
            path: path.trim_start_matches("./").trim_start_matches('/').to_string(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    pub fn basename(&self) -> &str {
        let name = self.name();
        match name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => name,
        }
    }

    pub fn extension(&self) -> Option<&str> {
        let name = self.name();
        match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => Some(ext),
            _ => None,
        }
    }

    pub fn is_markdown(&self) -> bool {
        self.extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(MARKDOWN_EXTENSION))
    }
}

impl fmt::Display for VaultFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("file '{0}' not found in vault")]
    NotFound(String),
    #[error("front-matter of '{path}' is not a key/value mapping")]
    NotAMapping { path: String },
    #[error("invalid front-matter in '{path}': {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[cfg(test)]
    #[error("write to '{path}' rejected: {message}")]
    WriteRejected { path: String, message: String },
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[async_trait]
pub trait FrontmatterStore: Send + Sync {
    /// Every file in the vault, sorted by path.
    async fn list_files(&self) -> Result<Vec<VaultFile>, VaultError>;

    /// The file's front-matter; empty when the file has none.
    async fn read_frontmatter(&self, file: &VaultFile) -> Result<Frontmatter, VaultError>;

    /// Replaces one front-matter key wholesale, creating the block if absent.
    /// Each call is atomic with respect to the file.
    async fn write_frontmatter_key(
        &self,
        file: &VaultFile,
        key: &str,
        value: Value,
    ) -> Result<(), VaultError>;
}

pub fn status_array(statuses: &[String]) -> Value {
    Value::Array(statuses.iter().cloned().map(Value::String).collect())
}

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;

use super::{Frontmatter, FrontmatterStore, VaultError, VaultFile};

/// Markdown files on disk, front-matter stored as a leading YAML block.
#[derive(Debug, Clone)]
pub struct FsVault {
    root: PathBuf,
}

impl FsVault {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, file: &VaultFile) -> Result<PathBuf, VaultError> {
        let relative = Path::new(file.path());
        let escapes = relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_)));
        if escapes || file.path().is_empty() {
            return Err(VaultError::NotFound(file.path().to_string()));
        }
        Ok(self.root.join(relative))
    }

    async fn read_content(&self, file: &VaultFile) -> Result<String, VaultError> {
        let path = self.resolve(file)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(content),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(VaultError::NotFound(file.path().to_string()))
            }
            Err(source) => Err(VaultError::Io {
                path: file.path().to_string(),
                source,
            }),
        }
    }
}

#[async_trait]
impl FrontmatterStore for FsVault {
    async fn list_files(&self) -> Result<Vec<VaultFile>, VaultError> {
        let mut files = Vec::new();
        let mut dirs = vec![self.root.clone()];
        while let Some(dir) = dirs.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await.map_err(|source| VaultError::Io {
                path: dir.display().to_string(),
                source,
            })?;
            while let Some(entry) = entries.next_entry().await.map_err(|source| VaultError::Io {
                path: dir.display().to_string(),
                source,
            })? {
                let name = entry.file_name();
                if name.to_string_lossy().starts_with('.') {
                    continue;
                }
                let path = entry.path();
                let file_type = entry.file_type().await.map_err(|source| VaultError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
                if file_type.is_dir() {
                    dirs.push(path);
                } else if file_type.is_file() {
                    if let Ok(relative) = path.strip_prefix(&self.root) {
                        files.push(VaultFile::new(relative.to_string_lossy().into_owned()));
                    }
                }
            }
        }
        files.sort();
        Ok(files)
    }

    async fn read_frontmatter(&self, file: &VaultFile) -> Result<Frontmatter, VaultError> {
        let content = self.read_content(file).await?;
        let Some((yaml, _)) = split_frontmatter(&content) else {
            return Ok(Frontmatter::new());
        };
        parse_mapping(file, yaml)
    }

    async fn write_frontmatter_key(
        &self,
        file: &VaultFile,
        key: &str,
        value: Value,
    ) -> Result<(), VaultError> {
        let path = self.resolve(file)?;
        let content = self.read_content(file).await?;
        let (mut mapping, body) = match split_frontmatter(&content) {
            Some((yaml, body)) => (parse_yaml_mapping(file, yaml)?, body),
            None => (serde_yaml::Mapping::new(), content.as_str()),
        };

        let yaml_value = serde_yaml::to_value(&value).map_err(|source| VaultError::Yaml {
            path: file.path().to_string(),
            source,
        })?;
        mapping.insert(serde_yaml::Value::String(key.to_string()), yaml_value);
        let rendered = render_with_frontmatter(file, &mapping, body)?;

        let staging = path.with_extension("md.vault-status.tmp");
        let io_err = |source| VaultError::Io {
            path: file.path().to_string(),
            source,
        };
        tokio::fs::write(&staging, rendered).await.map_err(io_err)?;
        tokio::fs::rename(&staging, &path).await.map_err(io_err)?;
        Ok(())
    }
}

/// Splits `---`-delimited front-matter from the body. Returns the YAML text and
/// the body exactly as it follows the closing delimiter line.
pub(crate) fn split_frontmatter(content: &str) -> Option<(&str, &str)> {
    let rest = content.strip_prefix('\u{feff}').unwrap_or(content);
    let rest = rest
        .strip_prefix("---\n")
        .or_else(|| rest.strip_prefix("---\r\n"))?;

    if let Some(body) = rest.strip_prefix("---\n").or_else(|| rest.strip_prefix("---\r\n")) {
        return Some(("", body));
    }

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if offset > 0 && (trimmed == "---" || trimmed == "...") {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return Some((yaml, body));
        }
        offset += line.len();
    }
    if rest.trim_end() == "---" {
        return Some(("", ""));
    }
    None
}

fn parse_yaml_mapping(file: &VaultFile, yaml: &str) -> Result<serde_yaml::Mapping, VaultError> {
    if yaml.trim().is_empty() {
        return Ok(serde_yaml::Mapping::new());
    }
    let value: serde_yaml::Value =
        serde_yaml::from_str(yaml).map_err(|source| VaultError::Yaml {
            path: file.path().to_string(),
            source,
        })?;
    match value {
        serde_yaml::Value::Mapping(mapping) => Ok(mapping),
        serde_yaml::Value::Null => Ok(serde_yaml::Mapping::new()),
        _ => Err(VaultError::NotAMapping {
            path: file.path().to_string(),
        }),
    }
}

fn parse_mapping(file: &VaultFile, yaml: &str) -> Result<Frontmatter, VaultError> {
    let mapping = parse_yaml_mapping(file, yaml)?;
    let mut frontmatter = Frontmatter::new();
    for (key, value) in mapping {
        let Some(key) = key.as_str() else {
            continue;
        };
        // Values JSON cannot express (tagged or non-string-keyed) are skipped.
        if let Ok(value) = serde_json::to_value(&value) {
            frontmatter.insert(key.to_string(), value);
        }
    }
    Ok(frontmatter)
}

fn render_with_frontmatter(
    file: &VaultFile,
    mapping: &serde_yaml::Mapping,
    body: &str,
) -> Result<String, VaultError> {
    let yaml = serde_yaml::to_string(mapping).map_err(|source| VaultError::Yaml {
        path: file.path().to_string(),
        source,
    })?;
    Ok(format!("---\n{}\n---\n{}", yaml.trim_end_matches('\n'), body))
}

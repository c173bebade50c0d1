//! Where model bytes come from.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

/// Errors from fetching model bytes.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SourceError {
    #[error("model not found: {identifier}")]
    NotFound { identifier: String },

    #[error("identifier escapes the model root: {identifier}")]
    OutsideRoot { identifier: String },

    #[error("failed to read {identifier}: {reason}")]
    Io { identifier: String, reason: String },
}

/// Fetches raw document bytes by identifier.
pub trait ModelSource {
    fn fetch(&self, identifier: &str) -> Result<Vec<u8>, SourceError>;
}

/// Files under a root directory.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve an identifier to a path inside the root.
    /// A leading `/` is accepted, as in `/models/model1.STEP`.
    fn resolve(&self, identifier: &str) -> Result<PathBuf, SourceError> {
        let relative = Path::new(identifier.trim_start_matches('/'));
        let mut path = self.root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(part) => path.push(part),
                Component::CurDir => {}
                _ => {
                    return Err(SourceError::OutsideRoot {
                        identifier: identifier.to_string(),
                    })
                }
            }
        }
        Ok(path)
    }
}

impl ModelSource for DirectorySource {
    fn fetch(&self, identifier: &str) -> Result<Vec<u8>, SourceError> {
        let path = self.resolve(identifier)?;
        std::fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => SourceError::NotFound {
                identifier: identifier.to_string(),
            },
            _ => SourceError::Io {
                identifier: identifier.to_string(),
                reason: e.to_string(),
            },
        })
    }
}

/// In-memory documents keyed by identifier.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    documents: HashMap<String, Vec<u8>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, identifier: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.documents.insert(identifier.into(), bytes.into());
    }

    pub fn with(mut self, identifier: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(identifier, bytes);
        self
    }
}

impl ModelSource for MemorySource {
    fn fetch(&self, identifier: &str) -> Result<Vec<u8>, SourceError> {
        self.documents
            .get(identifier)
            .cloned()
            .ok_or_else(|| SourceError::NotFound {
                identifier: identifier.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_source_reads_inside_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("models")).unwrap();
        std::fs::write(dir.path().join("models/model1.STEP"), b"ISO").unwrap();

        let source = DirectorySource::new(dir.path());
        assert_eq!(source.fetch("models/model1.STEP").unwrap(), b"ISO");
        assert_eq!(source.fetch("/models/model1.STEP").unwrap(), b"ISO");
        assert!(matches!(
            source.fetch("models/model9.STEP"),
            Err(SourceError::NotFound { .. })
        ));
    }

    #[test]
    fn directory_source_rejects_escapes() {
        let dir = tempfile::tempdir().unwrap();
        let source = DirectorySource::new(dir.path().join("models"));
        assert!(matches!(
            source.fetch("../secret.STEP"),
            Err(SourceError::OutsideRoot { .. })
        ));
        assert!(matches!(
            source.fetch("models/../../secret.STEP"),
            Err(SourceError::OutsideRoot { .. })
        ));
    }

    #[test]
    fn memory_source() {
        let source = MemorySource::new().with("a", b"bytes".to_vec());
        assert_eq!(source.fetch("a").unwrap(), b"bytes");
        assert!(source.fetch("b").is_err());
    }
}

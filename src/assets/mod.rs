// Asset loading - named raw byte buffers (reverb impulse responses)
//
// Bytes are handed to the renderer undecoded.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("Asset not found: {0}")]
    NotFound(String),

    #[error("Invalid asset name: {0}")]
    InvalidName(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub trait AssetLoader {
    /// Fetch the raw bytes of the asset called `name`
    fn load(&self, name: &str) -> Result<Vec<u8>, AssetError>;
}

/// Loads assets from files under a root directory
#[derive(Debug, Clone)]
pub struct DirectoryAssetLoader {
    root: PathBuf,
}

impl DirectoryAssetLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Names (relative to the root) of every `.wav` file available
    pub fn available(&self) -> Vec<String> {
        let mut names: Vec<String> = WalkDir::new(&self.root)
            .follow_links(true)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry
                    .path()
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"))
            })
            .filter_map(|entry| {
                entry
                    .path()
                    .strip_prefix(&self.root)
                    .ok()
                    .map(|p| p.to_string_lossy().replace('\\', "/"))
            })
            .collect();
        names.sort();
        names
    }
}

impl AssetLoader for DirectoryAssetLoader {
    fn load(&self, name: &str) -> Result<Vec<u8>, AssetError> {
        let relative = Path::new(name);
        if relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(AssetError::InvalidName(name.to_string()));
        }

        let path = self.root.join(relative);
        if !path.is_file() {
            return Err(AssetError::NotFound(name.to_string()));
        }
        Ok(std::fs::read(path)?)
    }
}

/// Assets held in memory
#[derive(Debug, Default)]
pub struct MemoryAssetLoader {
    assets: RefCell<BTreeMap<String, Vec<u8>>>,
}

impl MemoryAssetLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, name: impl Into<String>, bytes: Vec<u8>) {
        self.assets.borrow_mut().insert(name.into(), bytes);
    }
}

impl AssetLoader for MemoryAssetLoader {
    fn load(&self, name: &str) -> Result<Vec<u8>, AssetError> {
        self.assets
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| AssetError::NotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_directory_loader() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Block Inside.wav"), b"RIFF").unwrap();
        fs::create_dir(dir.path().join("halls")).unwrap();
        fs::write(dir.path().join("halls").join("Deep Space.WAV"), b"RIFF").unwrap();
        fs::write(dir.path().join("notes.txt"), b"-").unwrap();

        let loader = DirectoryAssetLoader::new(dir.path());
        assert_eq!(loader.load("Block Inside.wav").unwrap(), b"RIFF".to_vec());
        assert_eq!(
            loader.available(),
            vec!["Block Inside.wav".to_string(), "halls/Deep Space.WAV".to_string()]
        );
        assert!(matches!(loader.load("missing.wav"), Err(AssetError::NotFound(_))));
        assert!(matches!(
            loader.load("../escape.wav"),
            Err(AssetError::InvalidName(_))
        ));
    }

    #[test]
    fn test_memory_loader() {
        let loader = MemoryAssetLoader::new();
        loader.insert("a.wav", vec![1, 2, 3]);
        assert_eq!(loader.load("a.wav").unwrap(), vec![1, 2, 3]);
        assert!(loader.load("b.wav").is_err());
    }
}

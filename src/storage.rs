use std::path::{Path, PathBuf};

use unicode_normalization::UnicodeNormalization;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("cannot create upload directory {path}: {source}")]
    CreateDir {
        path: String,
        source: std::io::Error,
    },

    #[error("cannot write {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
}

/// Flat directory of uploaded images keyed by sanitized filename.
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|source| StorageError::CreateDir {
            path: root.display().to_string(),
            source,
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes `bytes` under `name`, replacing any earlier upload with the same name.
    /// `name` must already be sanitized.
    pub async fn save(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, StorageError> {
        let path = self.root.join(name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| StorageError::Write {
                path: path.display().to_string(),
                source,
            })?;
        Ok(path)
    }
}

/// Reduces a client-supplied filename to `[A-Za-z0-9_.-]` with no directory part.
/// Accented letters keep their ASCII base (`é` -> `e`).
/// Returns `None` when nothing usable is left.
pub fn sanitize_filename(raw: &str) -> Option<String> {
    let ascii: String = raw
        .nfkd()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let joined = ascii.split_whitespace().collect::<Vec<_>>().join("_");
    let cleaned: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();

    let trimmed = cleaned.trim_matches(|c| c == '.' || c == '_');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_directories_and_unsafe_characters() {
        assert_eq!(
            sanitize_filename("../../etc/passwd").as_deref(),
            Some("etc_passwd")
        );
        assert_eq!(
            sanitize_filename("My Rendang (1).JPG").as_deref(),
            Some("My_Rendang_1.JPG")
        );
        assert_eq!(
            sanitize_filename("C:\\photos\\sate.png").as_deref(),
            Some("C_photos_sate.png")
        );
        assert_eq!(sanitize_filename("soto.jpeg").as_deref(), Some("soto.jpeg"));
        assert_eq!(sanitize_filename(".hidden_").as_deref(), Some("hidden"));
    }

    #[test]
    fn sanitize_transliterates_accented_letters() {
        assert_eq!(
            sanitize_filename("Résumé.png").as_deref(),
            Some("Resume.png")
        );
        assert_eq!(
            sanitize_filename("Soto Ayam Lamongan ñ.jpg").as_deref(),
            Some("Soto_Ayam_Lamongan_n.jpg")
        );
    }

    #[test]
    fn sanitize_drops_non_ascii() {
        assert_eq!(sanitize_filename("nasi 🍛.png").as_deref(), Some("nasi_.png"));
    }

    #[test]
    fn sanitize_rejects_names_that_vanish() {
        assert_eq!(sanitize_filename(""), None);
        assert_eq!(sanitize_filename("../"), None);
        assert_eq!(sanitize_filename("🍜🍜"), None);
    }

    #[tokio::test]
    async fn save_creates_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::open(dir.path().join("uploads")).unwrap();

        let path = store.save("a.png", b"first").await.unwrap();
        assert_eq!(path, dir.path().join("uploads").join("a.png"));
        store.save("a.png", b"second").await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"second");
    }
}

use crate::core::Storage;
use crate::utils::error::{ExportError, Result};
use std::path::{Path, PathBuf};

/// Filesystem storage rooted at `base_path`; relative paths (including `..`)
/// resolve against it.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: String,
}

impl LocalStorage {
    pub fn new(base_path: String) -> Self {
        Self { base_path }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        Path::new(&self.base_path).join(path)
    }
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.resolve(path);
        match tokio::fs::read(&full_path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ExportError::SourceNotFound {
                path: full_path.display().to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.resolve(path);

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // 先寫暫存檔再改名，失敗時目的地不會留下不完整的檔案
        let mut partial = full_path.clone().into_os_string();
        partial.push(".partial");
        let partial = PathBuf::from(partial);

        if let Err(e) = tokio::fs::write(&partial, data).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e.into());
        }

        if let Err(e) = tokio::fs::rename(&partial, &full_path).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e.into());
        }

        Ok(())
    }
}

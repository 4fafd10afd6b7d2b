//! On-disk [`FileStore`] for uploaded documents.
//!
//! Files land under the configured directory as `{id}_{filename}`, with
//! the filename sanitized so a crafted upload name cannot escape the
//! directory.

use std::path::PathBuf;

use anyhow::Context;
use docdex_core::error::{Error, Result};
use docdex_core::files::FileStore;

pub struct FsFileStore {
    root: PathBuf,
}

impl FsFileStore {
    pub fn new(root: PathBuf) -> Self {
        FsFileStore { root }
    }
}

fn sanitize_filename(filename: &str) -> String {
    let cleaned: String = filename
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

impl FileStore for FsFileStore {
    fn save(&self, id: &str, filename: &str, bytes: &[u8]) -> Result<String> {
        std::fs::create_dir_all(&self.root)
            .with_context(|| format!("create files dir {}", self.root.display()))?;
        let path = self.root.join(format!("{id}_{}", sanitize_filename(filename)));
        std::fs::write(&path, bytes)
            .with_context(|| format!("write uploaded file {}", path.display()))?;
        Ok(path.to_string_lossy().into_owned())
    }

    fn load(&self, location: &str) -> Result<Vec<u8>> {
        match std::fs::read(location) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("stored file: {location}")))
            }
            Err(e) => Err(anyhow::Error::from(e)
                .context(format!("read stored file {location}"))
                .into()),
        }
    }

    fn remove(&self, location: &str) -> Result<()> {
        match std::fs::remove_file(location) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(anyhow::Error::from(e)
                .context(format!("remove stored file {location}"))
                .into()),
        }
    }
}

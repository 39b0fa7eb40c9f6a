//! A file-backed secret store
//!
//! Secrets live in a single directory, one `<name>.json` file per secret. Characters
//! in the name outside of `[A-Za-z0-9._+=@-]` are percent-encoded, so hierarchical
//! names such as `prod/api/token` map to a single flat file.
//!
//! Like a managed store, this store only overwrites secrets that already exist;
//! create the file before the first write. On unix, a written file is restricted
//! to its owner before the new value lands in it.

use std::{fmt::Write as _, io, path::PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, OpenOptions};

use crate::{SecretNameRef, SecretStore, StoreError};

/// A secret store that uses a local directory
#[derive(Debug)]
pub struct FileSecretStore {
    dir: PathBuf,
}

impl FileSecretStore {
    /// Constructs a new store rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, name: &SecretNameRef) -> Result<PathBuf, StoreError> {
        let name = name.as_str();
        if name.is_empty() || name == "." || name == ".." {
            return Err(StoreError::backend(format!(
                "invalid secret name for file store: {:?}",
                name
            )));
        }

        let mut file_name = String::with_capacity(name.len() + 5);
        for b in name.bytes() {
            if b.is_ascii_alphanumeric() || b"._+=@-".contains(&b) {
                file_name.push(b as char);
            } else {
                let _ = write!(file_name, "%{:02X}", b);
            }
        }
        file_name.push_str(".json");

        Ok(self.dir.join(file_name))
    }

    fn map_io(name: &SecretNameRef, err: io::Error) -> StoreError {
        if err.kind() == io::ErrorKind::NotFound {
            StoreError::NotFound(name.to_owned())
        } else {
            StoreError::backend(err)
        }
    }

    async fn write_file(path: PathBuf, value: String) -> Result<(), io::Error> {
        use tokio::io::AsyncWriteExt;

        let mut file_opts = OpenOptions::new();

        file_opts.truncate(true).write(true);

        let mut file = file_opts.open(&path).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))
                .await?;
        }

        file.write_all(value.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl SecretStore for FileSecretStore {
    async fn get_secret_string(&self, name: &SecretNameRef) -> Result<String, StoreError> {
        let path = self.path_for(name)?;
        fs::read_to_string(&path)
            .await
            .map_err(|err| Self::map_io(name, err))
    }

    async fn put_secret_string(
        &self,
        name: &SecretNameRef,
        value: String,
    ) -> Result<(), StoreError> {
        let path = self.path_for(name)?;
        Self::write_file(path, value)
            .await
            .map_err(|err| Self::map_io(name, err))
    }
}

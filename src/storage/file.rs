//! [`AnimationStorage`] in a single file, for running the core on a desktop.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{AnimationStorage, PersistenceError};

/// Keeps the last upload in one file. A missing file means nothing was saved.
#[derive(Clone, Debug)]
pub struct FileAnimationStorage {
    path: PathBuf,
}

impl FileAnimationStorage {
    /// Store at `path`. The file is created on the first save.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Location of the file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AnimationStorage for FileAnimationStorage {
    fn load(&mut self, buffer: &mut [u8]) -> Result<Option<usize>, PersistenceError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                warn!("FileAnimationStorage: read {:?} failed: {}", self.path, err);
                return Err(PersistenceError::Io);
            }
        };
        let capacity = buffer.len();
        let target = buffer
            .get_mut(..bytes.len())
            .ok_or(PersistenceError::TooLarge {
                len: bytes.len(),
                capacity,
            })?;
        target.copy_from_slice(&bytes);
        Ok(Some(bytes.len()))
    }

    async fn save(&mut self, raw: &[u8]) -> Result<(), PersistenceError> {
        fs::write(&self.path, raw).map_err(|err| {
            warn!("FileAnimationStorage: write {:?} failed: {}", self.path, err);
            PersistenceError::Io
        })
    }
}

// Copyright 2026 Flatsql Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! File handles and locking
//!
//! Cross-process exclusion uses sidecar lock files (`.<name>.lock`) held
//! for the lifetime of an update handle, acquired with a configurable wait
//! timeout and retry delay. Writes go to a temp file in the target
//! directory followed by a rename. Handlers are always acquired before
//! the view-cache entry is inserted, never while holding the cache lock.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::core::{Error, Result};

/// A handle on a source file, exclusive when opened for update
#[derive(Debug)]
pub struct FileHandler {
    path: PathBuf,
    lock_path: Option<PathBuf>,
}

impl FileHandler {
    /// Open for reading. Waits for any exclusive holder to release, then
    /// reads without leaving a lock behind.
    pub fn for_read(path: &Path, wait_timeout: Duration, retry_delay: Duration) -> Result<FileHandler> {
        let lock_path = lock_path_of(path);
        let deadline = Instant::now() + wait_timeout;
        while lock_path.exists() {
            if deadline <= Instant::now() {
                return Err(Error::FileLockTimeout(path.display().to_string()));
            }
            std::thread::sleep(retry_delay);
        }
        Ok(FileHandler {
            path: path.to_path_buf(),
            lock_path: None,
        })
    }

    /// Open for update, holding the exclusive lock file until release
    pub fn for_update(
        path: &Path,
        wait_timeout: Duration,
        retry_delay: Duration,
    ) -> Result<FileHandler> {
        let lock_path = lock_path_of(path);
        let deadline = Instant::now() + wait_timeout;
        loop {
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&lock_path)
            {
                Ok(_) => {
                    return Ok(FileHandler {
                        path: path.to_path_buf(),
                        lock_path: Some(lock_path),
                    })
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if deadline <= Instant::now() {
                        return Err(Error::FileLockTimeout(path.display().to_string()));
                    }
                    std::thread::sleep(retry_delay);
                }
                Err(e) => return Err(Error::io(path.display().to_string(), e.to_string())),
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read_bytes(&self) -> Result<Vec<u8>> {
        fs::read(&self.path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::FileNotFound(self.path.display().to_string()),
            _ => Error::io(self.path.display().to_string(), e.to_string()),
        })
    }

    /// Replace the file contents atomically: write a temp file next to
    /// the target, then rename over it
    pub fn write_atomic(&self, bytes: &[u8]) -> Result<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let temp = dir.join(format!(
            ".{}.tmp",
            self.path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("flatsql")
        ));

        let write = || -> std::io::Result<()> {
            let mut f = fs::File::create(&temp)?;
            f.write_all(bytes)?;
            f.sync_all()?;
            fs::rename(&temp, &self.path)
        };
        write().map_err(|e| {
            let _ = fs::remove_file(&temp);
            Error::io(self.path.display().to_string(), e.to_string())
        })
    }

    /// Drop the exclusive lock early
    pub fn release(&mut self) {
        if let Some(lock) = self.lock_path.take() {
            let _ = fs::remove_file(lock);
        }
    }
}

impl Drop for FileHandler {
    fn drop(&mut self) {
        self.release();
    }
}

fn lock_path_of(path: &Path) -> PathBuf {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("flatsql");
    dir.join(format!(".{}.lock", name))
}

/// Create a brand new file; fails if one already exists
pub fn create_new_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::AlreadyExists => {
                Error::FileAlreadyExists(path.display().to_string())
            }
            _ => Error::io(path.display().to_string(), e.to_string()),
        })?;
    file.write_all(bytes)
        .and_then(|_| file.sync_all())
        .map_err(|e| Error::io(path.display().to_string(), e.to_string()))
}

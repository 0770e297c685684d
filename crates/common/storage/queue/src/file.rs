// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Positional reads and writes over the queue's backing file.

use std::{
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use snafu::ResultExt;

use crate::{FlushMode, Result, error::IoSnafu};

/// The backing file of a [`DurableQueue`](crate::DurableQueue).
///
/// Thin wrapper over [`File`] that attaches the path to every I/O error and
/// applies the configured [`FlushMode`].
pub(crate) struct QueueFile {
    file:       File,
    path:       PathBuf,
    flush_mode: FlushMode,
}

impl QueueFile {
    /// Open the file at `path`, creating it (and its parent directory) when
    /// missing.
    pub fn open_or_create<P: AsRef<Path>>(path: P, flush_mode: FlushMode) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context(IoSnafu { path: parent })?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .context(IoSnafu { path: &path })?;

        Ok(Self {
            file,
            path,
            flush_mode,
        })
    }

    /// Physical length of the file on disk.
    pub fn physical_length(&self) -> Result<u64> {
        Ok(self
            .file
            .metadata()
            .context(IoSnafu { path: &self.path })?
            .len())
    }

    pub fn set_length(&mut self, length: u64) -> Result<()> {
        self.file
            .set_len(length)
            .context(IoSnafu { path: &self.path })
    }

    #[inline]
    pub fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(offset))
            .and_then(|_| self.file.read_exact(buf))
            .context(IoSnafu { path: &self.path })
    }

    #[inline]
    pub fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(offset))
            .and_then(|_| self.file.write_all(data))
            .context(IoSnafu { path: &self.path })
    }

    /// Force written data to disk if the flush mode asks for it.
    pub fn flush(&mut self) -> Result<()> {
        match self.flush_mode {
            FlushMode::Sync => self.file.sync_data().context(IoSnafu { path: &self.path }),
            FlushMode::Async => Ok(()),
        }
    }

    pub fn path(&self) -> &Path { &self.path }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_missing_file_and_parent() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("queue");

        let file = QueueFile::open_or_create(&path, FlushMode::Sync).unwrap();
        assert_eq!(file.physical_length().unwrap(), 0);
        assert!(path.exists());
    }

    #[test]
    fn test_write_and_read_at_offset() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("queue");

        {
            let mut file = QueueFile::open_or_create(&path, FlushMode::Sync).unwrap();
            file.set_length(4096).unwrap();
            file.write_at(100, b"Test data at offset").unwrap();
            file.flush().unwrap();
        }

        let mut file = QueueFile::open_or_create(&path, FlushMode::Async).unwrap();
        assert_eq!(file.physical_length().unwrap(), 4096);
        let mut buf = [0u8; 19];
        file.read_at(100, &mut buf).unwrap();
        assert_eq!(&buf, b"Test data at offset");
    }

    #[test]
    fn test_read_past_end_fails() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut file =
            QueueFile::open_or_create(temp_dir.path().join("queue"), FlushMode::Sync).unwrap();
        file.set_length(16).unwrap();
        let mut buf = [0u8; 32];
        assert!(file.read_at(0, &mut buf).is_err());
    }
}

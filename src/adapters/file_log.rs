//! File-backed [`LogStore`].
//!
//! On the device the path lives on the flash filesystem mounted by the
//! VFS layer; on host it is an ordinary file.  `replace` writes a sibling
//! `.tmp` file, syncs it and renames it over the log, so a power cut during
//! a flush leaves either the old or the new log, never a torn one.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use log::warn;

use crate::app::ports::LogStore;
use crate::error::StorageError;

pub struct FileLogStore {
    path: PathBuf,
    tmp_path: PathBuf,
}

impl FileLogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        Self {
            path,
            tmp_path: PathBuf::from(tmp),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_tmp(&self, lines: &[String]) -> io::Result<()> {
        let mut f = File::create(&self.tmp_path)?;
        for line in lines {
            f.write_all(line.as_bytes())?;
            f.write_all(b"\n")?;
        }
        f.sync_all()
    }
}

impl LogStore for FileLogStore {
    fn append_line(&mut self, line: &str) -> Result<(), StorageError> {
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|_| StorageError::OpenFailed)?;
        // One write call per record keeps a record and its newline together.
        let mut record = String::with_capacity(line.len() + 1);
        record.push_str(line);
        record.push('\n');
        f.write_all(record.as_bytes())
            .map_err(|_| StorageError::WriteFailed)
    }

    fn read_lines(&mut self) -> Result<Vec<String>, StorageError> {
        let f = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(_) => return Err(StorageError::OpenFailed),
        };
        let mut lines = Vec::new();
        for line in BufReader::new(f).lines() {
            let line = line.map_err(|_| StorageError::ReadFailed)?;
            // A torn final record from a power cut has no content worth keeping.
            if !line.is_empty() {
                lines.push(line);
            }
        }
        Ok(lines)
    }

    fn replace(&mut self, lines: &[String]) -> Result<(), StorageError> {
        if self.write_tmp(lines).is_err() {
            let _ = fs::remove_file(&self.tmp_path);
            return Err(StorageError::WriteFailed);
        }
        fs::rename(&self.tmp_path, &self.path).map_err(|e| {
            warn!("Log replace: rename failed: {}", e);
            let _ = fs::remove_file(&self.tmp_path);
            StorageError::ReplaceFailed
        })
    }

    fn remove(&mut self) -> Result<(), StorageError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(_) => Err(StorageError::WriteFailed),
        }
    }
}

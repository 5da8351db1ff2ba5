use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::StoreError;

/// Set of codes that have already been reported. Codes are never removed.
pub trait CodeStore {
    fn contains(&self, code: &str) -> bool;

    /// Record `code` durably. Returns `Ok(false)` when it was already known.
    /// On error the code must not be treated as known.
    fn add(&mut self, code: &str) -> Result<bool, StoreError>;

    fn len(&self) -> usize;
}

/// Known codes backed by an append-only text file, one code per line.
#[derive(Debug)]
pub struct FileCodeStore {
    path: PathBuf,
    codes: HashSet<String>,
    // file exists and its last byte is not '\n'
    needs_newline: bool,
}

impl FileCodeStore {
    /// Read every stored code. A missing file means a first run.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(source) => {
                return Err(StoreError::Load {
                    path: path.display().to_string(),
                    source,
                })
            }
        };

        let codes: HashSet<String> = raw
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect();
        let needs_newline = !raw.is_empty() && !raw.ends_with('\n');

        info!("Loaded {} known codes from {:?}", codes.len(), path);
        Ok(FileCodeStore {
            path,
            codes,
            needs_newline,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Known codes, sorted.
    pub fn codes(&self) -> Vec<&str> {
        let mut all: Vec<&str> = self.codes.iter().map(String::as_str).collect();
        all.sort_unstable();
        all
    }

    fn append(&self, code: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let record = if self.needs_newline {
            format!("\n{}\n", code)
        } else {
            format!("{}\n", code)
        };
        file.write_all(record.as_bytes())?;
        file.flush()?;
        file.sync_data()
    }
}

impl CodeStore for FileCodeStore {
    fn contains(&self, code: &str) -> bool {
        self.codes.contains(code)
    }

    fn add(&mut self, code: &str) -> Result<bool, StoreError> {
        if self.codes.contains(code) {
            return Ok(false);
        }
        self.append(code).map_err(|source| StoreError::Append {
            code: code.to_string(),
            path: self.path.display().to_string(),
            source,
        })?;
        self.needs_newline = false;
        self.codes.insert(code.to_string());
        Ok(true)
    }

    fn len(&self) -> usize {
        self.codes.len()
    }
}

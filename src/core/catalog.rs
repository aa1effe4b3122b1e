//! Purpose: Hold the fixed dataset and file-type enumerations plus data-file path resolution.
//! Exports: `Dataset`, `FileType`, `default_data_dir`, `record_path`.
//! Role: Keep server validation and parser path semantics aligned from one source.
//! Invariants: Both enumerations are closed; string forms are the lowercase names.
//! Invariants: Data files live at `<data-dir>/<dataset>/<dataset>.<ext>`.

use crate::core::error::{Error, ErrorKind};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Dataset {
    Books,
    Movies,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum FileType {
    Txt,
    Xml,
    Yaml,
    Json,
    Csv,
}

impl Dataset {
    pub const ALL: [Dataset; 2] = [Dataset::Books, Dataset::Movies];

    pub fn as_str(self) -> &'static str {
        match self {
            Dataset::Books => "books",
            Dataset::Movies => "movies",
        }
    }

    /// Bracketed list of valid names, as it appears in error messages
    /// and the welcome payload.
    pub fn listing() -> String {
        listing(Self::ALL.iter().map(|dataset| dataset.as_str()))
    }
}

impl FileType {
    pub const ALL: [FileType; 5] = [
        FileType::Txt,
        FileType::Xml,
        FileType::Yaml,
        FileType::Json,
        FileType::Csv,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FileType::Txt => "txt",
            FileType::Xml => "xml",
            FileType::Yaml => "yaml",
            FileType::Json => "json",
            FileType::Csv => "csv",
        }
    }

    pub fn listing() -> String {
        listing(Self::ALL.iter().map(|file_type| file_type.as_str()))
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dataset {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Error> {
        Self::ALL
            .into_iter()
            .find(|dataset| dataset.as_str() == value)
            .ok_or_else(|| {
                Error::new(ErrorKind::Usage)
                    .with_message(format!("invalid set name. available sets: {}", Self::listing()))
            })
    }
}

impl FromStr for FileType {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Error> {
        Self::ALL
            .into_iter()
            .find(|file_type| file_type.as_str() == value)
            .ok_or_else(|| {
                Error::new(ErrorKind::Unsupported).with_message(format!(
                    "invalid file type. available types: {}",
                    Self::listing()
                ))
            })
    }
}

fn listing<'a>(values: impl Iterator<Item = &'a str>) -> String {
    let quoted: Vec<String> = values.map(|value| format!("\"{value}\"")).collect();
    format!("[{}]", quoted.join(", "))
}

/// Resolved once at startup: `$PARSEGATE_DATA_DIR`, else `./data` under the
/// working directory.
pub fn default_data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("PARSEGATE_DATA_DIR") {
        return PathBuf::from(dir);
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("data")
}

pub fn record_path(data_dir: &Path, dataset: Dataset, file_type: FileType) -> PathBuf {
    data_dir
        .join(dataset.as_str())
        .join(format!("{}.{}", dataset.as_str(), file_type.as_str()))
}

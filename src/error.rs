use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("cannot create workbook {}: {reason}", .path.display())]
    WorkbookCreation { path: PathBuf, reason: String },

    #[error("cannot add worksheet '{name}': {reason}")]
    SheetCreation { name: String, reason: &'static str },

    #[error("{}: {source}", .path.display())]
    SourceNotFound { path: PathBuf, source: io::Error },

    #[error("interrupted after {rows} row(s)")]
    Interrupted { rows: u32 },

    #[error("delimiter must not be empty")]
    EmptyDelimiter,

    #[error("cell at row {row}, column {col} is outside the worksheet")]
    OutOfBounds { row: u32, col: u32 },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),

    #[error(transparent)]
    Xml(#[from] quick_xml::Error),
}

impl ConvertError {
    /// Short sentence shown to the user above the error detail.
    pub fn headline(&self) -> &'static str {
        match self {
            ConvertError::WorkbookCreation { .. } => {
                "Could not set up workbook, the following error occurred:"
            }
            ConvertError::SheetCreation { .. } => {
                "Could not set up worksheet, the following error occurred:"
            }
            ConvertError::SourceNotFound { .. } => {
                "The .csv file could not be found. Did you type the extension (.csv)?"
            }
            ConvertError::Interrupted { .. } => "Operation interrupted by user.",
            _ => "Could not perform conversion, the following error occurred:",
        }
    }
}

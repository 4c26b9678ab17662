use std::path::PathBuf;

use chrono::NaiveDate;
use tracing::debug;

pub const SOURCE_EXTENSION: &str = ".csv";
pub const WORKBOOK_EXTENSION: &str = ".xlsx";

/// Arguments of a single conversion, as given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    pub input: String,
    pub delimiter: String,
    pub output: String,
}

impl ConversionRequest {
    pub fn new<I, D, O>(input: I, delimiter: D, output: O) -> Self
    where
        I: Into<String>,
        D: Into<String>,
        O: Into<String>,
    {
        ConversionRequest {
            input: input.into(),
            delimiter: delimiter.into(),
            output: output.into(),
        }
    }
}

/// File names derived from a request for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedPaths {
    pub input: PathBuf,
    pub output: PathBuf,
    /// The output name as the user typed it, before the date stamp.
    pub sheet_name: String,
}

impl DerivedPaths {
    pub fn derive(request: &ConversionRequest, today: NaiveDate) -> Self {
        DerivedPaths {
            input: PathBuf::from(normalize_source_name(&request.input)),
            output: PathBuf::from(normalize_output_name(&request.output, today)),
            sheet_name: request.output.clone(),
        }
    }
}

/// Appends `.csv` unless the name already ends with it (any case).
pub fn normalize_source_name(name: &str) -> String {
    if ends_with_ignore_case(name, SOURCE_EXTENSION) {
        debug!("source name {:?} already has {}", name, SOURCE_EXTENSION);
        name.to_string()
    } else {
        debug!("appending {} to source name {:?}", SOURCE_EXTENSION, name);
        format!("{}{}", name, SOURCE_EXTENSION)
    }
}

/// Inserts ` DD-MM-YYYY` before the `.xlsx` suffix, adding the suffix when
/// it is missing. Not idempotent: every call adds another date.
pub fn normalize_output_name(name: &str, today: NaiveDate) -> String {
    let stamp = today.format(" %d-%m-%Y");
    if ends_with_ignore_case(name, WORKBOOK_EXTENSION) {
        let stem = &name[..name.len() - WORKBOOK_EXTENSION.len()];
        debug!("inserting date before {} in {:?}", WORKBOOK_EXTENSION, name);
        format!("{}{}{}", stem, stamp, WORKBOOK_EXTENSION)
    } else {
        debug!("appending date and {} to {:?}", WORKBOOK_EXTENSION, name);
        format!("{}{}{}", name, stamp, WORKBOOK_EXTENSION)
    }
}

fn ends_with_ignore_case(name: &str, suffix: &str) -> bool {
    let (name, suffix) = (name.as_bytes(), suffix.as_bytes());
    name.len() >= suffix.len() && name[name.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
}

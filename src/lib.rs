//! Convert delimited text files into xlsx workbooks.

pub mod convert;
pub mod error;
pub mod logging;
pub mod names;
pub mod to_xlsx;

pub use convert::{Conversion, Converter, Stage};
pub use error::ConvertError;
pub use logging::RunLog;
pub use names::{ConversionRequest, DerivedPaths};

use chrono::{Local, NaiveDate};
use tracing::{debug, error, info};

use std::collections::VecDeque;
use std::fmt;
use std::fs;
use std::io;
use std::io::prelude::*;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::ConvertError;
use crate::logging::RunLog;
use crate::names::{ConversionRequest, DerivedPaths};
use crate::to_xlsx::{Workbook, WorkbookOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    NamesNormalized,
    WorkbookOpen,
    RowsWritten,
    Finalized,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::NamesNormalized => "names normalized",
            Stage::WorkbookOpen => "workbook open",
            Stage::RowsWritten => "rows written",
            Stage::Finalized => "finalized",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Result of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    pub output: PathBuf,
    pub rows: u32,
}

pub struct Converter {
    log: RunLog,
    today: NaiveDate,
    output_dir: Option<PathBuf>,
    interrupted: Arc<AtomicBool>,
    stage: Stage,
}

impl Converter {
    pub fn new(log: RunLog) -> Self {
        Converter {
            log,
            today: Local::now().date_naive(),
            output_dir: None,
            interrupted: Arc::new(AtomicBool::new(false)),
            stage: Stage::Idle,
        }
    }

    /// Date used for the output file name.
    pub fn with_date(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// Directory the workbook is written to instead of the working directory.
    pub fn with_output_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Flag that aborts the run once set. It is checked before each line and
    /// before the workbook is written.
    pub fn with_interrupt(mut self, interrupted: Arc<AtomicBool>) -> Self {
        self.interrupted = interrupted;
        self
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn run(&mut self, request: &ConversionRequest) -> Result<Conversion, ConvertError> {
        let dispatch = self.log.dispatch().clone();
        tracing::dispatcher::with_default(&dispatch, || {
            info!("run started");
            if let Some(path) = self.log.path() {
                debug!("logging to {}", path.display());
            }

            info!("normalizing names");
            let mut paths = DerivedPaths::derive(request, self.today);
            if let Some(dir) = &self.output_dir {
                paths.output = dir.join(&paths.output);
            }
            debug!(
                "input {}, output {}, sheet '{}'",
                paths.input.display(),
                paths.output.display(),
                paths.sheet_name
            );
            self.advance(Stage::NamesNormalized);

            let result = self.convert(&paths, &request.delimiter);
            info!("run finished");
            result
        })
    }

    /// Copies every line of `paths.input`, split on `delimiter`, into one
    /// sheet of a new workbook at `paths.output`.
    ///
    /// Splitting is literal: there is no quoting, so a delimiter inside a
    /// field always splits it.
    pub fn convert(
        &mut self,
        paths: &DerivedPaths,
        delimiter: &str,
    ) -> Result<Conversion, ConvertError> {
        let result = self.try_convert(paths, delimiter);
        if let Err(err) = &result {
            error!("{} {}", err.headline(), err);
            self.advance(Stage::Failed);
        }
        result
    }

    fn try_convert(
        &mut self,
        paths: &DerivedPaths,
        delimiter: &str,
    ) -> Result<Conversion, ConvertError> {
        if delimiter.is_empty() {
            return Err(ConvertError::EmptyDelimiter);
        }

        info!("setting up workbook");
        let options = WorkbookOptions {
            strings_to_numbers: true,
        };
        let mut workbook = Workbook::create(&paths.output, options)?;
        debug!("workbook set up at {}", workbook.path().display());
        self.advance(Stage::WorkbookOpen);

        if let Err(err) = workbook.add_worksheet(&paths.sheet_name) {
            workbook.discard();
            return Err(err);
        }
        debug!("worksheet '{}' added", paths.sheet_name);

        info!("reading {}", paths.input.display());
        let rows = match self.copy_lines(paths, delimiter, |row, fields| {
            workbook.write_row(row, 0, fields)
        }) {
            Ok(rows) => rows,
            Err(err) => {
                workbook.discard();
                return Err(err);
            }
        };
        debug!("finished writing {} row(s)", rows);
        self.advance(Stage::RowsWritten);

        if self.interrupted.load(Ordering::SeqCst) {
            workbook.discard();
            return Err(ConvertError::Interrupted { rows });
        }
        let output = workbook.close()?;
        debug!("workbook closed");
        self.advance(Stage::Finalized);

        Ok(Conversion { output, rows })
    }

    fn copy_lines<F>(
        &self,
        paths: &DerivedPaths,
        delimiter: &str,
        mut write_row: F,
    ) -> Result<u32, ConvertError>
    where
        F: FnMut(u32, &[&str]) -> Result<(), ConvertError>,
    {
        let file = fs::File::open(&paths.input).map_err(|source| ConvertError::SourceNotFound {
            path: paths.input.clone(),
            source,
        })?;

        let mut row = 0;
        for line in SourceLines::new(io::BufReader::new(file)) {
            if self.interrupted.load(Ordering::SeqCst) {
                return Err(ConvertError::Interrupted { rows: row });
            }
            let line = line.map_err(ConvertError::Io)?;
            let fields: Vec<&str> = line.split(delimiter).collect();
            write_row(row, &fields)?;
            row += 1;
        }
        Ok(row)
    }

    fn advance(&mut self, stage: Stage) {
        debug!("{} -> {}", self.stage, stage);
        self.stage = stage;
    }
}

/// Lines of a text source without their terminators. `\n`, `\r\n` and a
/// lone `\r` each end a line.
pub struct SourceLines<R> {
    reader: R,
    pending: VecDeque<String>,
}

impl<R: BufRead> SourceLines<R> {
    pub fn new(reader: R) -> Self {
        SourceLines {
            reader,
            pending: VecDeque::new(),
        }
    }

    /// Reads up to the next `\n` and queues every line in that chunk.
    /// Returns `false` at end of input.
    fn fill(&mut self) -> io::Result<bool> {
        let mut buf = Vec::new();
        if self.reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(false);
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
        }
        let chunk =
            String::from_utf8(buf).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;

        let mut lines: Vec<&str> = chunk.split('\r').collect();
        if chunk.ends_with('\r') {
            lines.pop();
        }
        self.pending.extend(lines.into_iter().map(str::to_string));
        Ok(true)
    }
}

impl<R: BufRead> Iterator for SourceLines<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pending.is_empty() {
            match self.fill() {
                Ok(true) => (),
                Ok(false) => return None,
                Err(err) => return Some(Err(err)),
            }
        }
        self.pending.pop_front().map(Ok)
    }
}

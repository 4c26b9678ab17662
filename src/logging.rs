use chrono::{DateTime, Local};
use tracing::{Dispatch, Level};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Logger for a single run. Nothing is installed globally; the converter
/// enters this dispatcher for the duration of the run.
pub struct RunLog {
    dispatch: Dispatch,
    path: Option<PathBuf>,
}

impl RunLog {
    /// Opens `debug DD-MM-YY HH-MM-SS.txt` in `dir` and logs to it at DEBUG.
    pub fn create(dir: &Path, started: DateTime<Local>) -> io::Result<Self> {
        let path = dir.join(log_file_name(started));
        let file = fs::File::create(&path)?;
        let subscriber = tracing_subscriber::fmt()
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .with_max_level(Level::DEBUG)
            .finish();
        Ok(RunLog {
            dispatch: Dispatch::new(subscriber),
            path: Some(path),
        })
    }

    /// A run that logs nowhere.
    pub fn silent() -> Self {
        RunLog {
            dispatch: Dispatch::none(),
            path: None,
        }
    }

    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

pub fn log_file_name(started: DateTime<Local>) -> String {
    started.format("debug %d-%m-%y %H-%M-%S.txt").to_string()
}

use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::Context;
use chrono::Local;

use crate::utils::LOG_FORMAT_STRING;

/// Append-only scan report, one `<timestamp> <message>` line per event.
pub struct RunLog {
    path: PathBuf,
    file: File,
}

impl RunLog {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .context(format!("could not open run log {:?}", path))?;
        debug!("run log opened at {:?}", path);
        Ok(RunLog {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes and flushes one record. A failing log write is reported through
    /// `log` but never interrupts the scan.
    pub fn record(&mut self, message: impl AsRef<str>) {
        let line = format!(
            "{} {}\n",
            Local::now().format(LOG_FORMAT_STRING),
            message.as_ref()
        );
        if let Err(e) = self
            .file
            .write_all(line.as_bytes())
            .and_then(|_| self.file.flush())
        {
            error!("could not write to run log {:?}: {}", self.path, e);
        }
    }
}

impl Drop for RunLog {
    fn drop(&mut self) {
        debug!("closing run log {:?}", self.path);
        let _ = self.file.sync_all();
    }
}

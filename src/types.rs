use std::{path::PathBuf, time::Duration};

use thiserror::Error;

/// Startup failures. Nothing is scanned once one of these is returned.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read target file {path:?}: {source}")]
    TargetFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("no targets found in {0:?}")]
    NoTargets(PathBuf),
    #[error("no targets selected")]
    EmptySelection,
    #[error("could not create output directory {path:?}: {source}")]
    OutputDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Per-target failures, recovered inside the scan loop.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("status {0}")]
    NonOkStatus(u16),
    #[error("screenshot timed out after {0:?}")]
    CaptureTimeout(Duration),
    #[error("capture: {0:#}")]
    CaptureFailure(anyhow::Error),
    #[error("write: {0:#}")]
    Write(anyhow::Error),
}

#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub body: Vec<u8>,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactOutcome {
    Saved(PathBuf),
    // html only: the fetch produced no body
    Skipped,
    Failed(String),
}

impl ArtifactOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, ArtifactOutcome::Saved(_))
    }
}

#[derive(Debug, Clone)]
pub struct TargetReport {
    pub target: String,
    pub html: ArtifactOutcome,
    pub screenshot: ArtifactOutcome,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub processed: usize,
    pub html_saved: usize,
    pub screenshots_saved: usize,
    pub reports: Vec<TargetReport>,
}

impl RunSummary {
    pub fn push(&mut self, report: TargetReport) {
        self.processed += 1;
        if report.html.is_saved() {
            self.html_saved += 1;
        }
        if report.screenshot.is_saved() {
            self.screenshots_saved += 1;
        }
        self.reports.push(report);
    }
}

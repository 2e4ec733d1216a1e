use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use chrono::Local;
use reqwest::Client;
use tokio::time::sleep;

use crate::{
    browser_controller::Capture,
    fetcher::fetch,
    namer::{artifact_name, base_name},
    run_log::RunLog,
    types::{ArtifactOutcome, FetchedPage, RunSummary, ScanError, TargetReport},
    utils::{file_timestamp, write_artifact, OUTPUT_DIR, PACING_DELAY},
};

#[derive(Builder, Debug, Clone)]
#[builder(setter(into))]
pub struct ScanOptions {
    // flat directory receiving the .html and .png artifacts
    #[builder(default = "self.default_output_dir()")]
    output_dir: PathBuf,
    // pause between two targets, not applied after the last one
    #[builder(default = "PACING_DELAY")]
    pacing_delay: Duration,
}

impl ScanOptions {
    pub fn default_builder() -> ScanOptionsBuilder {
        ScanOptionsBuilder::default()
    }

    pub fn output_dir(&self) -> &PathBuf {
        &self.output_dir
    }
}

impl ScanOptionsBuilder {
    fn default_output_dir(&self) -> PathBuf {
        PathBuf::from(OUTPUT_DIR)
    }
}

/// Sequential scan loop. Each target gets one fetch and one capture attempt;
/// neither failure stops the other or the rest of the batch.
pub struct Runner<'a, C: Capture> {
    client: &'a Client,
    capturer: C,
    options: ScanOptions,
    should_terminate: Arc<AtomicBool>,
}

impl<'a, C: Capture> Runner<'a, C> {
    pub fn new(
        client: &'a Client,
        capturer: C,
        options: ScanOptions,
        should_terminate: Arc<AtomicBool>,
    ) -> Self {
        Runner {
            client,
            capturer,
            options,
            should_terminate,
        }
    }

    pub async fn run(&self, targets: &[String], run_log: &mut RunLog) -> RunSummary {
        let total = targets.len();
        let mut summary = RunSummary::default();

        info!(
            "scanning {} targets into {:?}",
            total, self.options.output_dir
        );
        run_log.record(format!("scanning started ({} targets)", total));

        for (i, target) in targets.iter().enumerate() {
            if self.should_terminate.load(Ordering::Relaxed) {
                println!("Interrupted, stopping before {}", target);
                run_log.record(format!("scanning interrupted before {}", target));
                break;
            }

            println!("Scanning {}/{}: {}", i + 1, total, target);
            let report = self.scan_target(target, run_log).await;
            summary.push(report);
            println!();

            if i + 1 < total {
                debug!("pacing for {:?}", self.options.pacing_delay);
                sleep(self.options.pacing_delay).await;
            }
        }

        run_log.record(format!(
            "scanning finished: {} processed, {} html, {} screenshots",
            summary.processed, summary.html_saved, summary.screenshots_saved
        ));
        summary
    }

    async fn scan_target(&self, target: &str, run_log: &mut RunLog) -> TargetReport {
        run_log.record(format!("scanning {}", target));

        let fetched = fetch(self.client, target, run_log).await;

        let timestamp = file_timestamp(&Local::now());
        let base = match &fetched {
            Ok(page) => base_name(&page.title, target),
            Err(_) => base_name("", target),
        };

        let html = self.save_html(target, fetched, &base, &timestamp, run_log).await;
        let screenshot = self.save_screenshot(target, &base, &timestamp, run_log).await;

        TargetReport {
            target: target.into(),
            html,
            screenshot,
        }
    }

    async fn save_html(
        &self,
        target: &str,
        fetched: Result<FetchedPage, ScanError>,
        base: &str,
        timestamp: &str,
        run_log: &mut RunLog,
    ) -> ArtifactOutcome {
        let page = match fetched {
            Ok(page) => page,
            Err(e) => {
                println!("Fetch failed (dead link or timeout): {}", e);
                return ArtifactOutcome::Skipped;
            }
        };

        let file_name = artifact_name(base, timestamp, "html");
        let path = self.options.output_dir.join(&file_name);
        match write_artifact(&path, &page.body).await {
            Ok(_) => {
                println!("HTML saved -> {}", file_name);
                run_log.record(format!("html saved {} -> {}", target, file_name));
                ArtifactOutcome::Saved(path)
            }
            Err(e) => {
                let e = ScanError::Write(e);
                println!("Could not save HTML: {}", e);
                error!("could not save html for {}: {}", target, e);
                run_log.record(format!("html save error {}: {}", target, e));
                ArtifactOutcome::Failed(e.to_string())
            }
        }
    }

    async fn save_screenshot(
        &self,
        target: &str,
        base: &str,
        timestamp: &str,
        run_log: &mut RunLog,
    ) -> ArtifactOutcome {
        let file_name = artifact_name(base, timestamp, "png");
        let path = self.options.output_dir.join(&file_name);

        println!("Taking screenshot...");
        match self.capturer.capture(target, &path).await {
            Ok(_) => {
                println!("Screenshot saved -> {}", file_name);
                run_log.record(format!("screenshot saved {} -> {}", target, file_name));
                ArtifactOutcome::Saved(path)
            }
            Err(e) => {
                println!("Screenshot failed: {}", e);
                warn!("screenshot of {} failed: {}", target, e);
                run_log.record(format!("screenshot failed {}: {}", target, e));
                ArtifactOutcome::Failed(e.to_string())
            }
        }
    }
}

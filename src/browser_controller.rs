use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use headless_chrome::protocol::cdp::Page::{CaptureScreenshotFormatOption, Viewport};
use headless_chrome::Tab;
use headless_chrome::{browser::default_executable, Browser, LaunchOptions};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use sysinfo::{Pid, PidExt, ProcessExt, System, SystemExt};
use tokio::task;
use tokio::time::{sleep, timeout};

use crate::{
    types::ScanError,
    utils::{write_artifact, CAPTURE_DEADLINE, SCREENSHOT_QUALITY, SETTLE_DELAY, USER_AGENT, WINDOW_SIZE},
};

// chromium refuses textures taller than this
const MAX_CAPTURE_HEIGHT: f64 = 16384.0;

const HOST_RESOLVER_RULES: &str = "MAP * ~NOTFOUND , EXCLUDE 127.0.0.1";

const PAGE_WIDTH_JS: &str = "Math.max(document.documentElement.scrollWidth, document.body ? document.body.scrollWidth : 0)";
const PAGE_HEIGHT_JS: &str = "Math.max(document.documentElement.scrollHeight, document.body ? document.body.scrollHeight : 0)";

/// Produces the screenshot artifact for one target.
#[async_trait]
pub trait Capture: Send + Sync {
    async fn capture(&self, target: &str, output: &Path) -> Result<(), ScanError>;
}

#[derive(Builder, Debug, Clone)]
#[builder(setter(into))]
pub struct CaptureOptions {
    // socks5://host:port
    proxy_server: String,
    // chrome binary, looked up on the system when unset
    #[builder(default = "None")]
    chrome_path: Option<PathBuf>,
    // bound on navigate + settle + capture
    #[builder(default = "CAPTURE_DEADLINE")]
    deadline: Duration,
    #[builder(default = "SETTLE_DELAY")]
    settle_delay: Duration,
    #[builder(default = "SCREENSHOT_QUALITY")]
    quality: u32,
    #[builder(default = "WINDOW_SIZE")]
    window_size: (u32, u32),
    #[builder(default = "USER_AGENT.into()")]
    user_agent: String,
}

impl CaptureOptions {
    pub fn default_builder() -> CaptureOptionsBuilder {
        CaptureOptionsBuilder::default()
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    fn chrome_args(&self) -> Vec<String> {
        vec![
            format!("--proxy-server={}", self.proxy_server),
            format!("--host-resolver-rules={}", HOST_RESOLVER_RULES),
            format!("--user-agent={}", self.user_agent),
            "--disable-gpu".into(),
            "--disable-dev-shm-usage".into(),
            "--ignore-certificate-errors".into(),
        ]
    }
}

/// One browser process and its tab. Dropping the session kills the process,
/// whichever way the capture ended.
struct BrowserSession {
    browser: Browser,
    tab: Arc<Tab>,
}

impl BrowserSession {
    fn launch(options: &CaptureOptions) -> Result<Self> {
        let path = match &options.chrome_path {
            Some(p) => p.clone(),
            None => default_executable().map_err(|e| anyhow!(e))?,
        };
        let args = options.chrome_args();
        let launch_options = LaunchOptions::default_builder()
            .path(Some(path))
            .headless(true)
            .sandbox(false)
            .window_size(Some(options.window_size))
            .idle_browser_timeout(options.deadline)
            .args(args.iter().map(OsStr::new).collect())
            .build()
            .map_err(|e| anyhow!("invalid browser launch options: {}", e))?;

        let browser = Browser::new(launch_options).context("browser launching error")?;
        debug!("browser launched with pid {:?}", browser.get_process_id());

        let tab = browser.new_tab().context("could not create new tab")?;
        tab.set_default_timeout(options.deadline);

        Ok(BrowserSession { browser, tab })
    }

    fn kill(&self) -> bool {
        let pid = match self.browser.get_process_id() {
            Some(pid) => Pid::from_u32(pid),
            None => return false,
        };
        let mut s = System::new();
        if !s.refresh_process(pid) {
            return false;
        }
        match s.process(pid) {
            Some(process) => {
                debug!("killing browser process with id {}", pid);
                process.kill()
            }
            None => false,
        }
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        debug!("killing browser process...");
        self.kill();
    }
}

/// Screenshots through a fresh, proxied headless Chrome per target.
pub struct BrowserController {
    options: CaptureOptions,
}

impl BrowserController {
    pub fn new(options: CaptureOptions) -> Self {
        BrowserController { options }
    }

    async fn launch(&self) -> Result<BrowserSession> {
        let options = self.options.clone();
        task::spawn_blocking(move || BrowserSession::launch(&options))
            .await
            .context("browser launch task failed")?
    }

    async fn shoot(&self, session: &BrowserSession, target: &str) -> Result<Vec<u8>> {
        let tab = session.tab.clone();
        let url = target.to_string();
        task::spawn_blocking(move || -> Result<()> {
            tab.navigate_to(&url)
                .context(format!("could not navigate to {}", url))?
                .wait_until_navigated()
                .context(format!("navigation to {} did not complete", url))?;
            Ok(())
        })
        .await
        .context("navigation task failed")??;

        debug!("settling {} for {:?}", target, self.options.settle_delay);
        sleep(self.options.settle_delay).await;

        let tab = session.tab.clone();
        let quality = self.options.quality;
        let window = self.options.window_size;
        task::spawn_blocking(move || full_page_screenshot(&tab, quality, window))
            .await
            .context("screenshot task failed")?
            .context(format!("screenshot for {} could not be captured", target))
    }
}

#[async_trait]
impl Capture for BrowserController {
    async fn capture(&self, target: &str, output: &Path) -> Result<(), ScanError> {
        let session = self.launch().await.map_err(ScanError::CaptureFailure)?;

        let deadline = self.options.deadline;
        let png = match timeout(deadline, self.shoot(&session, target)).await {
            Ok(res) => res.map_err(ScanError::CaptureFailure)?,
            Err(_) => {
                warn!("capture of {} exceeded {:?}", target, deadline);
                return Err(ScanError::CaptureTimeout(deadline));
            }
        };
        drop(session);

        debug!("saving screenshot of {} to {:?}", target, output);
        write_artifact(output, &png).await.map_err(ScanError::Write)
    }
}

fn page_dimension(tab: &Tab, expression: &str) -> Result<f64> {
    tab.evaluate(expression, false)
        .context("could not measure page")?
        .value
        .and_then(|v| v.as_f64())
        .ok_or_else(|| anyhow!("page measurement returned no number"))
}

/// The full document area, never smaller than the window.
fn full_page_clip(width: f64, height: f64, window: (u32, u32)) -> Viewport {
    Viewport {
        x: 0.0,
        y: 0.0,
        width: width.max(window.0 as f64),
        height: height.max(window.1 as f64).min(MAX_CAPTURE_HEIGHT),
        scale: 1.0,
    }
}

fn full_page_screenshot(tab: &Tab, quality: u32, window: (u32, u32)) -> Result<Vec<u8>> {
    let width = page_dimension(tab, PAGE_WIDTH_JS)?;
    let height = page_dimension(tab, PAGE_HEIGHT_JS)?;
    let clip = full_page_clip(width, height, window);
    debug!("capturing {}x{} page", clip.width, clip.height);

    tab.capture_screenshot(
        CaptureScreenshotFormatOption::Png,
        Some(quality),
        Some(clip),
        true,
    )
}

use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
    sync::{atomic::AtomicBool, Arc},
    time::Duration,
};

use anyhow::Context;
use clap::Parser;
use log::debug;
use signal_hook::consts::{SIGINT, SIGTERM};
use torcti::{
    browser_controller::{BrowserController, CaptureOptions},
    proxy_gate::{self, ProxyGate},
    run_log::RunLog,
    runner::{Runner, ScanOptions},
    selector::parse_selection,
    types::ConfigError,
    utils::{
        read_targets, CAPTURE_DEADLINE, DEFAULT_SOCKS_ADDR, OUTPUT_DIR, PACING_DELAY,
        REQUEST_TIMEOUT, RUN_LOG_FILE, SETTLE_DELAY, TOR_CHECK_URL,
    },
};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Tor-routed page and screenshot capture", long_about = None)]
struct Args {
    /// File with one target address per line
    #[arg(short = 'f', long)]
    file: PathBuf,
    /// Selection such as `1,3-5` or `all`; prompts when omitted
    #[arg(short = 's', long)]
    select: Option<String>,
    /// SOCKS5 proxy address (host:port)
    #[arg(short = 'p', long, default_value = DEFAULT_SOCKS_ADDR)]
    proxy: String,
    /// Directory where the html and png files are written
    #[arg(short = 'o', long, default_value = OUTPUT_DIR)]
    output_dir: PathBuf,
    /// Scan report file, appended to
    #[arg(short = 'l', long, default_value = RUN_LOG_FILE)]
    log_file: PathBuf,
    /// Endpoint used to confirm traffic leaves through Tor
    #[arg(long, default_value = TOR_CHECK_URL)]
    check_url: String,
    /// Chrome or Chromium binary, looked up on the system when omitted
    #[arg(long)]
    chrome_path: Option<PathBuf>,
    /// Overall timeout in seconds for one http request
    #[arg(long, default_value_t = REQUEST_TIMEOUT.as_secs())]
    request_timeout: u64,
    /// Maximum time in seconds for navigation, settling and capture
    #[arg(long, default_value_t = CAPTURE_DEADLINE.as_secs())]
    capture_timeout: u64,
    /// Time in seconds to wait after a page navigates before the screenshot
    #[arg(long, default_value_t = SETTLE_DELAY.as_secs())]
    settle_delay: u64,
    /// Time in seconds to wait between two targets
    #[arg(long, default_value_t = PACING_DELAY.as_secs())]
    pacing_delay: u64,
}

fn prompt_selection(targets: &[String]) -> anyhow::Result<String> {
    println!("Available targets:");
    for (i, t) in targets.iter().enumerate() {
        println!("  {}: {}", i + 1, t);
    }
    print!("\nSelect targets (e.g. 1,3-5) or 'all': ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("could not read selection")?;
    Ok(line)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();
    debug!("Starting with {:#?}", args.clone());

    println!("Loading targets from {:?}", args.file);
    let targets = read_targets(&args.file).await?;
    println!("{} targets read\n", targets.len());

    let expression = match &args.select {
        Some(s) => s.clone(),
        None => prompt_selection(&targets)?,
    };
    let selection = parse_selection(&expression, targets.len());
    if selection.dropped > 0 {
        println!(
            "Warning: {} selection token(s) matched no target and were ignored",
            selection.dropped
        );
    }
    if selection.indices.is_empty() {
        println!("No targets selected, exiting.");
        return Err(ConfigError::EmptySelection.into());
    }
    let selected: Vec<String> = selection
        .indices
        .iter()
        .map(|&i| targets[i].clone())
        .collect();
    println!("Starting scan of {} targets.\n", selected.len());

    tokio::fs::create_dir_all(&args.output_dir)
        .await
        .map_err(|source| ConfigError::OutputDir {
            path: args.output_dir.clone(),
            source,
        })?;
    let mut run_log = RunLog::open(&args.log_file)?;

    println!("Checking Tor connection (proxy {})", args.proxy);
    let gate = ProxyGate::new(&args.proxy, Duration::from_secs(args.request_timeout))?;
    if proxy_gate::check(gate.client(), &args.check_url, &mut run_log).await {
        println!("Tor connection: OK\n");
    } else {
        // advisory only, traffic still goes through the proxy
        println!("Tor connection: FAILED (continuing anyway)\n");
    }

    let capture_options = CaptureOptions::default_builder()
        .proxy_server(gate.browser_proxy())
        .chrome_path(args.chrome_path.clone())
        .deadline(Duration::from_secs(args.capture_timeout))
        .settle_delay(Duration::from_secs(args.settle_delay))
        .build()?;
    let scan_options = ScanOptions::default_builder()
        .output_dir(args.output_dir.clone())
        .pacing_delay(Duration::from_secs(args.pacing_delay))
        .build()?;

    // stop between targets on ctrl-c, the current one finishes first
    let should_terminate = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGTERM, Arc::clone(&should_terminate))?;
    signal_hook::flag::register(SIGINT, Arc::clone(&should_terminate))?;

    let runner = Runner::new(
        gate.client(),
        BrowserController::new(capture_options),
        scan_options,
        should_terminate,
    );
    let summary = runner.run(&selected, &mut run_log).await;

    println!("Scan complete!");
    println!(
        "{} of {} targets processed: {} html, {} screenshots",
        summary.processed,
        selected.len(),
        summary.html_saved,
        summary.screenshots_saved
    );
    println!("Files (HTML + PNG): {:?}", args.output_dir);
    println!("Log: {:?}", run_log.path());

    Ok(())
}

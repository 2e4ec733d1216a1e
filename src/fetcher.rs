use regex::bytes::Regex;
use reqwest::{header::USER_AGENT as USER_AGENT_HEADER, Client, StatusCode};

use crate::{
    run_log::RunLog,
    types::{FetchedPage, ScanError},
    utils::USER_AGENT,
};

pub const NO_TITLE: &str = "NoTitle";

lazy_static! {
    static ref TITLE: Regex = Regex::new(r"(?is)<title>(.*?)</title>").unwrap();
}

pub fn extract_title(body: &[u8]) -> String {
    match TITLE.captures(body).and_then(|c| c.get(1)) {
        Some(m) => String::from_utf8_lossy(m.as_bytes()).trim().to_string(),
        None => NO_TITLE.into(),
    }
}

/// Single GET of `target`. The outcome is recorded in `run_log` whether it
/// succeeds or not; nothing is retried.
pub async fn fetch(
    client: &Client,
    target: &str,
    run_log: &mut RunLog,
) -> Result<FetchedPage, ScanError> {
    let res = fetch_page(client, target).await;
    match &res {
        Ok(page) => {
            debug!("fetched {} ({} bytes)", target, page.body.len());
            run_log.record(format!(
                "fetched {} ({} bytes, title {:?})",
                target,
                page.body.len(),
                page.title
            ));
        }
        Err(e) => {
            warn!("fetch of {} failed: {}", target, e);
            run_log.record(format!("fetch error {}: {}", target, e));
        }
    }
    res
}

async fn fetch_page(client: &Client, target: &str) -> Result<FetchedPage, ScanError> {
    let res = client
        .get(target)
        .header(USER_AGENT_HEADER, USER_AGENT)
        .send()
        .await?;

    if res.status() != StatusCode::OK {
        return Err(ScanError::NonOkStatus(res.status().as_u16()));
    }

    let body = res.bytes().await?.to_vec();
    let title = extract_title(&body);
    Ok(FetchedPage { body, title })
}

use std::time::Duration;

use anyhow::Context;
use reqwest::{Client, Proxy};

use crate::{
    run_log::RunLog,
    utils::{TOR_MARKER, USER_AGENT},
};

/// The SOCKS5 egress shared by the fetcher and the browser.
///
/// Built once per run. Every request made through [`ProxyGate::client`] is
/// tunneled through the proxy, with host names resolved on the proxy side so
/// that `.onion` addresses work.
pub struct ProxyGate {
    socks_addr: String,
    client: Client,
}

impl ProxyGate {
    pub fn new(socks_addr: &str, timeout: Duration) -> anyhow::Result<Self> {
        let socks_addr = strip_scheme(socks_addr).to_string();
        let proxy = Proxy::all(format!("socks5h://{}", socks_addr))
            .context(format!("invalid socks5 address {}", socks_addr))?;
        let client = Client::builder()
            .proxy(proxy)
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("could not build proxied http client")?;

        debug!(
            "http client routed through socks5h://{} with {:?} timeout",
            socks_addr, timeout
        );
        Ok(ProxyGate { socks_addr, client })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn socks_addr(&self) -> &str {
        &self.socks_addr
    }

    /// Proxy argument in the form the browser expects.
    pub fn browser_proxy(&self) -> String {
        format!("socks5://{}", self.socks_addr)
    }
}

fn strip_scheme(addr: &str) -> &str {
    let addr = addr.trim();
    addr.split_once("://").map(|(_, rest)| rest).unwrap_or(addr)
}

/// Advisory anonymity check: true iff `check_url` answers with the Tor
/// marker. Never fails.
pub async fn verify(client: &Client, check_url: &str) -> bool {
    let res = match client.get(check_url).send().await {
        Ok(res) => res,
        Err(e) => {
            warn!("proxy check request to {} failed: {}", check_url, e);
            return false;
        }
    };
    match res.text().await {
        Ok(body) => {
            debug!("proxy check answered {}", body.trim());
            body.contains(TOR_MARKER)
        }
        Err(e) => {
            warn!("could not read proxy check body: {}", e);
            false
        }
    }
}

/// [`verify`], with the result written to the run log.
pub async fn check(client: &Client, check_url: &str, run_log: &mut RunLog) -> bool {
    let is_tor = verify(client, check_url).await;
    if is_tor {
        run_log.record(format!("tor check ok ({})", check_url));
    } else {
        run_log.record(format!("tor check failed ({})", check_url));
    }
    is_tor
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn check_server(body: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/ip"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn marker_present() {
        let server = check_server(r#"{"IsTor":true,"IP":"185.220.101.1"}"#).await;
        let url = format!("{}/api/ip", server.uri());
        assert!(verify(&Client::new(), &url).await);
    }

    #[tokio::test]
    async fn marker_absent() {
        let server = check_server(r#"{"IsTor":false,"IP":"203.0.113.9"}"#).await;
        let url = format!("{}/api/ip", server.uri());
        assert!(!verify(&Client::new(), &url).await);
    }

    #[tokio::test]
    async fn unreachable_check_is_false() {
        // nothing listens on the discard port
        assert!(!verify(&Client::new(), "http://127.0.0.1:9/api/ip").await);
    }

    #[tokio::test]
    async fn dead_proxy_is_false_not_an_error() {
        let gate = ProxyGate::new("127.0.0.1:9", Duration::from_secs(2)).unwrap();
        assert!(!verify(gate.client(), "http://example.com/api/ip").await);
    }

    #[tokio::test]
    async fn slow_check_is_false() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/ip"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"IsTor":true}"#)
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let client = Client::builder()
            .timeout(Duration::from_millis(200))
            .build()
            .unwrap();
        let url = format!("{}/api/ip", server.uri());
        assert!(!verify(&client, &url).await);
    }

    #[tokio::test]
    async fn check_result_is_logged() {
        let ok = check_server(r#"{"IsTor":true}"#).await;
        let not_tor = check_server(r#"{"IsTor":false}"#).await;
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("run.log");
        let mut log = RunLog::open(&log_path).unwrap();

        let ok_url = format!("{}/api/ip", ok.uri());
        let not_tor_url = format!("{}/api/ip", not_tor.uri());
        assert!(check(&Client::new(), &ok_url, &mut log).await);
        assert!(!check(&Client::new(), &not_tor_url, &mut log).await);

        let logged = fs::read_to_string(&log_path).unwrap();
        assert!(logged.contains(&format!("tor check ok ({})", ok_url)));
        assert!(logged.contains(&format!("tor check failed ({})", not_tor_url)));
    }

    #[test]
    fn accepts_scheme_prefixed_addresses() {
        let gate = ProxyGate::new("socks5://127.0.0.1:9150", Duration::from_secs(45)).unwrap();
        assert_eq!(gate.socks_addr(), "127.0.0.1:9150");
        assert_eq!(gate.browser_proxy(), "socks5://127.0.0.1:9150");
    }
}

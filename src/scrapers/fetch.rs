//! Page retrieval for the two fetch modes.
//!
//! [`PageSource`] is the seam the adapter reads pages through. [`Fetcher`]
//! routes [`FetchMode::Http`] to a shared `reqwest` client and
//! [`FetchMode::Browser`] to a headless Chromium `--dump-dom`.

use crate::errors::FailureCause;
use crate::models::FetchMode;
use crate::utils::truncate_for_log;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};
use url::Url;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Returns the body of a page as text.
pub trait PageSource {
    async fn get(&self, url: &Url, mode: FetchMode) -> Result<String, FailureCause>;
}

impl<T: PageSource> PageSource for &T {
    async fn get(&self, url: &Url, mode: FetchMode) -> Result<String, FailureCause> {
        (**self).get(url, mode).await
    }
}

/// Plain GET through one shared client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Client with a browser-like user agent and a per-request timeout.
    pub fn build_client(user_agent: &str, request_timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(request_timeout)
            .build()
    }

    #[instrument(level = "debug", skip_all, fields(%url))]
    pub async fn get(&self, url: &Url) -> Result<String, FailureCause> {
        let t0 = Instant::now();
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(FailureCause::from_reqwest_error)?
            .error_for_status()
            .map_err(FailureCause::from_reqwest_error)?;
        let body = resp.text().await.map_err(FailureCause::from_reqwest_error)?;
        debug!(bytes = body.len(), elapsed_ms = t0.elapsed().as_millis(), "fetched");
        Ok(body)
    }
}

/// Headless Chromium, one throwaway profile per page.
#[derive(Debug)]
pub struct BrowserFetcher {
    binary: String,
    page_timeout: Duration,
    slots: Semaphore,
}

impl BrowserFetcher {
    pub fn new(binary: impl Into<String>, page_timeout: Duration, max_concurrent: usize) -> Self {
        Self {
            binary: binary.into(),
            page_timeout,
            slots: Semaphore::new(max_concurrent.max(1)),
        }
    }

    #[instrument(level = "debug", skip_all, fields(%url))]
    pub async fn get(&self, url: &Url) -> Result<String, FailureCause> {
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(FailureCause::InvalidUrl(format!("unsupported scheme {}", url.scheme())));
        }
        let _permit = self
            .slots
            .acquire()
            .await
            .map_err(|_| FailureCause::Browser("browser pool closed".into()))?;

        let profile = tempfile::tempdir().map_err(|e| FailureCause::Browser(format!("profile dir: {e}")))?;
        let t0 = Instant::now();
        let profile_arg = format!("--user-data-dir={}", profile.path().display());
        let mut cmd = Command::new(&self.binary);
        cmd.args([
            "--headless",
            "--no-sandbox",
            "--disable-gpu",
            "--disable-dev-shm-usage",
            profile_arg.as_str(),
            "--dump-dom",
            url.as_str(),
        ])
        .kill_on_drop(true);

        let output = match timeout(self.page_timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(FailureCause::Browser(format!("launching {}: {e}", self.binary))),
            Err(_) => return Err(FailureCause::Timeout(self.page_timeout)),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(status = %output.status, stderr = %truncate_for_log(&stderr, 300), "browser exited with error");
            return Err(FailureCause::Browser(format!("exit status {}", output.status)));
        }
        if output.stdout.is_empty() {
            return Err(FailureCause::Browser("empty DOM".into()));
        }
        debug!(bytes = output.stdout.len(), elapsed_ms = t0.elapsed().as_millis(), "dumped DOM");
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Production [`PageSource`]: routes each request by fetch mode.
#[derive(Debug)]
pub struct Fetcher {
    pub http: HttpFetcher,
    pub browser: BrowserFetcher,
}

impl PageSource for Fetcher {
    async fn get(&self, url: &Url, mode: FetchMode) -> Result<String, FailureCause> {
        match mode {
            FetchMode::Http => self.http.get(url).await,
            FetchMode::Browser => self.browser.get(url).await,
        }
    }
}

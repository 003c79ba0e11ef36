//! Release asset download.
//!
//! # Responsibilities
//! - Fetch the asset over HTTP(S)
//! - Follow redirects explicitly (the client is built with redirects disabled)
//! - Stream the body to disk and report whole-percent progress
//!
//! # Design Decisions
//! - Progress is observational only: no stall detection, no retry
//! - Each percentage is reported at most once, in increasing order
//! - Without a Content-Length no progress is reported

use futures_util::StreamExt;
use reqwest::header::LOCATION;
use reqwest::redirect::Policy;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::provision::error::{ProvisionError, ProvisionResult};

/// Progress callback receiving whole percentages.
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// HTTP downloader with manual redirect handling.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: reqwest::Client,
    max_redirects: usize,
}

impl Downloader {
    pub fn new(max_redirects: usize) -> ProvisionResult<Self> {
        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .user_agent(concat!("local-share/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProvisionError::DownloadFailed(e.to_string()))?;

        Ok(Self {
            client,
            max_redirects,
        })
    }

    /// Download `url` into `dest`, returning the number of bytes written.
    pub async fn download(
        &self,
        url: &str,
        dest: &Path,
        progress: Option<&ProgressFn>,
    ) -> ProvisionResult<u64> {
        let mut current =
            Url::parse(url).map_err(|e| ProvisionError::DownloadFailed(format!("{}: {}", url, e)))?;

        for _ in 0..=self.max_redirects {
            let response = self
                .client
                .get(current.clone())
                .send()
                .await
                .map_err(|e| ProvisionError::DownloadFailed(e.to_string()))?;

            let status = response.status();
            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| {
                        ProvisionError::DownloadFailed(format!(
                            "{} from {} without a Location header",
                            status, current
                        ))
                    })?;
                let next = current.join(location).map_err(|e| {
                    ProvisionError::DownloadFailed(format!("bad redirect '{}': {}", location, e))
                })?;
                tracing::debug!(from = %current, to = %next, status = %status, "Following redirect");
                current = next;
                continue;
            }

            if !status.is_success() {
                return Err(ProvisionError::DownloadFailed(format!(
                    "{} from {}",
                    status, current
                )));
            }

            return write_body(response, dest, progress).await;
        }

        Err(ProvisionError::DownloadFailed(format!(
            "more than {} redirects starting at {}",
            self.max_redirects, url
        )))
    }
}

async fn write_body(
    response: reqwest::Response,
    dest: &Path,
    progress: Option<&ProgressFn>,
) -> ProvisionResult<u64> {
    let total = response.content_length().filter(|len| *len > 0);
    let mut tracker = PercentTracker::default();

    let mut file = tokio::fs::File::create(dest).await.map_err(|e| {
        ProvisionError::DownloadFailed(format!("cannot write {}: {}", dest.display(), e))
    })?;
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| ProvisionError::DownloadFailed(e.to_string()))?;
        file.write_all(&chunk)
            .await
            .map_err(|e| ProvisionError::DownloadFailed(e.to_string()))?;
        written += chunk.len() as u64;

        if let (Some(total), Some(report)) = (total, progress) {
            if let Some(percent) = tracker.advance(written, total) {
                report(percent);
            }
        }
    }

    file.flush()
        .await
        .map_err(|e| ProvisionError::DownloadFailed(e.to_string()))?;

    if let Some(total) = total {
        if written != total {
            return Err(ProvisionError::DownloadFailed(format!(
                "expected {} bytes, received {}",
                total, written
            )));
        }
    }

    Ok(written)
}

/// Emits each whole percentage at most once, increasing only.
#[derive(Debug, Default)]
struct PercentTracker {
    last: Option<u8>,
}

impl PercentTracker {
    fn advance(&mut self, written: u64, total: u64) -> Option<u8> {
        let percent = (written.saturating_mul(100) / total).min(100) as u8;
        if self.last.map_or(true, |last| percent > last) {
            self.last = Some(percent);
            Some(percent)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_tracker_reports_each_value_once() {
        let mut tracker = PercentTracker::default();
        let reported: Vec<u8> = [0u64, 1, 5, 5, 10, 999, 1000]
            .iter()
            .filter_map(|written| tracker.advance(*written, 1000))
            .collect();

        assert_eq!(reported, vec![0, 1, 99, 100]);
    }

    #[test]
    fn test_percent_tracker_caps_at_100() {
        let mut tracker = PercentTracker::default();
        assert_eq!(tracker.advance(2000, 1000), Some(100));
        assert_eq!(tracker.advance(3000, 1000), None);
    }
}

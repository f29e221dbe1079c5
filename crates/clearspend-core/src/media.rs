//! Provider media downloads
//!
//! Inbound media (receipt photos, voice notes) arrives as a URL on the
//! provider's CDN. The dispatcher downloads it to a request-owned temp file
//! before handing it to the inference gateway. The file is deleted when the
//! handle drops, which covers success, handled failure, and unwinds alike.

use std::io::Write;
use std::time::Duration;

use reqwest::Client;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{Error, Result};

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Downloads provider media into request-owned temporary files
#[derive(Clone, Default)]
pub struct MediaFetcher {
    http_client: Client,
}

impl MediaFetcher {
    pub fn new() -> Self {
        Self {
            http_client: Client::new(),
        }
    }

    /// Download a media URL into a temp file.
    ///
    /// The returned handle owns the file; dropping it removes the file.
    pub async fn fetch(&self, url: &str) -> Result<NamedTempFile> {
        let response = self
            .http_client
            .get(url)
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::Gateway(format!("media download from {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(Error::Gateway(format!(
                "media download from {} returned status {}",
                url,
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Gateway(format!("media download from {} failed: {}", url, e)))?;

        let mut file = NamedTempFile::new()?;
        file.write_all(&bytes)?;
        file.flush()?;

        debug!(url = %url, path = %file.path().display(), size = bytes.len(), "Media downloaded");
        Ok(file)
    }
}

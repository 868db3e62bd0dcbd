//! Live streams and recordings over HTTP using Reqwest

use bridge_traits::{
    error::{BridgeError, Result},
    stream::{RecordedSource, UpstreamSource},
};
use reqwest::blocking::{Client, Response};
use reqwest::header::{CONTENT_RANGE, RANGE};
use reqwest::StatusCode;
use std::io::Read;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Blocking HTTP reader for a live transport stream.
///
/// The request is only issued on [`start`](UpstreamSource::start), which the
/// ingest worker calls from its own thread.
pub struct HttpUpstream {
    url: String,
    connect_timeout: Duration,
    response: Option<Response>,
}

impl HttpUpstream {
    /// Create a source for `url` with a 10 second connect timeout.
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_connect_timeout(url, Duration::from_secs(10))
    }

    /// Create a source with a custom connect timeout.
    pub fn with_connect_timeout(url: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            connect_timeout,
            response: None,
        }
    }

    /// Stream URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    fn map_reqwest_error(e: reqwest::Error) -> BridgeError {
        BridgeError::OperationFailed(format!("HTTP stream error: {}", e))
    }
}

impl UpstreamSource for HttpUpstream {
    fn start(&mut self) -> Result<()> {
        if self.response.is_some() {
            return Ok(());
        }

        // Live streams never finish, so only the connect phase is bounded.
        let client = Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(None)
            .user_agent("timeshift-core/0.1.0")
            .build()
            .map_err(Self::map_reqwest_error)?;

        debug!(url = %self.url, "Opening live stream");
        let response = client
            .get(&self.url)
            .send()
            .map_err(Self::map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(BridgeError::OperationFailed(format!(
                "HTTP {} for live stream {}",
                status.as_u16(),
                self.url
            )));
        }

        info!(url = %self.url, "Live stream opened");
        self.response = Some(response);
        Ok(())
    }

    fn read_data(&mut self, buf: &mut [u8]) -> Result<usize> {
        let Some(response) = self.response.as_mut() else {
            return Err(BridgeError::NotAvailable(
                "Live stream not started".to_string(),
            ));
        };

        match response.read(buf) {
            Ok(read) => Ok(read),
            Err(e) => {
                warn!(url = %self.url, error = %e, "Live stream read failed");
                Err(BridgeError::Io(e))
            }
        }
    }
}

/// Recording served over HTTP, read with `Range` requests.
///
/// One response body is kept open and consumed sequentially; a read at any
/// other position reissues the request from there.
pub struct HttpRecording {
    url: String,
    client: Option<Client>,
    body: Option<Response>,
    /// Stream position of the next byte in `body`.
    body_pos: u64,
}

impl HttpRecording {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: None,
            body: None,
            body_pos: 0,
        }
    }

    /// Recording URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    fn request_from(&self, client: &Client, pos: u64) -> Result<Response> {
        let response = client
            .get(&self.url)
            .header(RANGE, format!("bytes={}-", pos))
            .send()
            .map_err(HttpUpstream::map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(BridgeError::OperationFailed(format!(
                "HTTP {} for recording {}",
                status.as_u16(),
                self.url
            )));
        }
        if pos > 0 && status != StatusCode::PARTIAL_CONTENT {
            return Err(BridgeError::OperationFailed(format!(
                "Recording {} does not support range requests",
                self.url
            )));
        }
        Ok(response)
    }
}

/// Total length from a `Content-Range: bytes a-b/total` header.
fn total_from_content_range(value: &str) -> Option<u64> {
    value.rsplit('/').next()?.trim().parse().ok()
}

impl RecordedSource for HttpRecording {
    fn open(&mut self) -> Result<u64> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(None)
            .user_agent("timeshift-core/0.1.0")
            .build()
            .map_err(HttpUpstream::map_reqwest_error)?;

        let response = self.request_from(&client, 0)?;
        let length = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|value| value.to_str().ok())
            .and_then(total_from_content_range)
            .or_else(|| response.content_length())
            .ok_or_else(|| {
                BridgeError::OperationFailed(format!("Recording {} has no known length", self.url))
            })?;

        info!(url = %self.url, length, "Recording opened");
        self.client = Some(client);
        self.body = Some(response);
        self.body_pos = 0;
        Ok(length)
    }

    fn read_at(&mut self, pos: u64, buf: &mut [u8]) -> Result<usize> {
        let Some(client) = self.client.clone() else {
            return Err(BridgeError::NotAvailable("Recording not opened".to_string()));
        };

        if self.body.is_none() || self.body_pos != pos {
            debug!(url = %self.url, position = pos, "Reopening recording at new position");
            self.body = Some(self.request_from(&client, pos)?);
            self.body_pos = pos;
        }

        let Some(body) = self.body.as_mut() else {
            return Ok(0);
        };
        let read = body.read(buf).map_err(|e| {
            warn!(url = %self.url, error = %e, "Recording read failed");
            BridgeError::Io(e)
        })?;
        self.body_pos += read as u64;
        Ok(read)
    }
}

//! Blocking HTTP access for map server sources.

use std::sync::OnceLock;
use std::time::Duration;

use thiserror::Error;

/// Default request timeout.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Failure of a single HTTP request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HttpError {
    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// The request timed out.
    #[error("Request to {0} timed out")]
    Timeout(String),

    /// The connection could not be established.
    #[error("Connection failed: {0}")]
    Connect(String),

    /// The response body could not be read.
    #[error("Failed to read response: {0}")]
    Body(String),

    /// The client itself could not be built or used.
    #[error("HTTP client error: {0}")]
    Client(String),
}

impl HttpError {
    /// Whether a later attempt may succeed.
    ///
    /// Server errors, throttling (429), timeouts and connection failures are
    /// transient. Other client errors are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            HttpError::Status { status, .. } => *status >= 500 || *status == 429,
            HttpError::Timeout(_) | HttpError::Connect(_) | HttpError::Body(_) => true,
            HttpError::Client(_) => false,
        }
    }
}

/// Fetches a URL and returns the response body.
///
/// Sources take this as a type parameter so tests can replay canned
/// responses.
pub trait HttpClient: Send + Sync {
    /// Performs an HTTP GET request and returns the response body.
    fn get(&self, url: &str) -> Result<Vec<u8>, HttpError>;
}

/// reqwest-backed client with a fixed timeout.
///
/// The underlying blocking client owns a private runtime, which cannot be
/// started or shut down on a tokio worker. It is therefore built on first
/// use (requests run on blocking workers) and, when dropped inside a
/// runtime, released on a plain thread. Creating and dropping a
/// `ReqwestClient` is safe from async code.
pub struct ReqwestClient {
    timeout: Duration,
    client: OnceLock<reqwest::blocking::Client>,
}

impl ReqwestClient {
    /// Client with the default timeout.
    pub fn new() -> Result<Self, HttpError> {
        Self::with_timeout(DEFAULT_HTTP_TIMEOUT_SECS)
    }

    /// Client with a timeout of `timeout_secs`.
    ///
    /// Construction failures of the underlying client surface from the
    /// first request as [`HttpError::Client`].
    pub fn with_timeout(timeout_secs: u64) -> Result<Self, HttpError> {
        Ok(Self {
            timeout: Duration::from_secs(timeout_secs),
            client: OnceLock::new(),
        })
    }

    /// Request timeout of this client.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether the underlying client has been built.
    pub fn is_built(&self) -> bool {
        self.client.get().is_some()
    }

    fn client(&self) -> Result<&reqwest::blocking::Client, HttpError> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let built = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("mapchannel/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HttpError::Client(format!("Failed to create HTTP client: {}", e)))?;
        // A racing caller may have won; the loser's client is dropped here,
        // on the same blocking thread that built it.
        Ok(self.client.get_or_init(|| built))
    }
}

impl Drop for ReqwestClient {
    fn drop(&mut self) {
        let Some(client) = self.client.take() else {
            return;
        };
        if tokio::runtime::Handle::try_current().is_err() {
            return;
        }
        let spawned = std::thread::Builder::new()
            .name("mapchannel-http-drop".into())
            .spawn(move || drop(client));
        if let Err(e) = spawned {
            tracing::warn!(error = %e, "Could not release HTTP client off the runtime");
        }
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str) -> Result<Vec<u8>, HttpError> {
        let response = self.client()?.get(url).send().map_err(|e| {
            if e.is_timeout() {
                HttpError::Timeout(url.to_string())
            } else {
                HttpError::Connect(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(HttpError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| HttpError::Body(e.to_string()))
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Mock HTTP client that replays queued responses and records URLs.
    ///
    /// Once the queue runs dry the last response is repeated.
    pub struct MockHttpClient {
        responses: Mutex<VecDeque<Result<Vec<u8>, HttpError>>>,
        last: Mutex<Option<Result<Vec<u8>, HttpError>>>,
        pub urls: Mutex<Vec<String>>,
    }

    impl MockHttpClient {
        pub fn new(responses: Vec<Result<Vec<u8>, HttpError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                last: Mutex::new(None),
                urls: Mutex::new(Vec::new()),
            }
        }

        pub fn request_count(&self) -> usize {
            self.urls.lock().len()
        }
    }

    impl HttpClient for MockHttpClient {
        fn get(&self, url: &str) -> Result<Vec<u8>, HttpError> {
            self.urls.lock().push(url.to_string());
            let next = self.responses.lock().pop_front();
            match next {
                Some(response) => {
                    *self.last.lock() = Some(response.clone());
                    response
                }
                None => self
                    .last
                    .lock()
                    .clone()
                    .unwrap_or_else(|| Err(HttpError::Client("no response queued".into()))),
            }
        }
    }

    #[test]
    fn test_mock_client_replays_queue() {
        let mock = MockHttpClient::new(vec![
            Err(HttpError::Timeout("u".into())),
            Ok(vec![1, 2, 3]),
        ]);
        assert!(mock.get("http://example.com/a").is_err());
        assert_eq!(mock.get("http://example.com/b").unwrap(), vec![1, 2, 3]);
        assert_eq!(mock.get("http://example.com/c").unwrap(), vec![1, 2, 3]);
        assert_eq!(mock.request_count(), 3);
    }

    #[test]
    fn test_status_retryability() {
        let status = |status| HttpError::Status {
            status,
            url: "u".into(),
        };
        assert!(status(500).is_retryable());
        assert!(status(503).is_retryable());
        assert!(status(429).is_retryable());
        assert!(!status(404).is_retryable());
        assert!(!status(400).is_retryable());
    }

    #[test]
    fn test_transport_errors_are_retryable() {
        assert!(HttpError::Timeout("u".into()).is_retryable());
        assert!(HttpError::Connect("refused".into()).is_retryable());
        assert!(!HttpError::Client("bad".into()).is_retryable());
    }

    #[tokio::test]
    async fn test_reqwest_client_created_and_dropped_in_runtime() {
        let client = ReqwestClient::with_timeout(5).unwrap();
        assert_eq!(client.timeout(), Duration::from_secs(5));
        assert!(!client.is_built());
        drop(client);
    }

    #[tokio::test]
    async fn test_built_reqwest_client_dropped_in_runtime() {
        let client = std::sync::Arc::new(ReqwestClient::with_timeout(5).unwrap());
        let worker = std::sync::Arc::clone(&client);
        tokio::task::spawn_blocking(move || worker.client().map(|_| ()))
            .await
            .unwrap()
            .unwrap();
        assert!(client.is_built());

        // Last reference goes away on the async worker.
        drop(client);
    }
}

//! Classify per-attempt download failures and decide whether to retry.

use std::error::Error as _;
use std::fmt;
use std::io;

use reqwest::StatusCode;

/// Error from a single download attempt (request, status, or local IO).
/// Kept as its own type so the retry policy can classify it before it is
/// converted to anyhow.
#[derive(Debug)]
pub enum FetchError {
    /// reqwest reported an error (timeout, connection, body stream, etc.).
    Request(reqwest::Error),
    /// The response carried a status we neither save nor record.
    Status(StatusCode),
    /// Writing the artifact to disk failed.
    Io(io::Error),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Request(e) => write!(f, "{}", e),
            FetchError::Status(code) => write!(f, "HTTP {}", code),
            FetchError::Io(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Request(e) => Some(e),
            FetchError::Status(_) => None,
            FetchError::Io(e) => Some(e),
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::Request(e)
    }
}

impl From<io::Error> for FetchError {
    fn from(e: io::Error) -> Self {
        FetchError::Io(e)
    }
}

/// High-level classification of an attempt failure for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request or body read timed out.
    Timeout,
    /// Network-level failure (connect error, connection reset).
    Connection,
    /// Any other error (not retried).
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Timeout => write!(f, "timeout"),
            ErrorKind::Connection => write!(f, "connection error"),
            ErrorKind::Other => write!(f, "error"),
        }
    }
}

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-attempt; `attempt` is the attempt count to carry forward.
    Retry { attempt: u32 },
    /// Do not retry this error.
    GiveUp,
}

/// Bounded immediate-retry policy: transient failures are re-attempted up
/// to `max_retries` times with no delay beyond the request's own timeout.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_retries: u32,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// `attempt` is the number of retries already spent (0 for the first
    /// failure). Transient kinds retry while the bound allows; everything
    /// else gives up immediately.
    pub fn decide(&self, attempt: u32, kind: ErrorKind) -> RetryDecision {
        match kind {
            ErrorKind::Timeout | ErrorKind::Connection if attempt < self.max_retries => {
                RetryDecision::Retry {
                    attempt: attempt + 1,
                }
            }
            _ => RetryDecision::GiveUp,
        }
    }
}

/// Classify an attempt failure into an [`ErrorKind`].
pub fn classify(err: &FetchError) -> ErrorKind {
    match err {
        FetchError::Request(e) => classify_request_error(e),
        FetchError::Status(_) | FetchError::Io(_) => ErrorKind::Other,
    }
}

fn classify_request_error(e: &reqwest::Error) -> ErrorKind {
    if e.is_timeout() {
        return ErrorKind::Timeout;
    }
    if e.is_connect() {
        return ErrorKind::Connection;
    }
    // Resets mid-stream surface as an io::Error somewhere in the chain.
    let mut source = e.source();
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            match io_err.kind() {
                io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::BrokenPipe => return ErrorKind::Connection,
                _ => {}
            }
        }
        source = cause.source();
    }
    ErrorKind::Other
}

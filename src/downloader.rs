use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use futures::StreamExt;
use reqwest::{Client, StatusCode, header};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::mime;
use crate::retry::{self, FetchError, RetryDecision, RetryPolicy};

pub struct Downloader {
    client: Client,
    output_dir: PathBuf,
    policy: RetryPolicy,
}

impl Downloader {
    pub fn new(output_dir: PathBuf, timeout: Duration, max_retries: u32) -> Self {
        let client = Client::builder()
            .user_agent("bdl/0.1.0")
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            output_dir,
            policy: RetryPolicy::new(max_retries),
        }
    }

    /// Download `url` into the output directory under index `id`.
    ///
    /// A 200 response is streamed to `file_<id>.<ext>`; 404 and 500 write
    /// the zero-byte `<id>:<status>` marker and resolve the id permanently.
    /// Timeouts and connection resets are re-attempted up to the policy
    /// bound; any remaining failure is returned for the caller to log and
    /// leaves no artifact.
    pub async fn download(&self, url: &str, id: usize) -> Result<()> {
        let mut attempt = 0u32;
        loop {
            let err = match self.fetch_once(url, id).await {
                Ok(()) => return Ok(()),
                Err(err) => err,
            };
            let kind = retry::classify(&err);
            match self.policy.decide(attempt, kind) {
                RetryDecision::Retry { attempt: next } => {
                    eprintln!(
                        "Retry {}/{} for {} due to {}",
                        next,
                        self.policy.max_retries(),
                        url,
                        kind
                    );
                    attempt = next;
                }
                RetryDecision::GiveUp => return Err(err.into()),
            }
        }
    }

    async fn fetch_once(&self, url: &str, id: usize) -> Result<(), FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if status == StatusCode::OK {
            let content_type = response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .unwrap_or_default();
            let filename = format!("file_{}.{}", id, mime::extension_for(content_type));
            let filepath = self.output_dir.join(filename);

            // Partial writes on a mid-stream error are left behind.
            let mut file = File::create(&filepath).await?;
            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                file.write_all(&chunk?).await?;
            }
            file.flush().await?;
            Ok(())
        } else if status == StatusCode::NOT_FOUND || status == StatusCode::INTERNAL_SERVER_ERROR {
            // Permanent failure: the marker resolves this id for good.
            let marker = self.output_dir.join(format!("{}:{}", id, status.as_u16()));
            tokio::fs::write(&marker, b"").await?;
            Ok(())
        } else {
            Err(FetchError::Status(status))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn downloader(dir: &TempDir, timeout: Duration, max_retries: u32) -> Downloader {
        Downloader::new(dir.path().to_path_buf(), timeout, max_retries)
    }

    fn artifacts(dir: &TempDir) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn ok_response_is_streamed_to_an_indexed_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/item"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .set_body_bytes(b"png-bytes".to_vec()),
            )
            .mount(&server)
            .await;
        let tmp = TempDir::new().unwrap();

        let dl = downloader(&tmp, Duration::from_secs(5), 0);
        dl.download(&format!("{}/item", server.uri()), 4)
            .await
            .unwrap();

        let body = std::fs::read(tmp.path().join("file_4.png")).unwrap();
        assert_eq!(body, b"png-bytes");
    }

    #[tokio::test]
    async fn unknown_content_type_falls_back_to_txt() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/item"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"data".to_vec()))
            .mount(&server)
            .await;
        let tmp = TempDir::new().unwrap();

        let dl = downloader(&tmp, Duration::from_secs(5), 0);
        dl.download(&format!("{}/item", server.uri()), 0)
            .await
            .unwrap();

        assert!(tmp.path().join("file_0.txt").is_file());
    }

    #[tokio::test]
    async fn not_found_writes_a_zero_byte_marker() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;
        let tmp = TempDir::new().unwrap();

        let dl = downloader(&tmp, Duration::from_secs(5), 5);
        dl.download(&format!("{}/gone", server.uri()), 12)
            .await
            .unwrap();

        let marker = tmp.path().join("12:404");
        assert_eq!(std::fs::metadata(&marker).unwrap().len(), 0);
        assert_eq!(artifacts(&tmp), vec!["12:404".to_string()]);
        server.verify().await;
    }

    #[tokio::test]
    async fn server_error_writes_a_marker_and_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;
        let tmp = TempDir::new().unwrap();

        let dl = downloader(&tmp, Duration::from_secs(5), 5);
        dl.download(&format!("{}/broken", server.uri()), 3)
            .await
            .unwrap();

        assert_eq!(artifacts(&tmp), vec!["3:500".to_string()]);
        server.verify().await;
    }

    #[tokio::test]
    async fn unexpected_status_leaves_no_artifact() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forbidden"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;
        let tmp = TempDir::new().unwrap();

        let dl = downloader(&tmp, Duration::from_secs(5), 5);
        let result = dl.download(&format!("{}/forbidden", server.uri()), 0).await;

        assert!(result.is_err());
        assert!(artifacts(&tmp).is_empty());
        server.verify().await;
    }

    #[tokio::test]
    async fn timeouts_are_retried_up_to_the_bound() {
        let server = MockServer::start().await;
        // Initial attempt plus two retries, each timing out.
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .expect(3)
            .mount(&server)
            .await;
        let tmp = TempDir::new().unwrap();

        let dl = downloader(&tmp, Duration::from_millis(50), 2);
        let result = dl.download(&format!("{}/slow", server.uri()), 0).await;

        assert!(result.is_err());
        assert!(artifacts(&tmp).is_empty());
        server.verify().await;
    }
}

//! Inbox mutation endpoint
//!
//! [`InboxApi`] is the seam between the updater and the network. The HTTP
//! implementation posts to `/api/inbox`; tests plug in their own.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{InboxError, Result};
use crate::status::InboxStatus;

/// Body of the inbox status mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxMutation {
    pub status: InboxStatus,
    pub project_name: String,
    pub ids: Vec<String>,
}

/// Server side of the inbox
#[async_trait]
pub trait InboxApi: Send + Sync {
    /// Apply a status change to messages on the server.
    ///
    /// The response body of a successful call is not inspected.
    async fn update_messages(&self, mutation: &InboxMutation) -> Result<()>;
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: Option<String>,
}

/// Turn a non-success HTTP response into an error, keeping the server's
/// `detail` message when the body carries one.
pub fn parse_failure(status: u16, body: &str) -> InboxError {
    let detail = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.detail)
        .filter(|d| !d.trim().is_empty());

    InboxError::Server { status, detail }
}

#[cfg(feature = "http")]
pub use http::HttpInboxApi;

#[cfg(feature = "http")]
mod http {
    use async_trait::async_trait;
    use reqwest::Client;
    use std::time::Duration;
    use tracing::{debug, warn};

    use super::{parse_failure, InboxApi, InboxMutation};
    use crate::config::InboxConfig;
    use crate::error::{InboxError, Result};

    /// Inbox endpoint reached over HTTP.
    ///
    /// Immutable once built. To point at another server, build a new one.
    pub struct HttpInboxApi {
        client: Client,
        base_url: String,
    }

    impl HttpInboxApi {
        pub fn new(url: &str, api_key: Option<&str>, timeout_secs: u64) -> Result<Self> {
            if url.trim().is_empty() {
                return Err(InboxError::Config("server url is empty".to_string()));
            }

            let mut builder = Client::builder().timeout(Duration::from_secs(timeout_secs));

            if let Some(key) = api_key {
                let mut headers = reqwest::header::HeaderMap::new();
                let value = format!("Bearer {}", key)
                    .parse::<reqwest::header::HeaderValue>()
                    .map_err(|e| InboxError::Config(format!("invalid api key: {}", e)))?;
                headers.insert(reqwest::header::AUTHORIZATION, value);
                builder = builder.default_headers(headers);
            }

            let client = builder.build()?;

            Ok(Self {
                client,
                base_url: url.trim_end_matches('/').to_string(),
            })
        }

        /// Build from the loaded configuration
        pub fn from_config(config: &InboxConfig) -> Result<Self> {
            Self::new(
                &config.server_url,
                config.api_key.as_deref(),
                config.timeout_secs,
            )
        }

        pub fn base_url(&self) -> &str {
            &self.base_url
        }
    }

    #[async_trait]
    impl InboxApi for HttpInboxApi {
        /// POST /api/inbox
        async fn update_messages(&self, mutation: &InboxMutation) -> Result<()> {
            debug!(
                "POST {}/api/inbox status={} ids={}",
                self.base_url,
                mutation.status,
                mutation.ids.len()
            );

            let resp = self
                .client
                .post(format!("{}/api/inbox", self.base_url))
                .json(mutation)
                .send()
                .await?;

            if !resp.status().is_success() {
                let status = resp.status().as_u16();
                let body = match resp.text().await {
                    Ok(body) => body,
                    Err(e) => {
                        warn!("Could not read error body of HTTP {}: {}", status, e);
                        String::new()
                    }
                };
                warn!("Inbox mutation rejected with HTTP {}", status);
                return Err(parse_failure(status, &body));
            }

            Ok(())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::status::InboxStatus;
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        /// Answer a single request with `status_line` and `body`, handing
        /// back the request body that was received.
        async fn serve_once(
            status_line: &'static str,
            body: &'static str,
        ) -> (String, tokio::task::JoinHandle<String>) {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let base_url = format!("http://{}", listener.local_addr().unwrap());

            let handle = tokio::spawn(async move {
                let (mut socket, _) = listener.accept().await.unwrap();
                let request = read_request(&mut socket).await;

                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_line,
                    body.len(),
                    body
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.unwrap();
                request
            });

            (base_url, handle)
        }

        async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
            let mut raw = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                raw.extend_from_slice(&buf[..n]);

                let text = String::from_utf8_lossy(&raw).to_string();
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            if !name.eq_ignore_ascii_case("content-length") {
                                return None;
                            }
                            value.trim().parse::<usize>().ok()
                        })
                        .unwrap_or(0);
                    if raw.len() >= end + 4 + length {
                        return text[end + 4..end + 4 + length].to_string();
                    }
                }
                if n == 0 {
                    return String::new();
                }
            }
        }

        fn mutation() -> InboxMutation {
            InboxMutation {
                status: InboxStatus::Read,
                project_name: "demo".to_string(),
                ids: vec!["m1".to_string()],
            }
        }

        #[test_log::test(tokio::test)]
        async fn test_update_posts_mutation() {
            let (base_url, server) = serve_once("200 OK", "{}").await;
            let api = HttpInboxApi::new(&base_url, Some("secret"), 5).unwrap();

            api.update_messages(&mutation()).await.unwrap();

            let body: serde_json::Value = serde_json::from_str(&server.await.unwrap()).unwrap();
            assert_eq!(
                body,
                serde_json::json!({"status": "read", "projectName": "demo", "ids": ["m1"]})
            );
        }

        #[test_log::test(tokio::test)]
        async fn test_rejection_keeps_server_detail() {
            let (base_url, server) =
                serve_once("403 Forbidden", r#"{"detail":"Permission denied"}"#).await;
            let api = HttpInboxApi::new(&base_url, None, 5).unwrap();

            let err = api.update_messages(&mutation()).await.unwrap_err();
            server.await.unwrap();

            assert_eq!(
                err,
                InboxError::Server {
                    status: 403,
                    detail: Some("Permission denied".to_string())
                }
            );
        }

        #[test_log::test(tokio::test)]
        async fn test_rejection_without_json_body() {
            let (base_url, server) = serve_once("502 Bad Gateway", "upstream down").await;
            let api = HttpInboxApi::new(&base_url, None, 5).unwrap();

            let err = api.update_messages(&mutation()).await.unwrap_err();
            server.await.unwrap();

            assert_eq!(
                err,
                InboxError::Server {
                    status: 502,
                    detail: None
                }
            );
        }

        #[test_log::test(tokio::test)]
        async fn test_unreachable_server_is_network_error() {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let base_url = format!("http://{}", listener.local_addr().unwrap());
            drop(listener);

            let api = HttpInboxApi::new(&base_url, None, 5).unwrap();
            let err = api.update_messages(&mutation()).await.unwrap_err();
            assert!(matches!(err, InboxError::Network(_)));
        }

        #[test]
        fn test_new_trims_trailing_slash() {
            let api = HttpInboxApi::new("http://localhost:5000/", None, 10).unwrap();
            assert_eq!(api.base_url(), "http://localhost:5000");
        }

        #[test]
        fn test_new_rejects_empty_url() {
            assert!(matches!(
                HttpInboxApi::new("  ", None, 10),
                Err(InboxError::Config(_))
            ));
        }
    }
}

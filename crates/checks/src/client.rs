use std::{fmt, time::Duration};

use eyre::{Result, bail, eyre};
use reqwest::{Client as HttpClient, Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::debug;
use url::Url;

use crate::retry::retry_op;

/// Header carrying the project API key.
const API_KEY_HEADER: &str = "X-Api-Key";

/// Status and decoded body of an API call.
///
/// The status is never turned into an error here; deciding what it means is
/// up to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// JSON body, `{}` when the body is empty or not JSON
    pub body: Value,
}

/// Client for interacting with the Healthchecks.io management API.
#[derive(Clone)]
pub struct Client {
    http: HttpClient,
    api_token: String,
    base_url: Url,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client").field("base_url", &self.base_url.as_str()).finish_non_exhaustive()
    }
}

impl Client {
    /// Create a new client for the API rooted at `base_url`.
    pub fn with_base_url(api_token: String, base_url: Url, timeout: Duration) -> Result<Self> {
        if base_url.cannot_be_a_base() {
            bail!("API base URL {base_url} cannot carry a path");
        }
        let http = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self { http, api_token, base_url })
    }

    /// Base URL every endpoint is appended to.
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Append `segments` to the base URL, percent-encoding each one so that
    /// `/`, `?`, `#` and dot segments cannot leave the API root.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| eyre!("API base URL {} cannot carry a path", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Authenticate the request.
    fn auth(&self, rb: RequestBuilder) -> RequestBuilder {
        rb.header(API_KEY_HEADER, &self.api_token)
    }

    /// `POST` a JSON body to the endpoint made of `segments`.
    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<ApiResponse> {
        let body = serde_json::to_value(body)?;
        self.send(Method::POST, segments, Some(&body)).await
    }

    /// `POST` to the endpoint made of `segments` without a body.
    pub async fn post(&self, segments: &[&str]) -> Result<ApiResponse> {
        self.send(Method::POST, segments, None).await
    }

    /// `DELETE` the endpoint made of `segments`.
    pub async fn delete(&self, segments: &[&str]) -> Result<ApiResponse> {
        self.send(Method::DELETE, segments, None).await
    }

    async fn send(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&Value>,
    ) -> Result<ApiResponse> {
        let url = self.endpoint(segments)?;

        let resp = retry_op(method.is_idempotent(), || async {
            let mut rb = self.auth(self.http.request(method.clone(), url.clone()));
            if let Some(body) = body {
                rb = rb.json(body);
            }
            Ok::<_, eyre::Report>(rb.send().await?)
        })
        .await?;

        let status = resp.status();
        let text = resp.text().await?;
        debug!(%method, %url, %status, "Healthchecks API response");

        Ok(ApiResponse { status, body: decode_body(&text) })
    }
}

fn decode_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return json!({});
    }
    serde_json::from_str(text).unwrap_or_else(|e| {
        debug!(error = %e, body = text, "Response body is not JSON");
        json!({})
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn client(url: &str) -> Client {
        let url: Url = url.parse().unwrap();
        Client::with_base_url("test_api_key".to_owned(), url, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn endpoint_appends_to_base_path() {
        for base in ["https://hc.example.com/api/v3", "https://hc.example.com/api/v3/"] {
            let c = client(base);
            assert_eq!(c.endpoint(&["checks", ""]).unwrap().path(), "/api/v3/checks/");
            let pause = c.endpoint(&["checks", "u1", "pause"]).unwrap();
            assert_eq!(pause.path(), "/api/v3/checks/u1/pause");
        }
        let root = client("https://hc.example.com");
        assert_eq!(root.endpoint(&["checks", ""]).unwrap().path(), "/checks/");
    }

    #[test]
    fn endpoint_encodes_segments() {
        let c = client("https://hc.example.com/api/v3");
        let url = c.endpoint(&["checks", "../../channels?x=1#f"]).unwrap();
        assert_eq!(url.path(), "/api/v3/checks/..%2F..%2Fchannels%3Fx=1%23f");
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn rejects_cannot_be_a_base_url() {
        let url: Url = "mailto:ops@example.com".parse().unwrap();
        assert!(Client::with_base_url("k".to_owned(), url, Duration::from_secs(1)).is_err());
    }

    #[test]
    fn debug_hides_token() {
        assert!(!format!("{:?}", client("https://hc.example.com")).contains("test_api_key"));
    }

    #[test]
    fn decode_body_handles_empty_and_garbage() {
        assert_eq!(decode_body(""), json!({}));
        assert_eq!(decode_body("<html>oops</html>"), json!({}));
        assert_eq!(decode_body(r#"{"a":1}"#), json!({"a": 1}));
    }

    #[tokio::test]
    async fn post_json_sends_api_key_and_body() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v3/checks/")
            .match_header("x-api-key", "test_api_key")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(json!({"name": "backup"})))
            .with_status(201)
            .with_body(r#"{"ping_url":"https://hc-ping.com/u1"}"#)
            .create_async()
            .await;

        let c = client(&format!("{}/api/v3", server.url()));
        let resp = c.post_json(&["checks", ""], &json!({"name": "backup"})).await.unwrap();

        assert_eq!(resp.status, StatusCode::CREATED);
        assert_eq!(resp.body["ping_url"], "https://hc-ping.com/u1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn delete_returns_status_without_error() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("DELETE", "/checks/abc")
            .match_header("x-api-key", "test_api_key")
            .with_status(404)
            .create_async()
            .await;

        let resp = client(&server.url()).delete(&["checks", "abc"]).await.unwrap();

        assert_eq!(resp.status, StatusCode::NOT_FOUND);
        assert_eq!(resp.body, json!({}));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn timed_out_post_is_sent_once() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/checks/")
            .with_status(201)
            .with_body_from_request(|_| {
                std::thread::sleep(Duration::from_millis(300));
                br#"{"ping_url":"https://hc-ping.com/u1"}"#.to_vec()
            })
            .expect(1)
            .create_async()
            .await;

        let url: Url = server.url().parse().unwrap();
        let c = Client::with_base_url("k".to_owned(), url, Duration::from_millis(100)).unwrap();
        let err = c.post_json(&["checks", ""], &json!({"name": "backup"})).await.unwrap_err();

        assert!(err.downcast_ref::<reqwest::Error>().is_some_and(reqwest::Error::is_timeout));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn server_errors_are_not_retried() {
        let mut server = Server::new_async().await;
        let mock =
            server.mock("POST", "/checks/abc/pause").with_status(500).expect(1).create_async().await;

        let resp = client(&server.url()).post(&["checks", "abc", "pause"]).await.unwrap();

        assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
        mock.assert_async().await;
    }
}

//! HTTP transport layer for the Toolguard SDK.

use crate::config::ClientConfig;
use crate::error::{GuardClientError, GuardClientResult};
use reqwest::{header, Client, Response};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::debug;

const USER_AGENT: &str = concat!("toolguard/", env!("CARGO_PKG_VERSION"));

/// HTTP transport for making API requests.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    config: Arc<ClientConfig>,
}

impl HttpTransport {
    /// Create a new HTTP transport with the given configuration.
    pub fn new(config: Arc<ClientConfig>) -> GuardClientResult<Self> {
        let mut headers = header::HeaderMap::new();

        // Add bearer token header if present
        if let Some(ref token) = config.token {
            let mut value = header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| GuardClientError::Config("Invalid token format".to_string()))?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self { client, config })
    }

    /// Build a URL for the given path. Paths resolve beneath the base URL,
    /// so a base of `https://host/aiguard` keeps its `/aiguard` prefix.
    fn build_url(&self, path: &str) -> GuardClientResult<url::Url> {
        let mut base = self.config.base_url.clone();
        if !base.path().ends_with('/') {
            let prefix = format!("{}/", base.path());
            base.set_path(&prefix);
        }
        base.join(path.trim_start_matches('/'))
            .map_err(GuardClientError::InvalidUrl)
    }

    /// Send a request once and turn non-success statuses into errors.
    async fn execute(&self, request: reqwest::RequestBuilder) -> GuardClientResult<Response> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                GuardClientError::Timeout
            } else {
                GuardClientError::Http(e)
            }
        })?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(GuardClientError::from_response(status, &body))
    }

    /// Execute a POST request.
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> GuardClientResult<T> {
        let url = self.build_url(path)?;
        debug!(url = %url, "POST request");

        let response = self.execute(self.client.post(url).json(body)).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::time::Duration;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct TestResponse {
        message: String,
        value: i32,
    }

    #[derive(Debug, Serialize)]
    struct TestRequest {
        name: String,
    }

    fn create_config(base_url: &str) -> Arc<ClientConfig> {
        Arc::new(ClientConfig {
            base_url: url::Url::parse(base_url).unwrap(),
            token: None,
            timeout: Duration::from_secs(30),
        })
    }

    fn create_config_with_token(base_url: &str, token: &str) -> Arc<ClientConfig> {
        Arc::new(ClientConfig {
            base_url: url::Url::parse(base_url).unwrap(),
            token: Some(token.to_string()),
            timeout: Duration::from_secs(30),
        })
    }

    #[tokio::test]
    async fn test_post_request() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/create"))
            .and(body_json(serde_json::json!({"name": "test"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(TestResponse {
                message: "created".to_string(),
                value: 1,
            }))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(create_config(&server.uri())).unwrap();

        let request = TestRequest {
            name: "test".to_string(),
        };
        let result: TestResponse = transport.post("/v1/create", &request).await.unwrap();
        assert_eq!(result.message, "created");
        assert_eq!(result.value, 1);
    }

    #[tokio::test]
    async fn test_authorization_header() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/protected"))
            .and(header("Authorization", "Bearer pts-test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(TestResponse {
                message: "authorized".to_string(),
                value: 100,
            }))
            .mount(&server)
            .await;

        let config = create_config_with_token(&server.uri(), "pts-test-key");
        let transport = HttpTransport::new(config).unwrap();

        let result: TestResponse = transport
            .post("/v1/protected", &serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(result.message, "authorized");
    }

    #[tokio::test]
    async fn test_error_on_400() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/bad"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(serde_json::json!({"status": "ValidationError", "summary": "bad input"})),
            )
            .mount(&server)
            .await;

        let transport = HttpTransport::new(create_config(&server.uri())).unwrap();

        let result: GuardClientResult<TestResponse> =
            transport.post("/v1/bad", &serde_json::json!({})).await;
        match result {
            Err(GuardClientError::Api { status, message, .. }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "bad input");
            }
            _ => panic!("Expected Api error"),
        }
    }

    #[tokio::test]
    async fn test_no_retry_on_503() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/flaky"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .expect(1)
            .mount(&server)
            .await;

        let transport = HttpTransport::new(create_config(&server.uri())).unwrap();

        let result: GuardClientResult<TestResponse> =
            transport.post("/v1/flaky", &serde_json::json!({})).await;
        assert!(matches!(result, Err(GuardClientError::Api { status: 503, .. })));
    }

    #[tokio::test]
    async fn test_timeout_maps_to_timeout_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let config = Arc::new(ClientConfig {
            base_url: url::Url::parse(&server.uri()).unwrap(),
            token: None,
            timeout: Duration::from_millis(50),
        });
        let transport = HttpTransport::new(config).unwrap();

        let result: GuardClientResult<serde_json::Value> =
            transport.post("/v1/slow", &serde_json::json!({})).await;
        assert!(matches!(result, Err(GuardClientError::Timeout)));
    }

    #[tokio::test]
    async fn test_build_url() {
        let transport = HttpTransport::new(create_config("http://localhost:8080")).unwrap();

        let url = transport.build_url("/v1/guard").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/v1/guard");
    }

    #[tokio::test]
    async fn test_build_url_with_trailing_slash() {
        let transport = HttpTransport::new(create_config("http://localhost:8080/")).unwrap();

        let url = transport.build_url("v1/guard").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/v1/guard");
    }

    #[tokio::test]
    async fn test_build_url_keeps_path_prefix() {
        for base in ["https://gw.example.com/aiguard", "https://gw.example.com/aiguard/"] {
            let transport = HttpTransport::new(create_config(base)).unwrap();
            let url = transport.build_url("/v1/guard").unwrap();
            assert_eq!(url.as_str(), "https://gw.example.com/aiguard/v1/guard");
        }
    }

    #[tokio::test]
    async fn test_post_under_path_prefix() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/aiguard/v2/get"))
            .respond_with(ResponseTemplate::new(200).set_body_json(TestResponse {
                message: "prefixed".to_string(),
                value: 2,
            }))
            .expect(1)
            .mount(&server)
            .await;

        let base = format!("{}/aiguard", server.uri());
        let transport = HttpTransport::new(create_config(&base)).unwrap();

        let result: TestResponse = transport.post("/v2/get", &serde_json::json!({})).await.unwrap();
        assert_eq!(result.message, "prefixed");
    }
}

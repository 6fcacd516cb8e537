use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use precis_core::{BackendError, InferenceBackend};
use precis_settings::VertexSettings;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictRequest<'a> {
    instances: [Instance<'a>; 1],
    parameters: Parameters,
}

#[derive(Debug, Serialize)]
struct Instance<'a> {
    prompt: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Parameters {
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    #[serde(default)]
    content: String,
}

/// Hosted text model on Vertex AI, called through the `:predict` endpoint.
pub struct VertexProvider {
    client: Client,
    settings: VertexSettings,
    access_token: SecretString,
    endpoint: String,
}

impl VertexProvider {
    pub fn new(settings: VertexSettings, access_token: SecretString) -> Result<Self, BackendError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| BackendError::NetworkError(format!("failed to build HTTP client: {e}")))?;
        Self::with_client(settings, access_token, client)
    }

    pub fn with_client(
        settings: VertexSettings,
        access_token: SecretString,
        client: Client,
    ) -> Result<Self, BackendError> {
        if settings.project.trim().is_empty() {
            return Err(BackendError::InvalidRequest(
                "vertex project is not configured".into(),
            ));
        }
        let endpoint = predict_url(&settings);
        Ok(Self {
            client,
            settings,
            access_token,
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// `{base}/v1/projects/{project}/locations/{location}/publishers/google/models/{model}:predict`
fn predict_url(settings: &VertexSettings) -> String {
    let base = settings
        .api_base
        .clone()
        .unwrap_or_else(|| format!("https://{}-aiplatform.googleapis.com", settings.location));
    format!(
        "{}/v1/projects/{}/locations/{}/publishers/google/models/{}:predict",
        base.trim_end_matches('/'),
        settings.project,
        settings.location,
        settings.model
    )
}

fn parse_retry_after(value: Option<&reqwest::header::HeaderValue>) -> Option<Duration> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[async_trait]
impl InferenceBackend for VertexProvider {
    fn name(&self) -> &str {
        "vertex"
    }

    fn model(&self) -> &str {
        &self.settings.model
    }

    #[instrument(skip(self, prompt), fields(model = %self.settings.model, prompt_len = prompt.len()))]
    async fn invoke(&self, prompt: &str, max_output_tokens: u32) -> Result<String, BackendError> {
        let body = PredictRequest {
            instances: [Instance { prompt }],
            parameters: Parameters {
                max_output_tokens,
                temperature: self.settings.temperature,
            },
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.access_token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::NetworkError(e.to_string()))?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let retry_after = parse_retry_after(resp.headers().get(RETRY_AFTER));
            let body = resp.text().await.unwrap_or_default();
            debug!(status, "vertex predict rejected");
            return Err(BackendError::from_status(status, body).with_retry_after(retry_after));
        }

        let parsed: PredictResponse = resp
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;

        parsed
            .predictions
            .into_iter()
            .next()
            .map(|p| p.content)
            .ok_or_else(|| BackendError::InvalidResponse("response has no predictions".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PREDICT_PATH: &str =
        "/v1/projects/acme/locations/us-central1/publishers/google/models/text-bison@001:predict";

    fn settings(api_base: Option<String>) -> VertexSettings {
        VertexSettings {
            project: "acme".to_string(),
            api_base,
            ..Default::default()
        }
    }

    fn provider(server: &MockServer) -> VertexProvider {
        VertexProvider::new(
            settings(Some(server.uri())),
            SecretString::from("test-token".to_string()),
        )
        .unwrap()
    }

    #[test]
    fn default_endpoint_uses_regional_host() {
        let p = VertexProvider::new(settings(None), SecretString::from("t".to_string())).unwrap();
        assert_eq!(
            p.endpoint(),
            format!("https://us-central1-aiplatform.googleapis.com{PREDICT_PATH}")
        );
        assert_eq!(p.model(), "text-bison@001");
        assert_eq!(p.name(), "vertex");
    }

    #[test]
    fn missing_project_rejected() {
        let result = VertexProvider::new(VertexSettings::default(), SecretString::from("t".to_string()));
        assert!(matches!(result, Err(BackendError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn predict_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(PREDICT_PATH))
            .and(header("authorization", "Bearer test-token"))
            .and(body_partial_json(serde_json::json!({
                "instances": [{"prompt": "summarize me"}],
                "parameters": {"maxOutputTokens": 1024}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "predictions": [{"content": "- a point"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = provider(&server).invoke("summarize me", 1024).await.unwrap();
        assert_eq!(text, "- a point");
    }

    #[tokio::test]
    async fn too_many_requests_is_transient_with_hint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
            .mount(&server)
            .await;

        let err = provider(&server).invoke("x", 10).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(err.suggested_delay(), Some(Duration::from_secs(7)));
    }

    #[tokio::test]
    async fn quota_body_is_resource_exhausted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}
            })))
            .mount(&server)
            .await;

        let err = provider(&server).invoke("x", 10).await.unwrap_err();
        assert!(matches!(err, BackendError::ResourceExhausted { .. }));
    }

    #[tokio::test]
    async fn quota_rejection_keeps_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("retry-after", "17")
                    .set_body_string("RESOURCE_EXHAUSTED: quota exceeded"),
            )
            .mount(&server)
            .await;

        let err = provider(&server).invoke("x", 10).await.unwrap_err();
        assert!(matches!(err, BackendError::ResourceExhausted { .. }));
        assert_eq!(err.suggested_delay(), Some(Duration::from_secs(17)));
    }

    #[tokio::test]
    async fn forbidden_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("permission denied"))
            .mount(&server)
            .await;

        let err = provider(&server).invoke("x", 10).await.unwrap_err();
        assert!(matches!(err, BackendError::AuthenticationFailed(_)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn empty_predictions_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "predictions": []
            })))
            .mount(&server)
            .await;

        let err = provider(&server).invoke("x", 10).await.unwrap_err();
        assert!(matches!(err, BackendError::InvalidResponse(_)));
    }

    #[test]
    fn retry_after_parsing() {
        let v = reqwest::header::HeaderValue::from_static("12");
        assert_eq!(parse_retry_after(Some(&v)), Some(Duration::from_secs(12)));
        let date = reqwest::header::HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT");
        assert_eq!(parse_retry_after(Some(&date)), None);
        assert_eq!(parse_retry_after(None), None);
    }
}

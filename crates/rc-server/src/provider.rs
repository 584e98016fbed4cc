//! Provider client implementations. `StubProviderClient` is deterministic
//! and network-free, selected by `RESPONSES_RUNTIME_MODE=stub`;
//! `HttpProviderClient` is a thin adapter over a vendor Responses-shaped
//! HTTP endpoint: bearer auth, one POST, JSON in/out.

use rc_types::provider::{ProviderClient, ProviderHeaders, ProviderRequest, ProviderResult, ProviderStatus, ProviderUsage};
use rc_types::{Error, Result};
use uuid::Uuid;

/// Returns a single completed text message echoing the request's input, so
/// `serve --runtime-mode stub` is fully exercisable without network access.
pub struct StubProviderClient;

#[async_trait::async_trait]
impl ProviderClient for StubProviderClient {
    async fn create(&self, request: &ProviderRequest) -> Result<(ProviderResult, ProviderHeaders)> {
        let text = request
            .input
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| request.input.to_string());
        let result = ProviderResult {
            id: format!("resp_stub_{}", Uuid::new_v4()),
            status: ProviderStatus::Completed,
            output: vec![serde_json::json!({
                "type": "message",
                "role": "assistant",
                "id": format!("msg_{}", Uuid::new_v4()),
                "content": [{"type": "output_text", "text": format!("stub: {text}")}],
            })],
            usage: ProviderUsage {
                total_tokens: Some((text.len() as u64 / 4).max(1)),
            },
            model: Some(request.model.clone()),
        };
        Ok((result, ProviderHeaders::new()))
    }
}

/// Thin HTTP adapter over a vendor endpoint speaking the Responses wire
/// shape directly — `request` is forwarded as-is and the JSON body is
/// expected to already match `ProviderResult`'s fields.
pub struct HttpProviderClient {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpProviderClient {
    pub fn new(base_url: String, api_key: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(|e| Error::UpstreamFailure(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }
}

#[async_trait::async_trait]
impl ProviderClient for HttpProviderClient {
    async fn create(&self, request: &ProviderRequest) -> Result<(ProviderResult, ProviderHeaders)> {
        let mut builder = self.client.post(format!("{}/v1/responses", self.base_url)).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| Error::UpstreamFailure(e.to_string()))?;

        let mut headers = ProviderHeaders::new();
        for (name, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(name.as_str().to_lowercase(), v.to_string());
            }
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::UpstreamFailure(format!("provider returned {status}: {body}")));
        }

        let result: ProviderResult = response
            .json()
            .await
            .map_err(|e| Error::UpstreamFailure(e.to_string()))?;
        Ok((result, headers))
    }
}

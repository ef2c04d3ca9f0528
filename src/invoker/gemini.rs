//! Gemini `generateContent` クライアント

use super::{InvokeError, ModelInvoker};
use crate::config::Config;
use crate::error::{PlantAiError, Result};
use crate::image::PreparedImage;
use async_trait::async_trait;
use plant_advisor_common::{GeminiErrorResponse, GeminiRequest};
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// エラー本文をメッセージに載せる時の上限文字数
const MAX_ERROR_BODY_CHARS: usize = 500;

static SHARED: OnceLock<Arc<GeminiClient>> = OnceLock::new();

pub struct GeminiClient {
    api_key: String,
    model: String,
    api_base: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiClient")
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    pub fn new(api_key: String, model: String, api_base: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PlantAiError::Config(format!("HTTPクライアントの初期化に失敗: {}", e)))?;

        Ok(Self {
            api_key,
            model,
            api_base: api_base.trim_end_matches('/').to_string(),
            timeout,
            client,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config.get_api_key()?;
        Self::new(api_key, config.model.clone(), config.api_base.clone(), config.timeout())
    }

    /// プロセス共通のクライアント
    ///
    /// 最初の呼び出しで作り、以降は同じものを返す。破棄はしない。
    pub fn shared(config: &Config) -> Result<Arc<GeminiClient>> {
        if let Some(client) = SHARED.get() {
            return Ok(Arc::clone(client));
        }
        let client = Arc::new(Self::from_config(config)?);
        tracing::info!(model = %client.model, "Geminiクライアント初期化");
        Ok(Arc::clone(SHARED.get_or_init(|| client)))
    }

    fn generate_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }

    /// 接続確認（モデル一覧の取得）
    ///
    /// # Returns
    /// 利用可能なモデル数
    pub async fn validate_connection(&self) -> std::result::Result<usize, InvokeError> {
        let response = self
            .client
            .get(format!("{}/models", self.api_base))
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| InvokeError::from_reqwest(e, self.timeout))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| InvokeError::from_reqwest(e, self.timeout))?;

        if !(200..300).contains(&status) {
            return Err(api_error(status, &body));
        }

        let models: Value =
            serde_json::from_str(&body).map_err(|e| InvokeError::Decode(e.to_string()))?;
        Ok(models["models"].as_array().map(Vec::len).unwrap_or(0))
    }
}

/// 非2xx応答を [`InvokeError::Api`] にする
fn api_error(status: u16, body: &str) -> InvokeError {
    if let Ok(error_response) = serde_json::from_str::<GeminiErrorResponse>(body) {
        let api_status = Some(error_response.error.status).filter(|s| !s.is_empty());
        return InvokeError::Api {
            status,
            api_status,
            message: error_response.error.message,
        };
    }
    InvokeError::Api {
        status,
        api_status: None,
        message: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
    }
}

#[async_trait]
impl ModelInvoker for GeminiClient {
    async fn generate(&self, prompt: &str, image: &PreparedImage) -> std::result::Result<Value, InvokeError> {
        let request = GeminiRequest::with_image(prompt, image.mime_type(), image.to_base64());

        tracing::debug!(model = %self.model, bytes = image.bytes.len(), "generateContent送信");

        let response = self
            .client
            .post(self.generate_url())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| InvokeError::from_reqwest(e, self.timeout))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| InvokeError::from_reqwest(e, self.timeout))?;

        if !(200..300).contains(&status) {
            return Err(api_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| InvokeError::Decode(e.to_string()))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GeminiClient {
        GeminiClient::new(
            "secret-key".into(),
            "gemini-2.5-flash-image-preview".into(),
            "https://example.test/v1beta/".into(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_generate_url() {
        assert_eq!(
            client().generate_url(),
            "https://example.test/v1beta/models/gemini-2.5-flash-image-preview:generateContent"
        );
    }

    #[test]
    fn test_debug_hides_api_key() {
        let debug = format!("{:?}", client());
        assert!(debug.contains("gemini-2.5-flash-image-preview"));
        assert!(!debug.contains("secret-key"));
    }

    #[test]
    fn test_api_error_with_gemini_body() {
        let body = r#"{"error": {"code": 429, "message": "Resource has been exhausted", "status": "RESOURCE_EXHAUSTED"}}"#;
        match api_error(429, body) {
            InvokeError::Api {
                status,
                api_status,
                message,
            } => {
                assert_eq!(status, 429);
                assert_eq!(api_status.as_deref(), Some("RESOURCE_EXHAUSTED"));
                assert_eq!(message, "Resource has been exhausted");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_api_error_with_plain_body() {
        let body = "x".repeat(2000);
        match api_error(502, &body) {
            InvokeError::Api {
                api_status, message, ..
            } => {
                assert!(api_status.is_none());
                assert_eq!(message.len(), MAX_ERROR_BODY_CHARS);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_from_config_requires_api_key() {
        if std::env::var("GEMINI_API_KEY").is_ok() {
            return;
        }
        let result = GeminiClient::from_config(&Config::default());
        assert!(matches!(result, Err(PlantAiError::MissingApiKey)));
    }
}

//! 外部解析サービスの呼び出し
//!
//! 1リクエストにつき1回だけ呼ぶ。リトライはしない。
//! 失敗は構造化コード付きの [`InvokeError`] で返し、分類は呼び出し側に任せる。

mod fake;
mod gemini;

pub use fake::FakeInvoker;
pub use gemini::GeminiClient;

use crate::config::{Config, Provider};
use crate::error::Result;
use crate::image::PreparedImage;
use async_trait::async_trait;
use plant_advisor_common::{Classify, ErrorKind};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// 呼び出し失敗
#[derive(Debug, Clone, Error)]
pub enum InvokeError {
    #[error("API returned error: {status} - {message}")]
    Api {
        status: u16,
        /// Gemini の `error.status`（`RESOURCE_EXHAUSTED` など）
        api_status: Option<String>,
        message: String,
    },

    #[error("request timeout after {0:?}")]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("API request failed: {0}")]
    Request(String),

    #[error("failed to decode response body: {0}")]
    Decode(String),
}

impl InvokeError {
    pub(crate) fn from_reqwest(error: reqwest::Error, timeout: Duration) -> Self {
        // URLは落としてログに出さない
        let error = error.without_url();
        if error.is_timeout() {
            InvokeError::Timeout(timeout)
        } else if error.is_connect() {
            InvokeError::Connect(error.to_string())
        } else if error.is_decode() {
            InvokeError::Decode(error.to_string())
        } else {
            InvokeError::Request(error.to_string())
        }
    }
}

impl Classify for InvokeError {
    fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            InvokeError::Api {
                status, api_status, ..
            } => api_status
                .as_deref()
                .and_then(ErrorKind::from_api_status)
                .or_else(|| ErrorKind::from_http_status(*status)),
            InvokeError::Timeout(_) | InvokeError::Connect(_) => Some(ErrorKind::Network),
            InvokeError::Decode(_) => Some(ErrorKind::Malformed),
            InvokeError::Request(_) => None,
        }
    }
}

/// 解析モデルの呼び出し口
///
/// 実装はスレッド安全で、プロセス全体で共有される。
#[async_trait]
pub trait ModelInvoker: Send + Sync + fmt::Debug {
    /// プロンプトと画像を1回送り、生の応答JSONをそのまま返す
    async fn generate(&self, prompt: &str, image: &PreparedImage) -> std::result::Result<Value, InvokeError>;

    fn model_name(&self) -> &str;
}

/// 設定に従って呼び出し口を作る
///
/// Gemini は資格情報が無ければここで失敗する（起動時に致命的エラー）。
pub fn create_invoker(config: &Config) -> Result<Arc<dyn ModelInvoker>> {
    match config.provider {
        Provider::Gemini => {
            let client: Arc<dyn ModelInvoker> = GeminiClient::shared(config)?;
            Ok(client)
        }
        Provider::Fake => Ok(Arc::new(FakeInvoker::default())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(status: u16, api_status: Option<&str>, message: &str) -> InvokeError {
        InvokeError::Api {
            status,
            api_status: api_status.map(str::to_string),
            message: message.to_string(),
        }
    }

    #[test]
    fn test_api_status_wins_over_http_status() {
        let err = api_error(400, Some("RESOURCE_EXHAUSTED"), "quota");
        assert_eq!(err.error_kind(), Some(ErrorKind::Quota));
    }

    #[test]
    fn test_http_status_used_without_api_status() {
        assert_eq!(api_error(403, None, "").error_kind(), Some(ErrorKind::Auth));
        assert_eq!(api_error(503, None, "").error_kind(), Some(ErrorKind::ServiceUnavailable));
        assert_eq!(
            api_error(400, Some("INVALID_ARGUMENT"), "API key not valid").error_kind(),
            None
        );
    }

    #[test]
    fn test_transport_errors() {
        assert_eq!(
            InvokeError::Timeout(Duration::from_secs(60)).error_kind(),
            Some(ErrorKind::Network)
        );
        assert_eq!(InvokeError::Connect("refused".into()).error_kind(), Some(ErrorKind::Network));
        assert_eq!(InvokeError::Decode("eof".into()).error_kind(), Some(ErrorKind::Malformed));
        assert_eq!(InvokeError::Request("odd".into()).error_kind(), None);
    }

    #[test]
    fn test_fake_provider_needs_no_api_key() {
        let config = Config {
            provider: Provider::Fake,
            ..Default::default()
        };
        let invoker = create_invoker(&config).unwrap();
        assert_eq!(invoker.model_name(), "fake");
    }
}

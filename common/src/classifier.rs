//! エラー分類
//!
//! 捕まえた失敗を [`ErrorKind`] に振り分け、代替内容とHTTPステータスを決める。
//!
//! 判定順:
//! 1. 失敗の型自身が持つ構造化コード（[`Classify`]）
//! 2. 構造化コードが無い時だけ、小文字化したメッセージへの部分一致表（先勝ち）

use crate::fallback::fallback_plants;
use crate::types::{AnalysisResponse, AnalysisResult};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// 失敗の分類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Auth,
    Quota,
    Network,
    Malformed,
    ImageInvalid,
    ServiceUnavailable,
    Validation,
    General,
}

/// 部分一致表。上から順に評価し、最初に当たった分類を使う。
const MESSAGE_RULES: &[(&[&str], ErrorKind)] = &[
    (&["auth", "credential", "api key", "permission"], ErrorKind::Auth),
    (&["quota", "rate limit", "too many requests", "limit exceeded"], ErrorKind::Quota),
    (&["network", "connection", "timeout", "unreachable", "dns"], ErrorKind::Network),
    (&["json", "parse", "format", "decode", "malformed"], ErrorKind::Malformed),
    (&["image", "invalid format", "decode", "corrupt"], ErrorKind::ImageInvalid),
    (&["unavailable", "not found", "404", "503", "service"], ErrorKind::ServiceUnavailable),
];

impl ErrorKind {
    /// メッセージの部分一致で分類する（構造化コードが無い時の最後の手段）
    pub fn from_message(message: &str) -> Self {
        let lower = message.to_lowercase();
        MESSAGE_RULES
            .iter()
            .find(|(terms, _)| terms.iter().any(|t| lower.contains(t)))
            .map(|(_, kind)| *kind)
            .unwrap_or(ErrorKind::General)
    }

    /// 上流のHTTPステータスから分類する
    ///
    /// 400 など、ステータスだけでは決められないものは `None`。
    pub fn from_http_status(status: u16) -> Option<Self> {
        match status {
            401 | 403 => Some(ErrorKind::Auth),
            429 => Some(ErrorKind::Quota),
            404 | 500 | 502 | 503 | 504 => Some(ErrorKind::ServiceUnavailable),
            _ => None,
        }
    }

    /// Gemini のgRPCステータス名（`error.status`）から分類する
    pub fn from_api_status(status: &str) -> Option<Self> {
        match status {
            "UNAUTHENTICATED" | "PERMISSION_DENIED" => Some(ErrorKind::Auth),
            "RESOURCE_EXHAUSTED" => Some(ErrorKind::Quota),
            "UNAVAILABLE" | "NOT_FOUND" | "DEADLINE_EXCEEDED" => Some(ErrorKind::ServiceUnavailable),
            _ => None,
        }
    }

    /// HTTPステータスコード
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::Auth => 401,
            ErrorKind::Quota => 429,
            ErrorKind::Network | ErrorKind::ServiceUnavailable => 503,
            ErrorKind::Validation | ErrorKind::ImageInvalid => 400,
            ErrorKind::General | ErrorKind::Malformed => 500,
        }
    }

    /// 代替植物リストを付けるか（認証と画像の失敗では付けない）
    pub fn includes_fallback_plants(self) -> bool {
        !matches!(self, ErrorKind::Auth | ErrorKind::ImageInvalid)
    }

    /// 代替結果の説明文
    pub fn fallback_description(self) -> &'static str {
        match self {
            ErrorKind::Auth => "Unable to authenticate with plant analysis service. Please try again later.",
            ErrorKind::Quota => "Plant analysis service is currently experiencing high demand. Please try again in a few minutes.",
            ErrorKind::Network => "Unable to connect to plant analysis service. Please check your internet connection and try again.",
            ErrorKind::Malformed => "Plant analysis completed, but response formatting failed. Basic recommendations provided.",
            ErrorKind::ImageInvalid => "Unable to process the uploaded image. Please try with a different image.",
            ErrorKind::ServiceUnavailable => "Plant analysis service is temporarily unavailable. Basic recommendations provided.",
            ErrorKind::Validation => "Invalid request data.",
            ErrorKind::General => "Plant analysis encountered an issue, but basic recommendations are available.",
        }
    }

    /// レスポンスの `error` に載せる利用者向けメッセージ
    ///
    /// 入力検証だけは個別の理由をそのまま使うので `None`。
    pub fn user_message(self) -> Option<&'static str> {
        let message = match self {
            ErrorKind::Auth => "Authentication failed. Please contact support if this persists.",
            ErrorKind::Quota => "Service temporarily unavailable due to high demand. Please try again shortly.",
            ErrorKind::Network => "Network connection issue. Please check your internet connection and try again.",
            ErrorKind::Malformed => "Response processing issue. Basic plant suggestions provided.",
            ErrorKind::ImageInvalid => "Image processing failed. Please try uploading a different image.",
            ErrorKind::ServiceUnavailable => "Analysis service temporarily unavailable. Please try again later.",
            ErrorKind::Validation => return None,
            ErrorKind::General => "Analysis service encountered an issue. Basic plant suggestions provided.",
        };
        Some(message)
    }

    /// この分類の代替結果
    pub fn fallback_result(self) -> AnalysisResult {
        let plants = if self.includes_fallback_plants() {
            fallback_plants()
        } else {
            Vec::new()
        };
        AnalysisResult::new(self.fallback_description(), plants)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Auth => "auth",
            ErrorKind::Quota => "quota",
            ErrorKind::Network => "network",
            ErrorKind::Malformed => "malformed",
            ErrorKind::ImageInvalid => "image",
            ErrorKind::ServiceUnavailable => "unavailable",
            ErrorKind::Validation => "validation",
            ErrorKind::General => "general",
        };
        f.write_str(name)
    }
}

/// 構造化された分類コードを持つエラー
///
/// コードで決められない時は `None` を返し、メッセージ表に任せる。
pub trait Classify {
    fn error_kind(&self) -> Option<ErrorKind>;

    /// 分類ごとの既定文ではなく個別の説明文を使う時だけ `Some`
    fn fallback_description(&self) -> Option<&'static str> {
        None
    }
}

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// 分類済みの終端エラー
///
/// パイプラインのどの段階からでも作られ、そのままレスポンスになる。
#[derive(Debug, Error)]
#[error("{kind} error: {message}")]
pub struct ClassifiedError {
    kind: ErrorKind,
    message: String,
    fallback: AnalysisResult,
    #[source]
    source: Option<BoxError>,
}

impl ClassifiedError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            fallback: kind.fallback_result(),
            source: None,
        }
    }

    /// 失敗を分類する。構造化コードを優先し、無ければメッセージで判定する。
    pub fn classify<E>(error: E) -> Self
    where
        E: Classify + std::error::Error + Send + Sync + 'static,
    {
        let message = error.to_string();
        let kind = error
            .error_kind()
            .unwrap_or_else(|| ErrorKind::from_message(&message));
        let mut fallback = kind.fallback_result();
        if let Some(description) = error.fallback_description() {
            fallback.description = description.to_string();
        }
        Self {
            kind,
            message,
            fallback,
            source: Some(Box::new(error)),
        }
    }

    /// 型を持たない失敗（メッセージのみ）を分類する
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(ErrorKind::from_message(&message), message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status_code(&self) -> u16 {
        self.kind.status_code()
    }

    pub fn fallback(&self) -> &AnalysisResult {
        &self.fallback
    }

    /// `/answer` の失敗レスポンス
    pub fn to_response(&self) -> AnalysisResponse {
        let error = match self.kind.user_message() {
            Some(message) => message,
            None => self.message.as_str(),
        };
        AnalysisResponse::failure(self.fallback.clone(), error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("{message}")]
    struct FakeError {
        message: String,
        code: Option<ErrorKind>,
    }

    impl Classify for FakeError {
        fn error_kind(&self) -> Option<ErrorKind> {
            self.code
        }
    }

    #[test]
    fn test_from_message_required_examples() {
        let quota = ClassifiedError::from_message("Quota exceeded for project");
        assert_eq!((quota.kind(), quota.status_code()), (ErrorKind::Quota, 429));

        let auth = ClassifiedError::from_message("caller lacks PERMISSION on model");
        assert_eq!((auth.kind(), auth.status_code()), (ErrorKind::Auth, 401));

        let network = ClassifiedError::from_message("request Timeout after 60s");
        assert_eq!((network.kind(), network.status_code()), (ErrorKind::Network, 503));
    }

    #[test]
    fn test_from_message_priority_order() {
        // auth > quota
        assert_eq!(ErrorKind::from_message("API key quota exceeded"), ErrorKind::Auth);
        // quota > network
        assert_eq!(ErrorKind::from_message("rate limit on connection"), ErrorKind::Quota);
        // malformed > image ("decode" は両方にあるが先勝ち)
        assert_eq!(ErrorKind::from_message("failed to decode image"), ErrorKind::Malformed);
        assert_eq!(ErrorKind::from_message("invalid format"), ErrorKind::Malformed);
        // image > unavailable
        assert_eq!(ErrorKind::from_message("corrupt image service"), ErrorKind::ImageInvalid);
        assert_eq!(ErrorKind::from_message("model not found"), ErrorKind::ServiceUnavailable);
        assert_eq!(ErrorKind::from_message("HTTP 503"), ErrorKind::ServiceUnavailable);
        assert_eq!(ErrorKind::from_message("something odd"), ErrorKind::General);
        assert_eq!(ErrorKind::from_message(""), ErrorKind::General);
    }

    #[test]
    fn test_status_codes() {
        let expected = [
            (ErrorKind::Auth, 401),
            (ErrorKind::Quota, 429),
            (ErrorKind::Network, 503),
            (ErrorKind::ServiceUnavailable, 503),
            (ErrorKind::Validation, 400),
            (ErrorKind::ImageInvalid, 400),
            (ErrorKind::General, 500),
            (ErrorKind::Malformed, 500),
        ];
        for (kind, status) in expected {
            assert_eq!(kind.status_code(), status, "{kind}");
        }
    }

    #[test]
    fn test_fallback_plants_by_kind() {
        assert!(ErrorKind::Auth.fallback_result().plants.is_empty());
        assert!(ErrorKind::ImageInvalid.fallback_result().plants.is_empty());
        for kind in [
            ErrorKind::Quota,
            ErrorKind::Network,
            ErrorKind::Malformed,
            ErrorKind::ServiceUnavailable,
            ErrorKind::Validation,
            ErrorKind::General,
        ] {
            assert_eq!(kind.fallback_result().plants, fallback_plants(), "{kind}");
            assert!(!kind.fallback_result().description.is_empty());
        }
    }

    #[test]
    fn test_structured_code_wins_over_message() {
        let err = FakeError {
            message: "connection reset".to_string(),
            code: Some(ErrorKind::Quota),
        };
        let classified = ClassifiedError::classify(err);
        assert_eq!(classified.kind(), ErrorKind::Quota);
        assert_eq!(classified.message(), "connection reset");
        assert!(std::error::Error::source(&classified).is_some());
    }

    #[derive(Debug, Error)]
    #[error("Invalid location format")]
    struct BadLocation;

    impl Classify for BadLocation {
        fn error_kind(&self) -> Option<ErrorKind> {
            Some(ErrorKind::Validation)
        }

        fn fallback_description(&self) -> Option<&'static str> {
            Some("Invalid location format.")
        }
    }

    #[test]
    fn test_error_specific_fallback_description() {
        let classified = ClassifiedError::classify(BadLocation);
        assert_eq!(classified.fallback().description, "Invalid location format.");
        assert_eq!(classified.fallback().plants, fallback_plants());

        // 個別の説明が無ければ分類の既定文
        let err = FakeError {
            message: "bad".to_string(),
            code: Some(ErrorKind::Validation),
        };
        assert_eq!(
            ClassifiedError::classify(err).fallback().description,
            "Invalid request data."
        );
    }

    #[test]
    fn test_missing_code_falls_back_to_message() {
        let err = FakeError {
            message: "DNS lookup failed".to_string(),
            code: None,
        };
        assert_eq!(ClassifiedError::classify(err).kind(), ErrorKind::Network);
    }

    #[test]
    fn test_http_and_api_status_mapping() {
        assert_eq!(ErrorKind::from_http_status(403), Some(ErrorKind::Auth));
        assert_eq!(ErrorKind::from_http_status(429), Some(ErrorKind::Quota));
        assert_eq!(ErrorKind::from_http_status(503), Some(ErrorKind::ServiceUnavailable));
        assert_eq!(ErrorKind::from_http_status(400), None);
        assert_eq!(ErrorKind::from_api_status("RESOURCE_EXHAUSTED"), Some(ErrorKind::Quota));
        assert_eq!(ErrorKind::from_api_status("PERMISSION_DENIED"), Some(ErrorKind::Auth));
        assert_eq!(ErrorKind::from_api_status("INVALID_ARGUMENT"), None);
    }

    #[test]
    fn test_to_response_uses_canned_message() {
        let response = ClassifiedError::from_message("quota exceeded: project 123").to_response();
        assert_eq!(response.error.as_deref(), ErrorKind::Quota.user_message());
        assert_eq!(response.result.plants.len(), 3);
    }

    #[test]
    fn test_to_response_validation_echoes_message() {
        let err = ClassifiedError::new(ErrorKind::Validation, "Image and location data are required.");
        let response = err.to_response();
        assert_eq!(response.error.as_deref(), Some("Image and location data are required."));
        assert_eq!(response.result.description, "Invalid request data.");
    }
}

//! Gemini `generateContent` のワイヤ型
//!
//! リクエストは画像1枚 + テキストプロンプト。レスポンスは形が崩れていても
//! デシリアライズだけは通るよう、全フィールドを既定値付きで受ける。

use serde::{Deserialize, Serialize};

/// Gemini APIリクエスト
#[derive(Debug, Serialize)]
pub struct GeminiRequest {
    pub contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
pub struct Content {
    pub parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Serialize)]
pub struct GenerationConfig {
    pub temperature: f32,
    #[serde(rename = "responseMimeType")]
    pub response_mime_type: String,
}

impl GeminiRequest {
    /// プロンプトと画像1枚（Base64済み）からJSON応答を要求するリクエストを作る
    pub fn with_image(prompt: &str, mime_type: &str, image_base64: String) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![
                    Part::Text { text: prompt.to_string() },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: mime_type.to_string(),
                            data: image_base64,
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                temperature: 0.1,
                response_mime_type: "application/json".to_string(),
            },
        }
    }
}

/// Gemini APIレスポンス
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GeminiResponse {
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Candidate {
    pub content: Option<ResponseContent>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ResponseContent {
    pub parts: Vec<ResponsePart>,
}

/// 応答パート。画像パートなどは `text` を持たない。
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ResponsePart {
    pub text: Option<String>,
}

/// エラー応答 `{"error": {"code", "message", "status"}}`
#[derive(Debug, Deserialize)]
pub struct GeminiErrorResponse {
    pub error: GeminiApiError,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GeminiApiError {
    pub code: u16,
    pub message: String,
    /// `RESOURCE_EXHAUSTED` などのgRPCステータス名
    pub status: String,
}

/// Data URLからBase64データ部分を抽出
///
/// `data:` で始まらない文字列はそのまま返す。
/// `data:` で始まるのにカンマが無ければ `None`。
///
/// # Examples
/// ```
/// use plant_advisor_common::strip_data_url;
///
/// assert_eq!(strip_data_url("data:image/png;base64,iVBORw0KGgo="), Some("iVBORw0KGgo="));
/// assert_eq!(strip_data_url("iVBORw0KGgo="), Some("iVBORw0KGgo="));
/// assert_eq!(strip_data_url("data:image/png;base64"), None);
/// ```
pub fn strip_data_url(payload: &str) -> Option<&str> {
    if payload.starts_with("data:") {
        payload.split_once(',').map(|(_, data)| data)
    } else {
        Some(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gemini_request_serialize() {
        let request = GeminiRequest::with_image("prompt", "image/png", "QUJD".to_string());
        let json = serde_json::to_string(&request).expect("シリアライズ失敗");
        assert!(json.contains("\"contents\""));
        assert!(json.contains("\"generationConfig\""));
        assert!(json.contains("\"temperature\":0.1"));
        assert!(json.contains("\"responseMimeType\":\"application/json\""));
        assert!(json.contains(r#"{"text":"prompt"}"#));
        assert!(json.contains(r#""inline_data":{"mime_type":"image/png","data":"QUJD"}"#));
    }

    #[test]
    fn test_gemini_response_deserialize() {
        let json = r#"{
            "candidates": [{
                "content": {
                    "parts": [{"text": "{\"description\": \"sunny\"}"}]
                }
            }]
        }"#;
        let response: GeminiResponse = serde_json::from_str(json).expect("デシリアライズ失敗");
        assert_eq!(response.candidates.len(), 1);
        let parts = &response.candidates[0].content.as_ref().unwrap().parts;
        assert_eq!(parts[0].text.as_deref(), Some("{\"description\": \"sunny\"}"));
    }

    #[test]
    fn test_gemini_response_tolerates_missing_fields() {
        let response: GeminiResponse = serde_json::from_str(r#"{"promptFeedback": {}}"#).unwrap();
        assert!(response.candidates.is_empty());

        let response: GeminiResponse =
            serde_json::from_str(r#"{"candidates": [{"finishReason": "SAFETY"}]}"#).unwrap();
        assert!(response.candidates[0].content.is_none());

        let response: GeminiResponse =
            serde_json::from_str(r#"{"candidates": [{"content": {"parts": [{"inlineData": {}}]}}]}"#)
                .unwrap();
        assert!(response.candidates[0].content.as_ref().unwrap().parts[0].text.is_none());
    }

    #[test]
    fn test_gemini_error_response_deserialize() {
        let json = r#"{"error": {"code": 429, "message": "Resource has been exhausted", "status": "RESOURCE_EXHAUSTED"}}"#;
        let response: GeminiErrorResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.error.code, 429);
        assert_eq!(response.error.status, "RESOURCE_EXHAUSTED");
    }

    #[test]
    fn test_strip_data_url() {
        assert_eq!(strip_data_url("data:image/jpeg;base64,/9j/4AAQ"), Some("/9j/4AAQ"));
        assert_eq!(strip_data_url("/9j/4AAQ"), Some("/9j/4AAQ"));
        assert_eq!(strip_data_url("data:image/jpeg;base64"), None);
        assert_eq!(strip_data_url(""), Some(""));
    }
}

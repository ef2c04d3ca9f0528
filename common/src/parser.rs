//! APIレスポンスパーサー
//!
//! Gemini の生レスポンスから解析結果を組み立てる。段階ごとに失敗を吸収し、
//! 形の崩れた応答でも必ず説明と植物リストを持つ [`AnalysisResult`] を返す:
//!
//! 1. 候補とパートがあるか
//! 2. 最初のテキストパートが空でないか
//! 3. JSONとして読めるか（ダメなら ```json ブロック / `{...}` 抽出を1回だけ試す）
//! 4. オブジェクトか
//! 5. `description` / `plants` の欠落を既定値で補う

use crate::error::{Error, Result};
use crate::fallback::{
    fallback_plants, structural_fallback, unparsed_response_fallback, DESCRIPTION_MISSING,
};
use crate::gemini::GeminiResponse;
use crate::types::AnalysisResult;
use crate::validator::validate_plants;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;

/// 応答が構造的に使えなかった理由
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureIssue {
    /// 候補が無い、またはレスポンスがオブジェクトでない
    InvalidStructure,
    /// 候補にパートが無い
    EmptyContent,
    /// テキストパートが無い、または空白のみ
    EmptyText,
}

impl fmt::Display for StructureIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            StructureIssue::InvalidStructure => "Invalid response structure",
            StructureIssue::EmptyContent => "Empty response content",
            StructureIssue::EmptyText => "Empty response text",
        };
        f.write_str(reason)
    }
}

/// 生レスポンスから最初のテキストパートを取り出す
pub fn extract_response_text(raw: &Value) -> std::result::Result<String, StructureIssue> {
    let response =
        GeminiResponse::deserialize(raw).map_err(|_| StructureIssue::InvalidStructure)?;

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or(StructureIssue::InvalidStructure)?;

    let parts = candidate
        .content
        .map(|c| c.parts)
        .filter(|parts| !parts.is_empty())
        .ok_or(StructureIssue::EmptyContent)?;

    parts
        .into_iter()
        .find_map(|p| p.text)
        .filter(|text| !text.trim().is_empty())
        .ok_or(StructureIssue::EmptyText)
}

/// 生レスポンスを解析結果に変換する（失敗しない）
pub fn parse_response(raw: &Value) -> AnalysisResult {
    match extract_response_text(raw) {
        Ok(text) => parse_response_text(&text),
        Err(issue) => {
            tracing::warn!(reason = %issue, "unusable response structure, using fallback");
            structural_fallback()
        }
    }
}

/// 応答テキストを解析結果に変換する（失敗しない）
pub fn parse_response_text(text: &str) -> AnalysisResult {
    if text.trim().is_empty() {
        tracing::warn!(reason = %StructureIssue::EmptyText, "using fallback");
        return structural_fallback();
    }

    let Some(value) = parse_document(text) else {
        tracing::warn!("failed to parse response as JSON, using fallback");
        return unparsed_response_fallback(text);
    };

    let Value::Object(map) = value else {
        tracing::warn!("response is not a JSON object, using fallback");
        return structural_fallback();
    };

    let result = repair_document(map);
    tracing::info!(plants = result.plants.len(), "processed analysis response");
    result
}

/// 厳密パース → 抽出してもう一度、の順でJSONを読む
fn parse_document(text: &str) -> Option<Value> {
    serde_json::from_str::<Value>(text.trim())
        .or_else(|_| {
            let json_str = extract_json(text)?;
            serde_json::from_str::<Value>(json_str).map_err(Error::from)
        })
        .ok()
}

fn repair_document(mut map: Map<String, Value>) -> AnalysisResult {
    let description = match map.get("description").and_then(Value::as_str) {
        Some(s) if !s.trim().is_empty() => s.to_string(),
        _ => {
            tracing::warn!("missing description field, adding default");
            DESCRIPTION_MISSING.to_string()
        }
    };

    let plants = match map.remove("plants") {
        Some(Value::Array(records)) => validate_plants(&records),
        Some(_) => {
            tracing::warn!("plants field is not a list, using fallback");
            fallback_plants()
        }
        None => {
            tracing::warn!("missing plants field, adding fallback plants");
            fallback_plants()
        }
    };

    AnalysisResult::new(description, plants)
}

/// テキストからJSONオブジェクト部分を抽出
///
/// 抽出優先順位:
/// 1. ```json ... ``` ブロック
/// 2. 最初の `{` から最後の `}` まで
/// 3. エラー
///
/// # Examples
/// ```
/// use plant_advisor_common::extract_json;
///
/// let response = "Here you go: {\"description\": \"ok\"} thanks";
/// assert_eq!(extract_json(response).unwrap(), "{\"description\": \"ok\"}");
/// ```
pub fn extract_json(response: &str) -> Result<&str> {
    // ```json ... ``` ブロックを探す
    if let Some(start_marker) = response.find("```json") {
        let start = start_marker + 7; // "```json" の長さ
        if let Some(end_offset) = response[start..].find("```") {
            let end = start + end_offset;
            return Ok(response[start..end].trim());
        }
    }

    // 生の {...} を探す
    if let Some(start) = response.find('{') {
        if let Some(end) = response.rfind('}') {
            if end > start {
                return Ok(&response[start..=end]);
            }
        }
    }

    Err(Error::Parse("JSONが見つかりません".into()))
}

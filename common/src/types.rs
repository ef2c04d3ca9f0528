//! 解析結果の型定義
//!
//! サーバーとCLIで共有される型:
//! - LocationCoordinate: 撮影地点（緯度・経度・高度）
//! - PlantRecommendation: 推薦植物1件
//! - AnalysisResult: 場所の説明 + 推薦植物リスト
//! - AnalysisResponse: ワイヤ形式（AnalysisResult + 任意のerror）

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 1回の解析で返す推薦植物の最大数
pub const MAX_PLANTS: usize = 5;

/// 撮影地点の座標
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LocationCoordinate {
    pub latitude: f64,
    pub longitude: f64,
    /// 高度（省略時は0）
    #[serde(default)]
    pub altitude: f64,
}

impl LocationCoordinate {
    pub fn new(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self { latitude, longitude, altitude }
    }

    /// `[lat, lng, alt?]` 形式のJSON配列から座標を作る
    ///
    /// 要素は数値または数値文字列。2要素未満、または数値化できない要素があれば `None`。
    /// 4要素目以降は無視する。
    pub fn from_json(value: &Value) -> Option<Self> {
        let items = value.as_array()?;
        if items.len() < 2 {
            return None;
        }

        let mut components = items.iter().take(3).map(as_f64);
        let latitude = components.next()??;
        let longitude = components.next()??;
        let altitude = match components.next() {
            Some(alt) => alt?,
            None => 0.0,
        };

        Some(Self::new(latitude, longitude, altitude))
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

/// 推薦植物
///
/// フィールド名はフロントエンド互換のワイヤ形式に合わせる（`image`, `AR_model` など）。
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlantRecommendation {
    pub name: String,

    /// 参考画像URL
    #[serde(rename = "image", default)]
    pub reference_image_url: String,

    /// 元写真に植物を合成した画像（Base64、無ければ空文字）
    #[serde(default)]
    pub superimposed_image: String,

    pub description: String,

    pub care_instructions: String,

    pub care_tips: String,

    /// ARモデルURL
    #[serde(rename = "AR_model", default)]
    pub ar_model_url: String,

    /// 配置の確からしさ（0.0〜1.0）
    pub placement_confidence: f64,
}

/// 解析結果: 場所の説明と推薦植物（最大5件）
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub description: String,

    #[serde(default)]
    pub plants: Vec<PlantRecommendation>,
}

impl AnalysisResult {
    pub fn new(description: impl Into<String>, plants: Vec<PlantRecommendation>) -> Self {
        Self {
            description: description.into(),
            plants,
        }
    }

    /// 説明も植物も空の「何も返さない」状態か
    pub fn is_empty(&self) -> bool {
        self.description.trim().is_empty() && self.plants.is_empty()
    }
}

/// `/answer` のレスポンスボディ
///
/// 成功時は `error` を出力しない。失敗時も同じ形で、フォールバック内容に `error` を付ける。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    #[serde(flatten)]
    pub result: AnalysisResult,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalysisResponse {
    pub fn success(result: AnalysisResult) -> Self {
        Self { result, error: None }
    }

    pub fn failure(result: AnalysisResult, error: impl Into<String>) -> Self {
        Self {
            result,
            error: Some(error.into()),
        }
    }
}

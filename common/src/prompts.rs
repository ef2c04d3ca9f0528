//! プロンプト生成モジュール
//!
//! - PLANT_FIELDS: 植物レコードのフィールド名
//! - build_analysis_prompt: 場所の解析 + 植物推薦を1回で行うプロンプト

use crate::types::{LocationCoordinate, MAX_PLANTS};

/// 植物レコードのフィールド（ワイヤ形式の名前）
pub const PLANT_FIELDS: &[&str] = &[
    "name",
    "image",
    "superimposed_image",
    "description",
    "care_instructions",
    "care_tips",
    "AR_model",
    "placement_confidence",
];

/// 解析プロンプト生成
///
/// # Arguments
/// * `location` - 撮影地点
///
/// # Returns
/// 場所の解析と植物推薦（合成画像付き）を要求するプロンプト文字列
pub fn build_analysis_prompt(location: &LocationCoordinate) -> String {
    let LocationCoordinate { latitude, longitude, altitude } = *location;
    let fields = PLANT_FIELDS.join(", ");

    format!(
        r#"You are a plant growth expert. Analyze this image taken at coordinates [{latitude}, {longitude}, {altitude}].

## Task 1 - Location analysis
- Lighting conditions, space availability and shelter
- Soil quality and drainage if visible
- Climate based on the coordinates
- A short description of the place's suitability for plant growth

## Task 2 - Plant recommendations
- Suggest up to {MAX_PLANTS} plants suitable for this environment and climate zone
- For each plant, generate a base64 superimposed image showing it realistically placed in the original photo
- Each plant needs a unique placement position with realistic scale and lighting
- placement_confidence is a number from 0.0 to 1.0 for how well the plant fits

## Output (exactly this JSON object, no other text)
{{
  "description": "Short description of the place's suitability for plant growth",
  "plants": [
    {{
      "name": "Plant Name",
      "image": "https://example.com/plant-reference.jpg",
      "superimposed_image": "base64_encoded_superimposed_image",
      "description": "Why this plant suits this location (2-3 sentences)",
      "care_instructions": "Watering, sunlight and soil requirements",
      "care_tips": "Seasonal advice and common issues",
      "AR_model": "https://example.com/ar-model.glb",
      "placement_confidence": 0.85
    }}
  ]
}}

Every plant object must contain all of: {fields}"#
    )
}

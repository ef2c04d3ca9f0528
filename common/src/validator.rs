//! 推薦植物レコードの検証と修復
//!
//! 上流が返した植物レコードを1件ずつ確認し、欠けた・壊れたフィールドを既定値で埋める。
//! オブジェクトでないレコードだけは捨てる。生き残りが0件なら代替3件に差し替える。

use crate::fallback::{
    fallback_plants, DEFAULT_CARE_INSTRUCTIONS, DEFAULT_CARE_TIPS, DEFAULT_CONFIDENCE,
    DEFAULT_PLANT_DESCRIPTION, DEFAULT_PLANT_NAME,
};
use crate::types::{PlantRecommendation, MAX_PLANTS};
use serde_json::{Map, Value};

/// 植物レコードのリストを検証する
///
/// 結果は必ず1件以上 [`MAX_PLANTS`] 件以下。
pub fn validate_plants(records: &[Value]) -> Vec<PlantRecommendation> {
    let mut plants: Vec<PlantRecommendation> = records
        .iter()
        .enumerate()
        .filter_map(|(index, record)| {
            let plant = validate_plant(record);
            if plant.is_none() {
                tracing::warn!(index, "plant record is not an object, skipping");
            }
            plant
        })
        .collect();

    if plants.is_empty() {
        tracing::warn!("no plants passed validation, using fallback plants");
        return fallback_plants();
    }

    if plants.len() > MAX_PLANTS {
        tracing::warn!(count = plants.len(), "too many plants, keeping first {}", MAX_PLANTS);
        plants.truncate(MAX_PLANTS);
    }

    plants
}

/// 植物レコード1件を検証・修復する
///
/// オブジェクトでなければ `None`。
pub fn validate_plant(record: &Value) -> Option<PlantRecommendation> {
    let map = record.as_object()?;

    let name = required_string(map, "name", DEFAULT_PLANT_NAME);
    Some(PlantRecommendation {
        description: required_string(map, "description", DEFAULT_PLANT_DESCRIPTION),
        care_instructions: required_string(map, "care_instructions", DEFAULT_CARE_INSTRUCTIONS),
        care_tips: required_string(map, "care_tips", DEFAULT_CARE_TIPS),
        reference_image_url: optional_string(map, "image"),
        superimposed_image: optional_string(map, "superimposed_image"),
        ar_model_url: optional_string(map, "AR_model"),
        placement_confidence: coerce_confidence(map.get("placement_confidence"), &name),
        name,
    })
}

/// 信頼度を数値化し、[0, 1] の外・非数値・欠落なら既定値にする
pub fn coerce_confidence(value: Option<&Value>, plant_name: &str) -> f64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match parsed {
        Some(c) if (0.0..=1.0).contains(&c) => c,
        _ => {
            if value.is_some() {
                tracing::warn!(plant = plant_name, value = ?value, "invalid placement_confidence, using default");
            }
            DEFAULT_CONFIDENCE
        }
    }
}

fn required_string(map: &Map<String, Value>, key: &str, default: &str) -> String {
    match map.get(key).and_then(Value::as_str) {
        Some(s) if !s.trim().is_empty() => s.to_string(),
        _ => {
            tracing::warn!(field = key, "missing or invalid plant field, using default");
            default.to_string()
        }
    }
}

fn optional_string(map: &Map<String, Value>, key: &str) -> String {
    map.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_default()
}

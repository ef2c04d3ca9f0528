//! フォールバック内容
//!
//! 上流の出力が使えない時に差し替える固定の既定値。
//! 植物名・説明文・信頼度はクライアントが依存する外部契約なので変更しないこと。

use crate::types::{AnalysisResult, PlantRecommendation};

/// JSON解析に失敗し、本文から手がかりも得られなかった時の説明
pub const DESCRIPTION_PARSE_FAILED: &str = "Location analysis completed, but detailed parsing failed. The area appears suitable for plant growth based on available information.";

/// JSON解析に失敗したが、本文に植物関連の語があった時の説明
pub const DESCRIPTION_PARTIAL_DETAILS: &str = "Location analysis completed with some details available. Basic plant recommendations provided.";

/// `description` が欠けていた時の説明
pub const DESCRIPTION_MISSING: &str = "Location analysis completed with limited details available.";

/// 解析不能なテキストから「部分的な情報あり」と判断するキーワード
pub const PARTIAL_DETAIL_KEYWORDS: &[&str] = &["plant", "grow", "suitable", "recommend"];

pub const DEFAULT_PLANT_NAME: &str = "Unknown Plant";
pub const DEFAULT_PLANT_DESCRIPTION: &str = "Plant information not available.";
pub const DEFAULT_CARE_INSTRUCTIONS: &str = "Follow general plant care guidelines.";
pub const DEFAULT_CARE_TIPS: &str = "Monitor plant health and adjust care as needed.";

/// 範囲外・非数値の信頼度を置き換える値
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// 固定の代替植物3件（Spider Plant / Pothos / Snake Plant の順）
pub fn fallback_plants() -> Vec<PlantRecommendation> {
    vec![
        fallback_plant(
            "Spider Plant",
            "Hardy indoor plant that adapts well to various lighting conditions and is easy to care for.",
            "Water when soil feels dry, prefers bright indirect light, well-draining soil.",
            "Remove brown tips, propagate plantlets for new plants, rotate occasionally for even growth.",
            0.7,
        ),
        fallback_plant(
            "Pothos",
            "Versatile trailing plant that thrives in low to medium light and is very forgiving.",
            "Water when top inch of soil is dry, tolerates low light, standard potting mix.",
            "Trim to encourage bushier growth, can grow in water or soil, wipe leaves occasionally.",
            0.8,
        ),
        fallback_plant(
            "Snake Plant",
            "Low-maintenance succulent that tolerates neglect and various lighting conditions.",
            "Water sparingly, allow soil to dry completely between waterings, tolerates low light.",
            "Avoid overwatering, clean leaves with damp cloth, divide to propagate new plants.",
            0.6,
        ),
    ]
}

fn fallback_plant(
    name: &str,
    description: &str,
    care_instructions: &str,
    care_tips: &str,
    placement_confidence: f64,
) -> PlantRecommendation {
    PlantRecommendation {
        name: name.to_string(),
        description: description.to_string(),
        care_instructions: care_instructions.to_string(),
        care_tips: care_tips.to_string(),
        placement_confidence,
        ..Default::default()
    }
}

/// 解析できなかった応答テキストから代替結果を作る
///
/// テキストにキーワードが含まれていれば少し具体的な説明を選ぶ。植物は常に代替3件。
pub fn unparsed_response_fallback(response_text: &str) -> AnalysisResult {
    let lower = response_text.to_lowercase();
    let description = if PARTIAL_DETAIL_KEYWORDS.iter().any(|k| lower.contains(k)) {
        DESCRIPTION_PARTIAL_DETAILS
    } else {
        DESCRIPTION_PARSE_FAILED
    };

    AnalysisResult::new(description, fallback_plants())
}

/// 応答構造そのものが使えない時の代替結果
pub fn structural_fallback() -> AnalysisResult {
    AnalysisResult::new(DESCRIPTION_PARSE_FAILED, fallback_plants())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_plants_contract() {
        let plants = fallback_plants();
        let summary: Vec<(&str, f64)> = plants
            .iter()
            .map(|p| (p.name.as_str(), p.placement_confidence))
            .collect();
        assert_eq!(
            summary,
            vec![("Spider Plant", 0.7), ("Pothos", 0.8), ("Snake Plant", 0.6)]
        );
    }

    #[test]
    fn test_fallback_plants_fields_populated() {
        for plant in fallback_plants() {
            assert!(!plant.description.is_empty());
            assert!(!plant.care_instructions.is_empty());
            assert!(!plant.care_tips.is_empty());
            assert_eq!(plant.reference_image_url, "");
            assert_eq!(plant.superimposed_image, "");
            assert_eq!(plant.ar_model_url, "");
            assert!((0.0..=1.0).contains(&plant.placement_confidence));
        }
    }

    #[test]
    fn test_unparsed_fallback_keyword_selects_partial() {
        let result = unparsed_response_fallback("I would RECOMMEND a fern here");
        assert_eq!(result.description, DESCRIPTION_PARTIAL_DETAILS);
        assert_eq!(result.plants, fallback_plants());
    }

    #[test]
    fn test_unparsed_fallback_generic() {
        let result = unparsed_response_fallback("lorem ipsum");
        assert_eq!(result.description, DESCRIPTION_PARSE_FAILED);
        assert_eq!(result.plants.len(), 3);
    }

    #[test]
    fn test_unparsed_fallback_empty_text() {
        let result = unparsed_response_fallback("");
        assert_eq!(result.description, DESCRIPTION_PARSE_FAILED);
    }
}

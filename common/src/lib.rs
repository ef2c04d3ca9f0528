//! Plant Advisor Common Library
//!
//! サーバーとCLIで共有される、I/Oを持たない処理:
//! 型定義、Geminiワイヤ型、応答の解析・修復、代替内容、エラー分類

pub mod classifier;
pub mod error;
pub mod fallback;
pub mod gemini;
pub mod parser;
pub mod prompts;
pub mod types;
pub mod validator;

pub use classifier::{Classify, ClassifiedError, ErrorKind};
pub use error::{Error, Result};
pub use fallback::fallback_plants;
pub use gemini::{strip_data_url, GeminiErrorResponse, GeminiRequest, GeminiResponse};
pub use parser::{extract_json, extract_response_text, parse_response, parse_response_text};
pub use prompts::build_analysis_prompt;
pub use types::{AnalysisResponse, AnalysisResult, LocationCoordinate, PlantRecommendation, MAX_PLANTS};
pub use validator::{validate_plant, validate_plants};

use crate::image::ImageError;
use crate::invoker::InvokeError;
use crate::pipeline::RequestIssue;
use plant_advisor_common::{Classify, ErrorKind};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlantAiError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("APIキーが設定されていません。`plant-advisor config --set-api-key YOUR_KEY` か環境変数 GEMINI_API_KEY で設定してください")]
    MissingApiKey,

    /// 入力検証の理由はそのまま利用者に返すので接頭辞を付けない
    #[error(transparent)]
    Validation(#[from] RequestIssue),

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error(transparent)]
    Invoke(#[from] InvokeError),

    #[error("解析が中断されました")]
    Cancelled,

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error(transparent)]
    Common(#[from] plant_advisor_common::Error),
}

impl Classify for PlantAiError {
    fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            PlantAiError::Config(_) | PlantAiError::MissingApiKey => Some(ErrorKind::ServiceUnavailable),
            PlantAiError::Validation(_) => Some(ErrorKind::Validation),
            PlantAiError::Image(e) => e.error_kind(),
            PlantAiError::Invoke(e) => e.error_kind(),
            PlantAiError::Cancelled => Some(ErrorKind::General),
            PlantAiError::Io(_) => None,
            PlantAiError::JsonParse(_) => Some(ErrorKind::Malformed),
            PlantAiError::Common(e) => match e {
                plant_advisor_common::Error::Config(_) => Some(ErrorKind::ServiceUnavailable),
                plant_advisor_common::Error::Json(_) | plant_advisor_common::Error::Parse(_) => {
                    Some(ErrorKind::Malformed)
                }
            },
        }
    }

    fn fallback_description(&self) -> Option<&'static str> {
        match self {
            PlantAiError::Validation(issue) => Some(issue.description()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, PlantAiError>;

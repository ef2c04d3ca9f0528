//! 解析パイプライン
//!
//! 画像前処理 → モデル呼び出し → 応答解析・修復 の順に1回だけ流す。
//! どの段で失敗しても [`ClassifiedError`] に落とし、代替内容付きで返す。

use crate::error::PlantAiError;
use crate::image::{prepare_image, ImageError};
use crate::invoker::{InvokeError, ModelInvoker};
use plant_advisor_common::fallback::structural_fallback;
use plant_advisor_common::{
    build_analysis_prompt, parse_response, AnalysisResponse, AnalysisResult, ClassifiedError,
    ErrorKind, LocationCoordinate,
};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// リクエスト本文の不備
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestIssue {
    #[error("No data provided in request.")]
    NoData,

    #[error("Image and location data are required.")]
    MissingFields,

    #[error("Location must be a list with at least latitude and longitude.")]
    InvalidLocation,
}

impl RequestIssue {
    /// 代替結果の説明文
    pub fn description(self) -> &'static str {
        match self {
            RequestIssue::NoData => "Invalid request data.",
            RequestIssue::MissingFields => "Missing required fields.",
            RequestIssue::InvalidLocation => "Invalid location format.",
        }
    }
}

/// 検証済みの解析リクエスト
#[derive(Debug, Clone)]
pub struct AnalyzeRequest {
    /// Base64画像（Data URL可）
    pub image: String,
    pub location: LocationCoordinate,
}

impl AnalyzeRequest {
    pub fn new(image: impl Into<String>, location: LocationCoordinate) -> Self {
        Self {
            image: image.into(),
            location,
        }
    }

    /// リクエスト本文（JSONバイト列）から作る
    pub fn from_slice(body: &[u8]) -> Result<Self, PlantAiError> {
        let value: Value = serde_json::from_slice(body).map_err(|_| RequestIssue::NoData)?;
        Self::from_json(&value)
    }

    /// `{"image": ..., "location": [lat, lng, alt?]}` を検証する
    ///
    /// キーが無い・null の時だけ未指定扱い。空文字の画像は画像エラー、
    /// 短い・空の座標配列は座標形式エラーになる。
    pub fn from_json(value: &Value) -> Result<Self, PlantAiError> {
        let object = value
            .as_object()
            .filter(|object| !object.is_empty())
            .ok_or(RequestIssue::NoData)?;

        let image = object.get("image").filter(|v| !v.is_null());
        let location = object.get("location").filter(|v| !v.is_null());
        let (Some(image), Some(location)) = (image, location) else {
            return Err(RequestIssue::MissingFields.into());
        };

        let location = LocationCoordinate::from_json(location).ok_or(RequestIssue::InvalidLocation)?;
        let image = image.as_str().ok_or(ImageError::NotText)?;

        Ok(Self::new(image, location))
    }
}

fn classify(error: impl Into<PlantAiError>) -> ClassifiedError {
    let classified = ClassifiedError::classify(error.into());
    let (kind, status) = (classified.kind(), classified.status_code());
    match kind {
        // 利用者側の入力の問題
        ErrorKind::Validation | ErrorKind::ImageInvalid => {
            tracing::warn!(%kind, status, "{}", classified.message())
        }
        _ => tracing::error!(%kind, status, "{}", classified.message()),
    }
    classified
}

#[derive(Debug, Clone)]
pub struct Analyzer {
    invoker: Arc<dyn ModelInvoker>,
    timeout: Duration,
}

impl Analyzer {
    pub fn new(invoker: Arc<dyn ModelInvoker>, timeout: Duration) -> Self {
        Self { invoker, timeout }
    }

    pub fn model_name(&self) -> &str {
        self.invoker.model_name()
    }

    /// 1件解析する
    ///
    /// 応答の形が崩れていても代替内容で成功扱いにする。
    /// 失敗になるのは入力画像・上流呼び出しの問題だけ。
    pub async fn analyze(&self, request: &AnalyzeRequest) -> Result<AnalysisResult, ClassifiedError> {
        // 展開はCPUを使うので非同期ワーカーの外で行う
        let payload = request.image.clone();
        let image = match tokio::task::spawn_blocking(move || prepare_image(&payload)).await {
            Ok(prepared) => prepared,
            Err(e) => Err(ImageError::Corrupt(e.to_string())),
        }
        .map_err(classify)?;
        let prompt = build_analysis_prompt(&request.location);

        tracing::info!(
            latitude = request.location.latitude,
            longitude = request.location.longitude,
            width = image.width,
            height = image.height,
            model = self.invoker.model_name(),
            "解析開始"
        );

        let raw = match tokio::time::timeout(self.timeout, self.invoker.generate(&prompt, &image)).await {
            Ok(result) => result,
            Err(_) => Err(InvokeError::Timeout(self.timeout)),
        };

        let raw = match raw {
            Ok(raw) => raw,
            Err(InvokeError::Decode(reason)) => {
                // 本文がJSONでない応答も形の崩れとして吸収する
                tracing::warn!(%reason, "応答本文を解析できないため代替結果を使用");
                return Ok(structural_fallback());
            }
            Err(e) => return Err(classify(e)),
        };

        let result = parse_response(&raw);
        tracing::info!(plants = result.plants.len(), "解析完了");
        Ok(result)
    }

    /// `cancel` が先に完了したら中断する
    ///
    /// 中断時は実行中の上流リクエストも破棄される。
    pub async fn analyze_until<F>(
        &self,
        request: &AnalyzeRequest,
        cancel: F,
    ) -> Result<AnalysisResult, ClassifiedError>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            result = self.analyze(request) => result,
            _ = cancel => {
                tracing::warn!("解析を中断");
                Err(classify(PlantAiError::Cancelled))
            }
        }
    }

    /// リクエスト本文を検証して解析し、HTTPステータスとレスポンスを返す
    pub async fn respond(&self, body: &[u8]) -> (u16, AnalysisResponse) {
        let outcome = match AnalyzeRequest::from_slice(body) {
            Ok(request) => self.analyze(&request).await,
            Err(e) => Err(classify(e)),
        };

        match outcome {
            Ok(result) => (200, AnalysisResponse::success(result)),
            Err(e) => (e.status_code(), e.to_response()),
        }
    }
}

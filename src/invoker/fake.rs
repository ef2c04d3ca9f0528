//! ネットワークを使わない呼び出し口
//!
//! テストと `provider: "fake"` 設定での動作確認に使う。

use super::{InvokeError, ModelInvoker};
use crate::image::PreparedImage;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone)]
enum Outcome {
    Response(Value),
    Failure(InvokeError),
    /// 応答を返さない（タイムアウト・中断の確認用）
    Hang,
}

/// 決まった応答を返す呼び出し口
#[derive(Debug)]
pub struct FakeInvoker {
    outcome: Outcome,
    calls: AtomicUsize,
    last_prompt: Mutex<Option<String>>,
}

impl Default for FakeInvoker {
    fn default() -> Self {
        Self::with_text("{}")
    }
}

impl FakeInvoker {
    fn with_outcome(outcome: Outcome) -> Self {
        Self {
            outcome,
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
        }
    }

    /// 1候補・1テキストパートの応答を返す
    pub fn with_text(text: &str) -> Self {
        Self::with_raw(json!({
            "candidates": [{
                "content": {"parts": [{"text": text}]}
            }]
        }))
    }

    /// 応答JSONをそのまま返す
    pub fn with_raw(raw: Value) -> Self {
        Self::with_outcome(Outcome::Response(raw))
    }

    pub fn failing(error: InvokeError) -> Self {
        Self::with_outcome(Outcome::Failure(error))
    }

    pub fn hanging() -> Self {
        Self::with_outcome(Outcome::Hang)
    }

    /// `generate` が呼ばれた回数
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().ok().and_then(|prompt| prompt.clone())
    }
}

#[async_trait]
impl ModelInvoker for FakeInvoker {
    async fn generate(&self, prompt: &str, _image: &PreparedImage) -> Result<Value, InvokeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_prompt.lock() {
            *last = Some(prompt.to_string());
        }

        match &self.outcome {
            Outcome::Response(raw) => Ok(raw.clone()),
            Outcome::Failure(error) => Err(error.clone()),
            Outcome::Hang => std::future::pending().await,
        }
    }

    fn model_name(&self) -> &str {
        "fake"
    }
}

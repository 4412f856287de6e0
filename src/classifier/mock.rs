//! 脚本化分类器（用于测试，无需 NLU 服务）
//!
//! 按输入文本精确查表返回预设意图；未登记的文本返回空结果。
//! 记录调用次数，便于断言“是否重新分类”。

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::traits::{IntentClassifier, RecognizerResult};
use crate::core::ClassifierError;
use crate::dialog::TurnContext;

#[derive(Debug, Default)]
pub struct ScriptedClassifier {
    script: HashMap<String, RecognizerResult>,
    calls: AtomicUsize,
    inputs: std::sync::Mutex<Vec<String>>,
    fail: bool,
}

impl ScriptedClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// 每次调用都失败，模拟分类服务中断
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    /// 登记：文本 `text` 分类为 `label`，分数 `score`
    pub fn on(mut self, text: &str, label: &str, score: f64) -> Self {
        let entry = self
            .script
            .remove(text)
            .unwrap_or_else(|| RecognizerResult::new(text));
        self.script.insert(text.to_string(), entry.with_intent(label, score));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 按调用顺序记录的输入文本
    pub fn inputs(&self) -> Vec<String> {
        self.inputs
            .lock()
            .map(|inputs| inputs.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl IntentClassifier for ScriptedClassifier {
    async fn classify(&self, _ctx: &TurnContext, text: &str) -> Result<RecognizerResult, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut inputs) = self.inputs.lock() {
            inputs.push(text.to_string());
        }
        if self.fail {
            return Err(ClassifierError::Unavailable("scripted outage".to_string()));
        }
        Ok(self
            .script
            .get(text)
            .cloned()
            .unwrap_or_else(|| RecognizerResult::new(text)))
    }
}

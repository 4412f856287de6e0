//! 意图分类器抽象
//!
//! 所有实现（关键词规则 / LUIS HTTP / 脚本化 Mock）返回带分数的意图集合；
//! 由 `top_intent` 按最低分阈值归约为单一标签。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::ClassifierError;
use crate::dialog::TurnContext;

/// 一个意图及其置信度
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentScore {
    pub label: String,
    pub score: f64,
}

/// 识别出的实体（如节目名）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub kind: String,
    pub text: String,
    #[serde(default)]
    pub score: Option<f64>,
}

/// 一次分类的完整结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecognizerResult {
    pub text: String,
    #[serde(default)]
    pub intents: Vec<IntentScore>,
    #[serde(default)]
    pub entities: Vec<Entity>,
}

impl RecognizerResult {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_intent(mut self, label: impl Into<String>, score: f64) -> Self {
        self.intents.push(IntentScore {
            label: label.into(),
            score,
        });
        self
    }

    pub fn with_entity(mut self, kind: impl Into<String>, text: impl Into<String>) -> Self {
        self.entities.push(Entity {
            kind: kind.into(),
            text: text.into(),
            score: None,
        });
        self
    }

    /// 最高分意图；集合为空或最高分低于 `min_score` 时返回 `default_label`。
    /// 分数相同时取先出现者。
    pub fn top_intent(&self, default_label: &str, min_score: f64) -> String {
        let mut best: Option<&IntentScore> = None;
        for intent in &self.intents {
            if intent.score.is_nan() {
                continue;
            }
            if best.map_or(true, |b| intent.score > b.score) {
                best = Some(intent);
            }
        }
        match best {
            Some(intent) if intent.score >= min_score => intent.label.clone(),
            _ => default_label.to_string(),
        }
    }

    pub fn score(&self, label: &str) -> Option<f64> {
        self.intents.iter().find(|i| i.label == label).map(|i| i.score)
    }

    /// 第一个指定类型的实体文本
    pub fn entity(&self, kind: &str) -> Option<&str> {
        self.entities
            .iter()
            .find(|e| e.kind == kind)
            .map(|e| e.text.as_str())
    }
}

/// 意图分类器：调用失败必须返回 Err，不能伪装成“无意图”
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, ctx: &TurnContext, text: &str) -> Result<RecognizerResult, ClassifierError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_intent_above_floor() {
        let result = RecognizerResult::new("hi")
            .with_intent("Greeting", 0.3)
            .with_intent("Foo", 0.9);
        assert_eq!(result.top_intent("None", 0.5), "Foo");
    }

    #[test]
    fn test_top_intent_below_floor_is_default() {
        let result = RecognizerResult::new("hmm").with_intent("Foo", 0.49);
        assert_eq!(result.top_intent("None", 0.5), "None");
    }

    #[test]
    fn test_top_intent_at_floor_counts() {
        let result = RecognizerResult::new("hmm").with_intent("Foo", 0.5);
        assert_eq!(result.top_intent("None", 0.5), "Foo");
    }

    #[test]
    fn test_top_intent_empty_is_default() {
        assert_eq!(RecognizerResult::new("").top_intent("None", 0.5), "None");
    }

    #[test]
    fn test_top_intent_tie_keeps_first() {
        let result = RecognizerResult::new("x")
            .with_intent("A", 0.8)
            .with_intent("B", 0.8);
        assert_eq!(result.top_intent("None", 0.5), "A");
    }

    #[test]
    fn test_entity_lookup() {
        let result = RecognizerResult::new("search dark").with_entity("Show", "dark");
        assert_eq!(result.entity("Show"), Some("dark"));
        assert_eq!(result.entity("Episode"), None);
    }
}

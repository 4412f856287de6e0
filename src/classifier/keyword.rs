//! 关键词规则分类器
//!
//! 按注册顺序用正则匹配输入，每条命中的规则贡献一个固定分数的意图；
//! 命名捕获组（如 `(?P<Show>.+)`）作为实体返回。无需任何外部服务。

use async_trait::async_trait;
use regex::Regex;

use super::traits::{Entity, IntentClassifier, RecognizerResult};
use crate::config::ClassifierRuleSection;
use crate::core::ClassifierError;
use crate::dialog::TurnContext;

/// 一条规则：任一正则命中即认为是该意图
#[derive(Debug, Clone)]
pub struct KeywordRule {
    pub label: String,
    pub patterns: Vec<Regex>,
    pub score: f64,
}

impl KeywordRule {
    pub fn new(label: impl Into<String>, patterns: &[&str], score: f64) -> Result<Self, ClassifierError> {
        let patterns = patterns
            .iter()
            .map(|p| compile(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            label: label.into(),
            patterns,
            score,
        })
    }
}

fn compile(pattern: &str) -> Result<Regex, ClassifierError> {
    Regex::new(pattern)
        .map_err(|e| ClassifierError::NotConfigured(format!("invalid pattern '{pattern}': {e}")))
}

/// 基于正则规则的分类器
#[derive(Debug, Clone, Default)]
pub struct KeywordClassifier {
    rules: Vec<KeywordRule>,
}

impl KeywordClassifier {
    pub fn new(rules: Vec<KeywordRule>) -> Self {
        Self { rules }
    }

    /// 从 [[classifier.rules]] 配置构建
    pub fn from_config(rules: &[ClassifierRuleSection]) -> Result<Self, ClassifierError> {
        let rules = rules
            .iter()
            .map(|r| {
                let patterns: Vec<&str> = r.patterns.iter().map(String::as_str).collect();
                KeywordRule::new(r.label.clone(), &patterns, r.score)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(rules))
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// 同步匹配（不依赖回合上下文）
    pub fn recognize(&self, text: &str) -> RecognizerResult {
        let mut result = RecognizerResult::new(text);
        let input = text.trim();
        if input.is_empty() {
            return result;
        }

        for rule in &self.rules {
            let Some((pattern, captures)) = rule
                .patterns
                .iter()
                .find_map(|p| p.captures(input).map(|c| (p, c)))
            else {
                continue;
            };
            if result.score(&rule.label).is_none() {
                result = result.with_intent(rule.label.clone(), rule.score);
            }
            for name in pattern.capture_names().flatten() {
                let Some(m) = captures.name(name) else { continue };
                let value = m.as_str().trim();
                if !value.is_empty() {
                    result.entities.push(Entity {
                        kind: name.to_string(),
                        text: value.to_string(),
                        score: Some(rule.score),
                    });
                }
            }
        }

        result
            .intents
            .sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        result
    }
}

#[async_trait]
impl IntentClassifier for KeywordClassifier {
    async fn classify(&self, _ctx: &TurnContext, text: &str) -> Result<RecognizerResult, ClassifierError> {
        let result = self.recognize(text);
        tracing::debug!(
            "Keyword classifier: '{}' -> {:?}",
            text,
            result.intents.iter().map(|i| i.label.as_str()).collect::<Vec<_>>()
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> KeywordClassifier {
        KeywordClassifier::new(vec![
            KeywordRule::new("Greeting", &[r"(?i)^(hi|hello)\b"], 0.9).unwrap(),
            KeywordRule::new("Search", &[r"(?i)^search\s+(?P<Show>.+)$"], 0.8).unwrap(),
            KeywordRule::new("Weak", &[r"(?i)maybe"], 0.3).unwrap(),
        ])
    }

    #[test]
    fn test_match_greeting() {
        let result = classifier().recognize("Hello there");
        assert_eq!(result.top_intent("None", 0.5), "Greeting");
    }

    #[test]
    fn test_named_group_becomes_entity() {
        let result = classifier().recognize("search Breaking Bad");
        assert_eq!(result.top_intent("None", 0.5), "Search");
        assert_eq!(result.entity("Show"), Some("Breaking Bad"));
    }

    #[test]
    fn test_low_score_falls_below_floor() {
        let result = classifier().recognize("maybe later");
        assert_eq!(result.intents.len(), 1);
        assert_eq!(result.top_intent("None", 0.5), "None");
    }

    #[test]
    fn test_blank_input_is_empty() {
        let result = classifier().recognize("   ");
        assert!(result.intents.is_empty());
    }

    #[test]
    fn test_intents_sorted_by_score() {
        let result = classifier().recognize("hi maybe");
        assert_eq!(result.intents[0].label, "Greeting");
        assert_eq!(result.intents[1].label, "Weak");
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let err = KeywordRule::new("Bad", &["("], 0.9).unwrap_err();
        assert!(matches!(err, ClassifierError::NotConfigured(_)));
    }
}

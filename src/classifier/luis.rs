//! LUIS 风格的 HTTP 意图分类器
//!
//! GET `{endpoint}/luis/v2.0/apps/{app_id}?q=<text>&verbose=true`，
//! 订阅密钥放在 `Ocp-Apim-Subscription-Key` 头中。
//! 网络错误、非 2xx 状态、响应解析失败均作为 ClassifierError 返回。

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::traits::{Entity, IntentClassifier, IntentScore, RecognizerResult};
use crate::config::ClassifierSection;
use crate::core::ClassifierError;
use crate::dialog::TurnContext;

const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// 远程意图分类器
pub struct LuisClassifier {
    client: reqwest::Client,
    endpoint: String,
    app_id: String,
    subscription_key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LuisResponse {
    #[serde(default)]
    query: String,
    top_scoring_intent: Option<LuisIntent>,
    #[serde(default)]
    intents: Vec<LuisIntent>,
    #[serde(default)]
    entities: Vec<LuisEntity>,
}

#[derive(Debug, Deserialize)]
struct LuisIntent {
    intent: String,
    score: f64,
}

#[derive(Debug, Deserialize)]
struct LuisEntity {
    entity: String,
    #[serde(rename = "type")]
    kind: String,
    score: Option<f64>,
}

impl LuisClassifier {
    pub fn new(
        endpoint: impl Into<String>,
        app_id: impl Into<String>,
        subscription_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ClassifierError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            app_id: app_id.into(),
            subscription_key: subscription_key.into(),
        })
    }

    /// 从 [classifier] 配置构建；缺少 endpoint / app_id / key 时报错
    pub fn from_config(section: &ClassifierSection) -> Result<Self, ClassifierError> {
        let require = |value: &Option<String>, name: &str| {
            value
                .clone()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ClassifierError::NotConfigured(format!("classifier.{name} is required for luis")))
        };
        Self::new(
            require(&section.endpoint, "endpoint")?,
            require(&section.app_id, "app_id")?,
            require(&section.subscription_key, "subscription_key")?,
            Duration::from_secs(section.timeout_secs),
        )
    }

    fn url(&self) -> String {
        format!("{}/luis/v2.0/apps/{}", self.endpoint, self.app_id)
    }
}

/// 把 LUIS JSON 响应转换为 RecognizerResult
fn parse_response(text: &str, body: &str) -> Result<RecognizerResult, ClassifierError> {
    let response: LuisResponse =
        serde_json::from_str(body).map_err(|e| ClassifierError::Parse(e.to_string()))?;

    let mut intents: Vec<IntentScore> = response
        .intents
        .into_iter()
        .map(|i| IntentScore {
            label: i.intent,
            score: i.score,
        })
        .collect();
    // 非 verbose 响应只有 topScoringIntent
    if intents.is_empty() {
        if let Some(top) = response.top_scoring_intent {
            intents.push(IntentScore {
                label: top.intent,
                score: top.score,
            });
        }
    }

    Ok(RecognizerResult {
        text: if response.query.is_empty() {
            text.to_string()
        } else {
            response.query
        },
        intents,
        entities: response
            .entities
            .into_iter()
            .map(|e| Entity {
                kind: e.kind,
                text: e.entity,
                score: e.score,
            })
            .collect(),
    })
}

#[async_trait]
impl IntentClassifier for LuisClassifier {
    async fn classify(&self, _ctx: &TurnContext, text: &str) -> Result<RecognizerResult, ClassifierError> {
        if text.trim().is_empty() {
            return Ok(RecognizerResult::new(text));
        }

        let response = self
            .client
            .get(self.url())
            .header(SUBSCRIPTION_KEY_HEADER, &self.subscription_key)
            .query(&[("q", text), ("verbose", "true")])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            tracing::warn!("LUIS returned {} for '{}'", status, text);
            return Err(ClassifierError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let result = parse_response(text, &body)?;
        tracing::debug!("LUIS: '{}' -> {:?}", text, result.intents.first());
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_verbose_response() {
        let body = r#"{
            "query": "search breaking bad",
            "topScoringIntent": { "intent": "Shows_Search", "score": 0.97 },
            "intents": [
                { "intent": "Shows_Search", "score": 0.97 },
                { "intent": "None", "score": 0.02 }
            ],
            "entities": [
                { "entity": "breaking bad", "type": "Show", "startIndex": 7, "endIndex": 18, "score": 0.91 }
            ]
        }"#;

        let result = parse_response("search breaking bad", body).unwrap();
        assert_eq!(result.top_intent("None", 0.5), "Shows_Search");
        assert_eq!(result.intents.len(), 2);
        assert_eq!(result.entity("Show"), Some("breaking bad"));
    }

    #[test]
    fn test_parse_top_scoring_only() {
        let body = r#"{ "query": "hi", "topScoringIntent": { "intent": "Education_Hi", "score": 0.8 } }"#;
        let result = parse_response("hi", body).unwrap();
        assert_eq!(result.top_intent("None", 0.5), "Education_Hi");
    }

    #[test]
    fn test_parse_garbage_is_error() {
        let err = parse_response("hi", "<html>").unwrap_err();
        assert!(matches!(err, ClassifierError::Parse(_)));
    }

    #[test]
    fn test_from_config_requires_endpoint() {
        let section = ClassifierSection {
            provider: "luis".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            LuisClassifier::from_config(&section),
            Err(ClassifierError::NotConfigured(_))
        ));
    }
}

//! 回合上下文
//!
//! 每个入站活动对应一个 TurnContext：携带入站活动、收集待发送的回复、提供回合级临时存储。
//! 可廉价 clone（内部 Arc），便于交给每个步骤使用。

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::Mutex;

use super::activity::Activity;

struct TurnInner {
    activity: Activity,
    responses: Mutex<Vec<Activity>>,
    turn_state: Mutex<Map<String, Value>>,
}

/// 当前回合的上下文
#[derive(Clone)]
pub struct TurnContext {
    inner: Arc<TurnInner>,
}

impl TurnContext {
    pub fn new(activity: Activity) -> Self {
        Self {
            inner: Arc::new(TurnInner {
                activity,
                responses: Mutex::new(Vec::new()),
                turn_state: Mutex::new(Map::new()),
            }),
        }
    }

    /// 入站活动
    pub fn activity(&self) -> &Activity {
        &self.inner.activity
    }

    /// 入站消息文本，非消息或无文本时为空串
    pub fn text(&self) -> &str {
        self.inner.activity.text()
    }

    /// 入站文本作为触发值：原样保留（包括空白），没有文本时为 Null
    pub fn text_value(&self) -> Value {
        match self.inner.activity.text.as_deref() {
            Some(text) => Value::String(text.to_string()),
            None => Value::Null,
        }
    }

    /// 排队一条文本回复
    pub async fn send_text(&self, text: impl Into<String>) {
        let reply = self.inner.activity.reply(text);
        self.send_activity(reply).await;
    }

    /// 排队一条带快捷回复按钮的文本
    pub async fn send_suggested(&self, text: impl Into<String>, actions: &[&str]) {
        let mut reply = self.inner.activity.reply(text);
        reply.suggested_actions = actions.iter().map(|a| a.to_string()).collect();
        self.send_activity(reply).await;
    }

    pub async fn send_activity(&self, activity: Activity) {
        self.inner.responses.lock().await.push(activity);
    }

    /// 本回合是否已经发送过回复
    pub async fn responded(&self) -> bool {
        !self.inner.responses.lock().await.is_empty()
    }

    /// 取出本回合排队的全部回复
    pub async fn take_responses(&self) -> Vec<Activity> {
        std::mem::take(&mut *self.inner.responses.lock().await)
    }

    /// 回合级临时存储：回合结束即丢弃
    pub async fn set_turn_value(&self, key: impl Into<String>, value: Value) {
        self.inner.turn_state.lock().await.insert(key.into(), value);
    }

    pub async fn turn_value(&self, key: &str) -> Option<Value> {
        self.inner.turn_state.lock().await.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_responses_are_queued_and_drained() {
        let ctx = TurnContext::new(Activity::message("c1", "alice", "hi"));
        assert!(!ctx.responded().await);

        ctx.send_text("hello").await;
        ctx.send_suggested("pick one", &["Yes", "No"]).await;
        assert!(ctx.responded().await);

        let responses = ctx.take_responses().await;
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[1].suggested_actions, vec!["Yes", "No"]);
        assert!(!ctx.responded().await);
    }

    #[tokio::test]
    async fn test_text_value_keeps_text_verbatim() {
        let ctx = TurnContext::new(Activity::message("c1", "alice", "   "));
        assert_eq!(ctx.text_value(), Value::String("   ".into()));

        let ctx = TurnContext::new(Activity::event("c1", "alice", "tokens/response"));
        assert_eq!(ctx.text_value(), Value::Null);

        let ctx = TurnContext::new(Activity::message("c1", "alice", "yes"));
        assert_eq!(ctx.text_value(), Value::String("yes".into()));
    }

    #[tokio::test]
    async fn test_turn_state_is_shared_between_clones() {
        let ctx = TurnContext::new(Activity::message("c1", "alice", "hi"));
        let other = ctx.clone();
        other.set_turn_value("seen", Value::Bool(true)).await;
        assert_eq!(ctx.turn_value("seen").await, Some(Value::Bool(true)));
    }
}

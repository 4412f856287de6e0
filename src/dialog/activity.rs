//! 消息活动（入站 / 出站）
//!
//! 渠道无关的最小活动模型：消息、事件、Invoke、会话成员变更。

use serde::{Deserialize, Serialize};

/// 活动类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    /// 用户或机器人发送的文本消息
    Message,
    /// 渠道事件（如登录回调）
    Event,
    /// 渠道 Invoke 请求
    Invoke,
    /// 会话成员变更
    ConversationUpdate,
}

/// 一条活动
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    pub kind: ActivityKind,
    pub conversation_id: String,
    /// 发送方
    pub from: String,
    /// 接收方（入站时为机器人自身）
    pub recipient: String,
    pub text: Option<String>,
    /// 供渠道渲染的快捷回复按钮
    #[serde(default)]
    pub suggested_actions: Vec<String>,
    /// 新加入会话的成员（仅 ConversationUpdate）
    #[serde(default)]
    pub members_added: Vec<String>,
    /// 事件名（仅 Event / Invoke）
    pub name: Option<String>,
    pub timestamp: i64,
}

/// 入站活动默认的机器人标识
pub const BOT_ID: &str = "bot";

impl Activity {
    fn base(kind: ActivityKind, conversation_id: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            id: format!("act_{}", uuid::Uuid::new_v4()),
            kind,
            conversation_id: conversation_id.into(),
            from: from.into(),
            recipient: BOT_ID.to_string(),
            text: None,
            suggested_actions: Vec::new(),
            members_added: Vec::new(),
            name: None,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// 用户消息
    pub fn message(
        conversation_id: impl Into<String>,
        from: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        let mut activity = Self::base(ActivityKind::Message, conversation_id, from);
        activity.text = Some(text.into());
        activity
    }

    /// 渠道事件
    pub fn event(
        conversation_id: impl Into<String>,
        from: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let mut activity = Self::base(ActivityKind::Event, conversation_id, from);
        activity.name = Some(name.into());
        activity
    }

    /// 成员加入会话
    pub fn conversation_update(conversation_id: impl Into<String>, member: impl Into<String>) -> Self {
        let member = member.into();
        let mut activity = Self::base(ActivityKind::ConversationUpdate, conversation_id, member.clone());
        activity.members_added = vec![member];
        activity
    }

    /// 构造对本活动的文本回复（收发方互换）
    pub fn reply(&self, text: impl Into<String>) -> Self {
        let mut reply = Self::base(ActivityKind::Message, self.conversation_id.clone(), self.recipient.clone());
        reply.recipient = self.from.clone();
        reply.text = Some(text.into());
        reply
    }

    pub fn is_message(&self) -> bool {
        self.kind == ActivityKind::Message
    }

    /// 消息文本，无文本时为空串
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }
}

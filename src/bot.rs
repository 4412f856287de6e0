//! 机器人宿主：把入站活动交给对话栈，并在每回合结束时持久化会话状态
//!
//! - 消息：继续栈顶对话；栈为空且本回合没有回复时启动根对话
//! - 事件 / Invoke：继续栈顶对话；没有回复时启动根对话
//! - 成员加入：向新成员发送欢迎语
//!
//! 同一会话的回合串行执行；任何错误都会回复出错提示并清空该会话状态。

use std::collections::HashMap;
use std::sync::Arc;

use rand::seq::SliceRandom;
use tokio::sync::{Mutex, RwLock};

use crate::config::AppSection;
use crate::core::DialogError;
use crate::dialog::{Activity, ActivityKind, DialogContext, DialogSet, DialogTurnStatus, TurnContext};
use crate::storage::StateStore;

/// 宿主行为设置（来自 [app]）
#[derive(Debug, Clone)]
pub struct BotSettings {
    pub welcome: String,
    pub error_reply: String,
    pub randomize_replies: bool,
}

impl From<&AppSection> for BotSettings {
    fn from(section: &AppSection) -> Self {
        Self {
            welcome: section.welcome.clone(),
            error_reply: section.error_reply.clone(),
            randomize_replies: section.randomize_replies,
        }
    }
}

pub struct Bot {
    dialogs: Arc<DialogSet>,
    root_dialog: String,
    store: Arc<dyn StateStore>,
    settings: BotSettings,
    conversations: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl Bot {
    pub fn new(
        dialogs: DialogSet,
        root_dialog: impl Into<String>,
        store: Arc<dyn StateStore>,
        settings: BotSettings,
    ) -> Self {
        Self {
            dialogs: Arc::new(dialogs),
            root_dialog: root_dialog.into(),
            store,
            settings,
            conversations: RwLock::new(HashMap::new()),
        }
    }

    /// 处理一条入站活动，返回本回合要发送的回复
    pub async fn on_turn(&self, activity: Activity) -> Vec<Activity> {
        let conversation_id = activity.conversation_id.clone();
        let lock = self.conversation_lock(&conversation_id).await;
        let responses = {
            let _guard = lock.lock().await;
            self.handle_turn(activity).await
        };
        self.release_conversation_lock(&conversation_id, lock).await;
        responses
    }

    async fn handle_turn(&self, activity: Activity) -> Vec<Activity> {
        let conversation_id = activity.conversation_id.clone();
        tracing::info!(
            "<- [{}] {:?} from {}: {}",
            conversation_id,
            activity.kind,
            activity.from,
            activity.text()
        );

        let ctx = TurnContext::new(activity);
        if let Err(e) = self.run_turn(&ctx).await {
            tracing::error!("Turn failed for conversation {}: {}", conversation_id, e);
            ctx.send_text(self.settings.error_reply.clone()).await;
            if let Err(e) = self.store.delete(&conversation_id).await {
                tracing::error!("Failed to clear state for conversation {}: {}", conversation_id, e);
            }
        }

        let mut responses = ctx.take_responses().await;
        for reply in responses.iter_mut() {
            if self.settings.randomize_replies {
                if let Some(text) = reply.text.as_deref() {
                    reply.text = Some(pick_one_reply(text));
                }
            }
            tracing::info!("-> [{}] {}", conversation_id, reply.text());
        }
        responses
    }

    async fn conversation_lock(&self, conversation_id: &str) -> Arc<Mutex<()>> {
        if let Some(lock) = self.conversations.read().await.get(conversation_id) {
            return lock.clone();
        }
        self.conversations
            .write()
            .await
            .entry(conversation_id.to_string())
            .or_default()
            .clone()
    }

    /// 没有其它回合持有或等待该锁时移除
    async fn release_conversation_lock(&self, conversation_id: &str, lock: Arc<Mutex<()>>) {
        let mut conversations = self.conversations.write().await;
        drop(lock);
        if conversations
            .get(conversation_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            conversations.remove(conversation_id);
        }
    }

    async fn run_turn(&self, ctx: &TurnContext) -> Result<(), DialogError> {
        let conversation_id = ctx.activity().conversation_id.clone();
        let mut stack = self.store.load(&conversation_id).await?.unwrap_or_default();

        {
            let mut dc = DialogContext::new(&self.dialogs, &mut stack, ctx);
            match ctx.activity().kind {
                ActivityKind::Message => self.on_message(&mut dc).await?,
                ActivityKind::Event | ActivityKind::Invoke => self.on_event(&mut dc).await?,
                ActivityKind::ConversationUpdate => self.on_conversation_update(ctx).await,
            }
        }

        self.store.save(&conversation_id, &stack).await?;
        Ok(())
    }

    async fn on_message(&self, dc: &mut DialogContext<'_>) -> Result<(), DialogError> {
        let status = dc.continue_dialog().await?;
        if dc.turn().responded().await {
            return Ok(());
        }
        match status {
            DialogTurnStatus::Empty => {
                dc.begin_dialog(&self.root_dialog, serde_json::Value::Null).await?;
            }
            DialogTurnStatus::Waiting => {}
            DialogTurnStatus::Complete(_) | DialogTurnStatus::Cancelled => {
                tracing::debug!("Dialog stack finished without replying");
            }
        }
        Ok(())
    }

    async fn on_event(&self, dc: &mut DialogContext<'_>) -> Result<(), DialogError> {
        dc.continue_dialog().await?;
        if !dc.turn().responded().await {
            dc.begin_dialog(&self.root_dialog, serde_json::Value::Null).await?;
        }
        Ok(())
    }

    async fn on_conversation_update(&self, ctx: &TurnContext) {
        let activity = ctx.activity();
        if activity
            .members_added
            .first()
            .is_some_and(|member| *member != activity.recipient)
        {
            ctx.send_text(self.settings.welcome.clone()).await;
        }
    }
}

/// "a|b|c" 随机取其一
pub fn pick_one_reply(text: &str) -> String {
    let replies: Vec<&str> = text.split('|').collect();
    replies
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(text)
        .to_string()
}

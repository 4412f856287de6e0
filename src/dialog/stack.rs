//! 宿主对话栈
//!
//! DialogSet 按 id 注册对话；DialogContext 在一个回合内驱动持久化的实例栈：
//! 子对话入栈、结束出栈、恢复父对话，用显式循环展开，不做递归。

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::context::TurnContext;
use super::traits::{Dialog, DialogReason, DialogTurnResult};
use crate::core::DialogError;

/// 栈上的一个对话实例
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogInstance {
    pub id: String,
    /// 实例状态，对宿主不透明
    #[serde(default)]
    pub state: Value,
}

impl DialogInstance {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: Value::Null,
        }
    }
}

/// 每个会话持久化的对话栈（末尾为栈顶）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DialogStackState {
    #[serde(default)]
    pub stack: Vec<DialogInstance>,
}

impl DialogStackState {
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn active(&self) -> Option<&DialogInstance> {
        self.stack.last()
    }
}

/// 回合结束时栈的状态
#[derive(Debug, Clone, PartialEq)]
pub enum DialogTurnStatus {
    /// 栈上没有对话
    Empty,
    /// 栈顶对话在等待用户输入
    Waiting,
    /// 根对话结束并返回结果
    Complete(Value),
    /// 整个栈被取消
    Cancelled,
}

/// 已注册对话的集合
#[derive(Default)]
pub struct DialogSet {
    dialogs: HashMap<String, Arc<dyn Dialog>>,
}

impl DialogSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册对话；同 id 后注册者覆盖
    pub fn add(mut self, dialog: Arc<dyn Dialog>) -> Self {
        let id = dialog.id().to_string();
        if self.dialogs.insert(id.clone(), dialog).is_some() {
            tracing::warn!("Dialog '{}' registered twice, keeping the last one", id);
        }
        self
    }

    pub fn find(&self, id: &str) -> Result<Arc<dyn Dialog>, DialogError> {
        self.dialogs
            .get(id)
            .cloned()
            .ok_or_else(|| DialogError::DialogNotFound(id.to_string()))
    }
}

/// 单个回合内的对话栈驱动器
pub struct DialogContext<'a> {
    dialogs: &'a DialogSet,
    stack: &'a mut DialogStackState,
    ctx: &'a TurnContext,
}

impl<'a> DialogContext<'a> {
    pub fn new(dialogs: &'a DialogSet, stack: &'a mut DialogStackState, ctx: &'a TurnContext) -> Self {
        Self { dialogs, stack, ctx }
    }

    pub fn turn(&self) -> &TurnContext {
        self.ctx
    }

    pub fn stack(&self) -> &DialogStackState {
        self.stack
    }

    /// 压入并启动对话
    pub async fn begin_dialog(
        &mut self,
        dialog_id: &str,
        options: Value,
    ) -> Result<DialogTurnStatus, DialogError> {
        self.drive(DialogTurnResult::BeginChild {
            dialog_id: dialog_id.to_string(),
            options,
        })
        .await
    }

    /// 把当前活动交给栈顶对话
    pub async fn continue_dialog(&mut self) -> Result<DialogTurnStatus, DialogError> {
        let Some(top) = self.stack.stack.last_mut() else {
            return Ok(DialogTurnStatus::Empty);
        };
        let dialog = self.dialogs.find(&top.id)?;
        let result = dialog.continue_dialog(self.ctx, &mut top.state).await?;
        self.drive(result).await
    }

    /// 弹出栈顶实例，以 Null 结果和 CancelCalled 恢复其父对话
    pub async fn cancel_active(&mut self) -> Result<DialogTurnStatus, DialogError> {
        if self.stack.stack.pop().is_none() {
            return Ok(DialogTurnStatus::Empty);
        }
        self.resume_parent(DialogReason::CancelCalled, Value::Null).await
    }

    /// 丢弃全部实例状态；被取消的实例不会再收到任何调用
    pub fn cancel_all(&mut self) -> DialogTurnStatus {
        let cancelled = self.stack.stack.len();
        self.stack.stack.clear();
        tracing::debug!("Cancelled {} dialog instance(s)", cancelled);
        DialogTurnStatus::Cancelled
    }

    async fn resume_parent(
        &mut self,
        reason: DialogReason,
        result: Value,
    ) -> Result<DialogTurnStatus, DialogError> {
        let Some(parent) = self.stack.stack.last_mut() else {
            return Ok(match reason {
                DialogReason::EndCalled => DialogTurnStatus::Complete(result),
                DialogReason::CancelCalled => DialogTurnStatus::Cancelled,
            });
        };
        let dialog = self.dialogs.find(&parent.id)?;
        let next = dialog.resume(self.ctx, &mut parent.state, reason, result).await?;
        self.drive(next).await
    }

    /// 解释对话返回的结果，直到有对话等待输入或栈清空
    async fn drive(&mut self, mut result: DialogTurnResult) -> Result<DialogTurnStatus, DialogError> {
        loop {
            result = match result {
                DialogTurnResult::Waiting => return Ok(DialogTurnStatus::Waiting),
                DialogTurnResult::CancelAll => return Ok(self.cancel_all()),
                DialogTurnResult::BeginChild { dialog_id, options } => {
                    let dialog = self.dialogs.find(&dialog_id)?;
                    tracing::debug!("Begin dialog '{}' (depth {})", dialog_id, self.stack.stack.len() + 1);
                    self.stack.stack.push(DialogInstance::new(dialog_id));
                    let top = self
                        .stack
                        .stack
                        .last_mut()
                        .ok_or_else(|| DialogError::step("dialog stack empty after push"))?;
                    dialog.begin(self.ctx, &mut top.state, options).await?
                }
                DialogTurnResult::Complete(value) => {
                    if let Some(ended) = self.stack.stack.pop() {
                        tracing::debug!("Dialog '{}' ended", ended.id);
                    }
                    let Some(parent) = self.stack.stack.last_mut() else {
                        return Ok(DialogTurnStatus::Complete(value));
                    };
                    let dialog = self.dialogs.find(&parent.id)?;
                    dialog
                        .resume(self.ctx, &mut parent.state, DialogReason::EndCalled, value)
                        .await?
                }
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialog::Activity;
    use async_trait::async_trait;
    use serde_json::json;

    /// begin 时按 options 决定：{"child": id} 启动子对话，否则等待；resume 时返回子结果
    struct ParentDialog;

    #[async_trait]
    impl Dialog for ParentDialog {
        fn id(&self) -> &str {
            "parent"
        }

        async fn begin(
            &self,
            _ctx: &TurnContext,
            state: &mut Value,
            options: Value,
        ) -> Result<DialogTurnResult, DialogError> {
            *state = json!({ "begun": true });
            match options.get("child").and_then(Value::as_str) {
                Some(child) => Ok(DialogTurnResult::BeginChild {
                    dialog_id: child.to_string(),
                    options: Value::Null,
                }),
                None => Ok(DialogTurnResult::Waiting),
            }
        }

        async fn continue_dialog(
            &self,
            _ctx: &TurnContext,
            _state: &mut Value,
        ) -> Result<DialogTurnResult, DialogError> {
            Ok(DialogTurnResult::Waiting)
        }

        async fn resume(
            &self,
            _ctx: &TurnContext,
            state: &mut Value,
            reason: DialogReason,
            result: Value,
        ) -> Result<DialogTurnResult, DialogError> {
            *state = json!({ "reason": reason, "child_result": result.clone() });
            Ok(DialogTurnResult::Complete(result))
        }
    }

    /// 回显用户消息并结束
    struct EchoDialog;

    #[async_trait]
    impl Dialog for EchoDialog {
        fn id(&self) -> &str {
            "echo"
        }

        async fn begin(
            &self,
            _ctx: &TurnContext,
            _state: &mut Value,
            _options: Value,
        ) -> Result<DialogTurnResult, DialogError> {
            Ok(DialogTurnResult::Waiting)
        }

        async fn continue_dialog(
            &self,
            ctx: &TurnContext,
            _state: &mut Value,
        ) -> Result<DialogTurnResult, DialogError> {
            Ok(DialogTurnResult::Complete(ctx.text_value()))
        }

        async fn resume(
            &self,
            _ctx: &TurnContext,
            _state: &mut Value,
            _reason: DialogReason,
            _result: Value,
        ) -> Result<DialogTurnResult, DialogError> {
            Ok(DialogTurnResult::Waiting)
        }
    }

    fn dialogs() -> DialogSet {
        DialogSet::new().add(Arc::new(ParentDialog)).add(Arc::new(EchoDialog))
    }

    #[tokio::test]
    async fn test_continue_on_empty_stack() {
        let set = dialogs();
        let mut state = DialogStackState::default();
        let ctx = TurnContext::new(Activity::message("c1", "u", "hello"));
        let mut dc = DialogContext::new(&set, &mut state, &ctx);

        assert_eq!(dc.continue_dialog().await.unwrap(), DialogTurnStatus::Empty);
    }

    #[tokio::test]
    async fn test_child_result_resumes_parent() {
        let set = dialogs();
        let mut state = DialogStackState::default();

        let ctx = TurnContext::new(Activity::message("c1", "u", "start"));
        let status = DialogContext::new(&set, &mut state, &ctx)
            .begin_dialog("parent", json!({ "child": "echo" }))
            .await
            .unwrap();
        assert_eq!(status, DialogTurnStatus::Waiting);
        assert_eq!(state.stack.len(), 2);
        assert_eq!(state.active().unwrap().id, "echo");

        let ctx = TurnContext::new(Activity::message("c1", "u", "ping"));
        let status = DialogContext::new(&set, &mut state, &ctx)
            .continue_dialog()
            .await
            .unwrap();
        assert_eq!(status, DialogTurnStatus::Complete(json!("ping")));
        assert!(state.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_active_resumes_parent_with_null() {
        let set = dialogs();
        let mut state = DialogStackState {
            stack: vec![DialogInstance::new("parent"), DialogInstance::new("echo")],
        };
        let ctx = TurnContext::new(Activity::message("c1", "u", "stop"));
        let status = DialogContext::new(&set, &mut state, &ctx)
            .cancel_active()
            .await
            .unwrap();

        assert_eq!(status, DialogTurnStatus::Complete(Value::Null));
    }

    #[tokio::test]
    async fn test_unknown_dialog_is_an_error() {
        let set = dialogs();
        let mut state = DialogStackState::default();
        let ctx = TurnContext::new(Activity::message("c1", "u", "start"));
        let err = DialogContext::new(&set, &mut state, &ctx)
            .begin_dialog("missing", Value::Null)
            .await
            .unwrap_err();

        assert!(matches!(err, DialogError::DialogNotFound(id) if id == "missing"));
    }
}

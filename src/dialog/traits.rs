//! 对话抽象
//!
//! 宿主对话栈通过三个动词驱动对话：begin（入栈启动）、continue（用户回复）、resume（子对话结束）。
//! 对话实例状态是宿主持有的不透明 JSON，由对话自行解释。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::context::TurnContext;
use crate::core::DialogError;

/// 父对话被恢复的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogReason {
    /// 子对话正常结束并返回结果
    EndCalled,
    /// 子对话被宿主取消，结果为 Null
    CancelCalled,
}

/// 一次对话调用的结果，交给宿主解释
#[derive(Debug, Clone, PartialEq)]
pub enum DialogTurnResult {
    /// 等待下一条用户消息
    Waiting,
    /// 本实例结束，结果交给父对话
    Complete(Value),
    /// 请求宿主压入子对话；本实例在其结束后被 resume
    BeginChild { dialog_id: String, options: Value },
    /// 结束本实例并取消全部祖先实例
    CancelAll,
}

/// 可被宿主对话栈驱动的对话
#[async_trait]
pub trait Dialog: Send + Sync {
    fn id(&self) -> &str;

    /// 新实例入栈；`state` 初始为 Null
    async fn begin(
        &self,
        ctx: &TurnContext,
        state: &mut Value,
        options: Value,
    ) -> Result<DialogTurnResult, DialogError>;

    /// 本实例位于栈顶时收到新活动
    async fn continue_dialog(
        &self,
        ctx: &TurnContext,
        state: &mut Value,
    ) -> Result<DialogTurnResult, DialogError>;

    /// 本实例启动的子对话结束
    async fn resume(
        &self,
        ctx: &TurnContext,
        state: &mut Value,
        reason: DialogReason,
        result: Value,
    ) -> Result<DialogTurnResult, DialogError>;
}

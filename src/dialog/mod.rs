//! 宿主对话层：活动、回合上下文、对话抽象与对话栈

pub mod activity;
pub mod context;
pub mod stack;
pub mod traits;

pub use activity::{Activity, ActivityKind, BOT_ID};
pub use context::TurnContext;
pub use stack::{DialogContext, DialogInstance, DialogSet, DialogStackState, DialogTurnStatus};
pub use traits::{Dialog, DialogReason, DialogTurnResult};

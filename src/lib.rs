//! intent-waterfall - 意图路由的可恢复瀑布对话引擎
//!
//! 模块划分：
//! - **bot**: 机器人宿主（按会话驱动对话栈、欢迎语、回合级错误处理）
//! - **classifier**: 意图分类器抽象与实现（关键词规则 / LUIS HTTP / 脚本化 Mock）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型
//! - **dialog**: 活动、回合上下文、对话抽象与宿主对话栈
//! - **dialogs**: 示例对话（根对话 + 确认对话）
//! - **observability**: 日志初始化
//! - **storage**: 会话状态存储（内存 / 文件）
//! - **waterfall**: IntentDialog 路由器、步骤与持久化状态

pub mod bot;
pub mod classifier;
pub mod config;
pub mod core;
pub mod dialog;
pub mod dialogs;
pub mod observability;
pub mod storage;
pub mod waterfall;

pub use bot::Bot;
pub use waterfall::{step_fn, IntentDialog, StepOutcome, WaterfallStep};

//! 对话引擎错误类型
//!
//! 路由器从不吞掉错误：步骤、分类器、状态反序列化的失败都以 DialogError 上抛，
//! 由 Bot 的回合级错误处理统一兜底（回复用户 + 清空会话状态）。

use thiserror::Error;

/// 对话运行过程中可能出现的错误
#[derive(Error, Debug)]
pub enum DialogError {
    /// 同一次步骤执行中第二次调用 next()，属于步骤实现的逻辑错误
    #[error("WaterfallStep::next(): already called for dialog and step '{dialog}[{sequence}][{index}]'")]
    AdvanceAlreadyCalled {
        dialog: String,
        sequence: String,
        index: usize,
    },

    /// 步骤调用了 next() 却没有把返回的前进结果交还给路由器
    #[error("WaterfallStep::next(): result discarded by dialog and step '{dialog}[{sequence}][{index}]'")]
    AdvanceDiscarded {
        dialog: String,
        sequence: String,
        index: usize,
    },

    /// 分类器调用本身失败；不会被当作 "None" 意图处理
    #[error("Intent classification failed: {0}")]
    Classifier(#[from] ClassifierError),

    #[error("Dialog not found: {0}")]
    DialogNotFound(String),

    #[error("Invalid dialog state: {0}")]
    InvalidState(#[from] serde_json::Error),

    #[error("State storage error: {0}")]
    Storage(#[from] StorageError),

    /// 步骤自身报告的失败（例如外部 API 调用出错）
    #[error("Step failed: {0}")]
    Step(String),
}

/// 意图分类器错误
#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Classifier returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse classifier response: {0}")]
    Parse(String),

    #[error("Classifier not configured: {0}")]
    NotConfigured(String),

    #[error("Classifier unavailable: {0}")]
    Unavailable(String),
}

/// 会话状态存储错误
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl DialogError {
    /// 便捷构造：步骤失败
    pub fn step(msg: impl Into<String>) -> Self {
        DialogError::Step(msg.into())
    }
}

//! 意图路由的可恢复瀑布对话

pub mod engine;
pub mod step;
pub mod types;

pub use engine::IntentDialog;
pub use step::{step_fn, Step, StepFuture, WaterfallStep};
pub use types::{Advanced, RouterPolicy, SequenceKey, StepOutcome, StepReason, WaterfallState, RECOGNIZER_RESULT};

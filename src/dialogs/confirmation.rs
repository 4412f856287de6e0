//! 是 / 否确认对话
//!
//! 启动时提出问题并等待；Yes → true，No → false，Cancel → Null（由父对话按取消处理），
//! Help 重新提问，其它输入提示用户只回答问题。

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::nlp::{INTENT_CANCEL, INTENT_HELP, INTENT_NO, INTENT_YES};
use crate::classifier::IntentClassifier;
use crate::core::DialogError;
use crate::waterfall::{step_fn, IntentDialog, RouterPolicy, StepOutcome};

pub const CONFIRMATION_DIALOG: &str = "ConfirmationDialog";

const SUGGESTED_ACTIONS: [&str; 3] = ["Yes", "No", "Cancel"];

/// 启动参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationOptions {
    pub question: String,
}

impl ConfirmationOptions {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
        }
    }

    pub fn to_value(&self) -> Result<Value, DialogError> {
        Ok(serde_json::to_value(self)?)
    }
}

pub fn confirmation_dialog(classifier: Arc<dyn IntentClassifier>, policy: RouterPolicy) -> IntentDialog {
    IntentDialog::new(CONFIRMATION_DIALOG, classifier)
        .with_policy(policy)
        .on_begin(vec![step_fn(|step| {
            Box::pin(async move {
                let options: ConfirmationOptions = step.options_as()?;
                step.context()
                    .send_suggested(options.question, &SUGGESTED_ACTIONS)
                    .await;
                Ok::<_, DialogError>(StepOutcome::Wait)
            })
        })])
        .matches(
            INTENT_YES,
            vec![step_fn(|_| Box::pin(async { Ok(StepOutcome::End(Value::Bool(true))) }))],
        )
        .matches(
            INTENT_NO,
            vec![step_fn(|_| Box::pin(async { Ok(StepOutcome::End(Value::Bool(false))) }))],
        )
        .matches(
            INTENT_CANCEL,
            vec![step_fn(|_| Box::pin(async { Ok(StepOutcome::End(Value::Null)) }))],
        )
        .matches(
            INTENT_HELP,
            vec![step_fn(|step| {
                Box::pin(async move {
                    let options: ConfirmationOptions = step.options_as()?;
                    step.context()
                        .send_suggested(
                            format!("Answer Yes or No to the question: {}", options.question),
                            &SUGGESTED_ACTIONS,
                        )
                        .await;
                    Ok::<_, DialogError>(StepOutcome::Wait)
                })
            })],
        )
        .on_default(vec![step_fn(|step| {
            Box::pin(async move {
                step.context()
                    .send_suggested(
                        "Sorry, I didn't understand that. Please, just answer the question",
                        &SUGGESTED_ACTIONS,
                    )
                    .await;
                Ok(StepOutcome::Wait)
            })
        })])
}

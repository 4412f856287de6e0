//! 根对话：问候、致谢、告别、帮助、取消、推荐流程与兜底

use std::sync::Arc;

use serde_json::Value;

use super::confirmation::{ConfirmationOptions, CONFIRMATION_DIALOG};
use super::nlp::{
    INTENT_BYE, INTENT_CANCEL, INTENT_HELP, INTENT_HI, INTENT_RECOMMENDATIONS, INTENT_THX,
};
use crate::classifier::IntentClassifier;
use crate::core::DialogError;
use crate::dialog::TurnContext;
use crate::waterfall::{step_fn, IntentDialog, RouterPolicy, StepOutcome};

pub const ROOT_DIALOG: &str = "RootDialog";

const SUGGESTED_ACTIONS: [&str; 3] = ["Recommend shows", "Help", "Bye"];

const PERSONAL_PICKS: [&str; 3] = ["Dark", "The Expanse", "Severance"];
const POPULAR_SHOWS: [&str; 3] = ["Breaking Bad", "Game of Thrones", "Stranger Things"];

async fn send_what_now(ctx: &TurnContext) {
    ctx.send_suggested("What else can I do for you?", &SUGGESTED_ACTIONS)
        .await;
}

async fn send_shows(ctx: &TurnContext, heading: &str, shows: &[&str]) {
    let lines: Vec<String> = shows.iter().map(|show| format!("- {show}")).collect();
    ctx.send_text(format!("{heading}\n{}", lines.join("\n"))).await;
}

pub fn root_dialog(classifier: Arc<dyn IntentClassifier>, policy: RouterPolicy) -> IntentDialog {
    IntentDialog::new(ROOT_DIALOG, classifier)
        .with_policy(policy)
        .matches(
            INTENT_HI,
            vec![
                step_fn(|step| {
                    Box::pin(async move {
                        step.send_text("Hi there!|Hello!|Hey!").await;
                        step.next(Value::Null)
                    })
                }),
                step_fn(|step| {
                    Box::pin(async move {
                        step.context()
                            .send_suggested("What can I do for you today?", &SUGGESTED_ACTIONS)
                            .await;
                        Ok(StepOutcome::Wait)
                    })
                }),
            ],
        )
        .matches(
            INTENT_THX,
            vec![step_fn(|step| {
                Box::pin(async move {
                    step.send_text("You are welcome|Don't mention it").await;
                    Ok(StepOutcome::Wait)
                })
            })],
        )
        .matches(
            INTENT_BYE,
            vec![step_fn(|step| {
                Box::pin(async move {
                    step.send_text("Good bye!|Bye, bye!").await;
                    Ok(StepOutcome::Wait)
                })
            })],
        )
        .matches(
            INTENT_RECOMMENDATIONS,
            vec![
                step_fn(|_| {
                    Box::pin(async {
                        let options = ConfirmationOptions::new("Do you want personalized recommendations?");
                        Ok::<_, DialogError>(StepOutcome::begin_dialog(CONFIRMATION_DIALOG, options.to_value()?))
                    })
                }),
                step_fn(|step| {
                    Box::pin(async move {
                        let ctx = step.context();
                        match step.result() {
                            Value::Bool(true) => {
                                send_shows(ctx, "These are the top recommendations for you:", &PERSONAL_PICKS).await
                            }
                            Value::Bool(false) => {
                                send_shows(ctx, "These are the most popular shows at the moment:", &POPULAR_SHOWS)
                                    .await
                            }
                            _ => ctx.send_text("Sure thing!|If you say so...|Of course").await,
                        }
                        send_what_now(ctx).await;
                        Ok(StepOutcome::Wait)
                    })
                }),
            ],
        )
        .matches(
            INTENT_HELP,
            vec![step_fn(|step| {
                Box::pin(async move {
                    step.context()
                        .send_suggested("I can answer different questions about tv shows", &SUGGESTED_ACTIONS)
                        .await;
                    Ok(StepOutcome::Wait)
                })
            })],
        )
        .matches(
            INTENT_CANCEL,
            vec![step_fn(|step| {
                Box::pin(async move {
                    step.send_text("There is nothing for me to cancel here").await;
                    send_what_now(step.context()).await;
                    Ok(StepOutcome::Wait)
                })
            })],
        )
        .on_default(vec![step_fn(|step| {
            Box::pin(async move {
                step.context()
                    .send_suggested("Sorry, I didn't understand that. How can I help you?", &SUGGESTED_ACTIONS)
                    .await;
                Ok(StepOutcome::Wait)
            })
        })])
}

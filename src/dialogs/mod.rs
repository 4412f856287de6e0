//! 示例对话：电视节目推荐机器人
//!
//! 根对话按意图路由，推荐流程通过确认对话询问用户，结束后在根对话中恢复。

pub mod confirmation;
pub mod nlp;
pub mod root;

use std::sync::Arc;

pub use confirmation::{confirmation_dialog, ConfirmationOptions, CONFIRMATION_DIALOG};
pub use root::{root_dialog, ROOT_DIALOG};

use crate::bot::{Bot, BotSettings};
use crate::classifier::IntentClassifier;
use crate::config::AppConfig;
use crate::dialog::DialogSet;
use crate::storage::StateStore;
use crate::waterfall::RouterPolicy;

/// 注册全部示例对话
pub fn create_dialogs(classifier: Arc<dyn IntentClassifier>, policy: RouterPolicy) -> DialogSet {
    DialogSet::new()
        .add(Arc::new(root_dialog(classifier.clone(), policy.clone())))
        .add(Arc::new(confirmation_dialog(classifier, policy)))
}

/// 按配置组装示例机器人
pub fn create_bot(
    config: &AppConfig,
    classifier: Arc<dyn IntentClassifier>,
    store: Arc<dyn StateStore>,
) -> Bot {
    let dialogs = create_dialogs(classifier, RouterPolicy::from(&config.router));
    Bot::new(dialogs, ROOT_DIALOG, store, BotSettings::from(&config.app))
}

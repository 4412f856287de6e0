//! 意图分类层：分类器抽象与实现（关键词规则 / LUIS HTTP / 脚本化 Mock）

pub mod keyword;
pub mod luis;
pub mod mock;
pub mod traits;

use std::sync::Arc;

pub use keyword::{KeywordClassifier, KeywordRule};
pub use luis::LuisClassifier;
pub use mock::ScriptedClassifier;
pub use traits::{Entity, IntentClassifier, IntentScore, RecognizerResult};

use crate::config::ClassifierSection;
use crate::core::ClassifierError;

/// 按 [classifier].provider 创建分类器：keyword（默认）/ luis
pub fn create_classifier(section: &ClassifierSection) -> Result<Arc<dyn IntentClassifier>, ClassifierError> {
    match section.provider.as_str() {
        "keyword" => {
            let classifier = KeywordClassifier::from_config(&section.rules)?;
            tracing::info!("Using keyword classifier with {} rules", classifier.rule_count());
            Ok(Arc::new(classifier))
        }
        "luis" => {
            let classifier = LuisClassifier::from_config(section)?;
            tracing::info!("Using LUIS classifier");
            Ok(Arc::new(classifier))
        }
        other => Err(ClassifierError::NotConfigured(format!(
            "unknown classifier provider '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_provider_is_rejected() {
        let section = ClassifierSection {
            provider: "telepathy".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            create_classifier(&section),
            Err(ClassifierError::NotConfigured(_))
        ));
    }

    #[test]
    fn test_default_section_builds_keyword_classifier() {
        assert!(create_classifier(&ClassifierSection::default()).is_ok());
    }
}

//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `WATERFALL__*` 覆盖（双下划线表示嵌套，如 `WATERFALL__ROUTER__CONFIDENCE_FLOOR=0.6`）。

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub router: RouterSection,
    #[serde(default)]
    pub classifier: ClassifierSection,
    #[serde(default)]
    pub storage: StorageSection,
}

/// [app] 段：机器人名称、欢迎语、出错回复、日志过滤
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    #[serde(default = "default_name")]
    pub name: String,
    /// 新成员加入会话时发送
    #[serde(default = "default_welcome")]
    pub welcome: String,
    /// 回合出错时发送，随后清空会话状态
    #[serde(default = "default_error_reply")]
    pub error_reply: String,
    /// 出站文本 "a|b|c" 是否随机取其一
    #[serde(default = "default_true")]
    pub randomize_replies: bool,
    /// 默认日志过滤，RUST_LOG 可覆盖
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_name() -> String {
    "ShowBot".to_string()
}

fn default_welcome() -> String {
    "Welcome! I can recommend TV shows. Say hi, ask for recommendations or type help.".to_string()
}

fn default_error_reply() -> String {
    "Oops. Something went wrong!".to_string()
}

fn default_true() -> bool {
    true
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: default_name(),
            welcome: default_welcome(),
            error_reply: default_error_reply(),
            randomize_replies: default_true(),
            log_filter: default_log_filter(),
        }
    }
}

/// [router] 段：意图选择策略
#[derive(Debug, Clone, Deserialize)]
pub struct RouterSection {
    /// 最高分低于该值视为未识别
    #[serde(default = "default_confidence_floor")]
    pub confidence_floor: f64,
    /// 未识别时使用的保留标签
    #[serde(default = "default_label")]
    pub default_label: String,
}

fn default_confidence_floor() -> f64 {
    0.5
}

fn default_label() -> String {
    "None".to_string()
}

impl Default for RouterSection {
    fn default() -> Self {
        Self {
            confidence_floor: default_confidence_floor(),
            default_label: default_label(),
        }
    }
}

/// [classifier] 段：分类器后端与关键词规则
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierSection {
    /// keyword / luis
    #[serde(default = "default_provider")]
    pub provider: String,
    pub endpoint: Option<String>,
    pub app_id: Option<String>,
    pub subscription_key: Option<String>,
    #[serde(default = "default_classifier_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_rules")]
    pub rules: Vec<ClassifierRuleSection>,
}

fn default_provider() -> String {
    "keyword".to_string()
}

fn default_classifier_timeout_secs() -> u64 {
    10
}

impl Default for ClassifierSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            endpoint: None,
            app_id: None,
            subscription_key: None,
            timeout_secs: default_classifier_timeout_secs(),
            rules: default_rules(),
        }
    }
}

/// [[classifier.rules]]：一个意图及其正则
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierRuleSection {
    pub label: String,
    pub patterns: Vec<String>,
    #[serde(default = "default_rule_score")]
    pub score: f64,
}

fn default_rule_score() -> f64 {
    0.9
}

fn rule(label: &str, patterns: &[&str]) -> ClassifierRuleSection {
    ClassifierRuleSection {
        label: label.to_string(),
        patterns: patterns.iter().map(|p| p.to_string()).collect(),
        score: default_rule_score(),
    }
}

/// 内置规则，对应 dialogs::nlp 中的意图名
fn default_rules() -> Vec<ClassifierRuleSection> {
    vec![
        rule("Education_Hi", &[r"(?i)^\s*(hi|hello|hey|good (morning|afternoon|evening))\b"]),
        rule("Education_Thx", &[r"(?i)\b(thanks|thank you|thx|cheers)\b"]),
        rule("Education_Bye", &[r"(?i)\b(bye|goodbye|see you|later)\b"]),
        rule("Command_Help", &[r"(?i)^\s*(help|\?|what can you do)"]),
        rule("Command_Cancel", &[r"(?i)^\s*(cancel|stop|never ?mind|abort)\b"]),
        rule("Confirmation_Yes", &[r"(?i)^\s*(yes|yeah|yep|sure|ok|okay|of course)\b"]),
        rule("Confirmation_No", &[r"(?i)^\s*(no|nope|nah|not now)\b"]),
        rule("Shows_Recommendations", &[r"(?i)\brecommend", r"(?i)\bsuggest"]),
    ]
}

/// [storage] 段：会话状态存储
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSection {
    /// memory / file
    #[serde(default = "default_backend")]
    pub backend: String,
    /// file 后端的目录，未设置时用 ./data/conversations
    pub directory: Option<PathBuf>,
}

fn default_backend() -> String {
    "memory".to_string()
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            directory: None,
        }
    }
}

/// 加载配置：内置默认文件 < 显式文件 < WATERFALL__* 环境变量
///
/// 默认文件取当前目录、上级目录或工作目录下第一个存在的 default.toml；
/// 不存在的显式路径直接忽略。
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_file = ["config/default", "../config/default", "default"]
        .into_iter()
        .find(|name| Path::new(&format!("{name}.toml")).exists());
    if let Some(name) = default_file {
        builder = builder.add_source(config::File::with_name(name).required(false));
    }

    if let Some(path) = config_path.filter(|path| path.exists()) {
        builder = builder.add_source(config::File::from(path).required(false));
    }

    builder
        .add_source(
            config::Environment::with_prefix("WATERFALL")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.router.confidence_floor, 0.5);
        assert_eq!(config.router.default_label, "None");
        assert_eq!(config.classifier.provider, "keyword");
        assert!(!config.classifier.rules.is_empty());
        assert_eq!(config.storage.backend, "memory");
    }

    #[test]
    fn test_load_explicit_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot.toml");
        std::fs::write(
            &path,
            r#"
[router]
confidence_floor = 0.7

[storage]
backend = "file"
directory = "/tmp/conversations"

[[classifier.rules]]
label = "Foo"
patterns = ["(?i)foo"]
"#,
        )
        .unwrap();

        let config = load_config(Some(path)).unwrap();
        assert_eq!(config.router.confidence_floor, 0.7);
        assert_eq!(config.router.default_label, "None");
        assert_eq!(config.storage.backend, "file");
        assert_eq!(config.classifier.rules.len(), 1);
        assert_eq!(config.classifier.rules[0].score, 0.9);
    }
}

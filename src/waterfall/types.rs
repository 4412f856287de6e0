//! 瀑布路由器类型定义
//!
//! 定义步骤序列键、持久化的执行状态、步骤调用原因与步骤结果。

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::RouterSection;
use crate::dialog::DialogReason;

/// 值袋中缓存最近一次分类结果的保留名
pub const RECOGNIZER_RESULT: &str = "recognizerResult";

const BEGIN_KEY: &str = "begin";
const DEFAULT_KEY: &str = "default";
const INTENT_PREFIX: &str = "intent:";

/// 步骤序列的键
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SequenceKey {
    /// 启动时无匹配意图时运行
    Begin,
    /// 分类结果没有对应序列时运行
    Default,
    /// 最高意图为该名称时运行
    Intent(String),
}

impl SequenceKey {
    pub fn intent(name: impl Into<String>) -> Self {
        SequenceKey::Intent(name.into())
    }

    /// 解析持久化形式："begin" / "default" / "intent:<name>"
    pub fn parse(key: &str) -> Option<Self> {
        match key {
            BEGIN_KEY => Some(SequenceKey::Begin),
            DEFAULT_KEY => Some(SequenceKey::Default),
            _ => key
                .strip_prefix(INTENT_PREFIX)
                .map(|name| SequenceKey::Intent(name.to_string())),
        }
    }
}

impl fmt::Display for SequenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequenceKey::Begin => f.write_str(BEGIN_KEY),
            SequenceKey::Default => f.write_str(DEFAULT_KEY),
            SequenceKey::Intent(name) => write!(f, "{INTENT_PREFIX}{name}"),
        }
    }
}

/// `activeSequenceKey` 持久化为字符串，无活动序列时为空串
mod active_key {
    use super::SequenceKey;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(key: &Option<SequenceKey>, s: S) -> Result<S::Ok, S::Error> {
        match key {
            Some(key) => s.collect_str(key),
            None => s.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<SequenceKey>, D::Error> {
        let raw = String::deserialize(d)?;
        if raw.is_empty() {
            return Ok(None);
        }
        SequenceKey::parse(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown sequence key '{raw}'")))
    }
}

/// 单个对话实例的执行状态，由宿主在回合之间持久化
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaterfallState {
    #[serde(rename = "activeSequenceKey", with = "active_key", default)]
    pub active: Option<SequenceKey>,
    #[serde(default)]
    pub step_index: usize,
    /// 实例启动参数，对路由器不透明
    #[serde(default)]
    pub options: Value,
    /// 实例范围内的值袋
    #[serde(default)]
    pub values: Map<String, Value>,
}

impl WaterfallState {
    /// 新实例的初始状态
    pub fn started(options: Value) -> Self {
        Self {
            active: None,
            step_index: 0,
            options,
            values: Map::new(),
        }
    }

    /// 从宿主持有的 JSON 读取
    pub fn load(state: &Value) -> Result<Self, serde_json::Error> {
        if state.is_null() {
            return Ok(Self::default());
        }
        WaterfallState::deserialize(state)
    }

    /// 写回宿主持有的 JSON
    pub fn store(&self, state: &mut Value) -> Result<(), serde_json::Error> {
        *state = serde_json::to_value(self)?;
        Ok(())
    }
}

/// 本次步骤被调用的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepReason {
    /// 实例刚启动
    Started,
    /// 用户发送了新消息
    Continued,
    /// 子对话结束后恢复
    Resumed(DialogReason),
    /// 上一步调用了 next()
    Advanced,
}

/// 经 next() 前进时携带的值；只能由 WaterfallStep::next 构造
#[derive(Debug, Clone, PartialEq)]
pub struct Advanced {
    value: Value,
}

impl Advanced {
    pub(crate) fn new(value: Value) -> Self {
        Self { value }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }
}

/// 步骤执行结果
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// 结束本实例，结果交给父对话
    End(Value),
    /// 挂起，等待下一条用户消息
    Wait,
    /// 启动子对话，结束后恢复到下一步
    BeginDialog { dialog_id: String, options: Value },
    /// 同一回合内前进到下一步
    Next(Advanced),
    /// 结束本实例并取消所有祖先实例
    CancelAll,
}

impl StepOutcome {
    pub fn end(value: Value) -> Self {
        StepOutcome::End(value)
    }

    pub fn begin_dialog(dialog_id: impl Into<String>, options: Value) -> Self {
        StepOutcome::BeginDialog {
            dialog_id: dialog_id.into(),
            options,
        }
    }
}

/// 意图选择策略
#[derive(Debug, Clone, PartialEq)]
pub struct RouterPolicy {
    /// 最高分低于该值视为未识别
    pub confidence_floor: f64,
    /// 未识别时的保留标签
    pub default_label: String,
}

impl Default for RouterPolicy {
    fn default() -> Self {
        Self {
            confidence_floor: 0.5,
            default_label: "None".to_string(),
        }
    }
}

impl From<&RouterSection> for RouterPolicy {
    fn from(section: &RouterSection) -> Self {
        Self {
            confidence_floor: section.confidence_floor,
            default_label: section.default_label.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sequence_key_string_form() {
        for key in [SequenceKey::Begin, SequenceKey::Default, SequenceKey::intent("Foo")] {
            assert_eq!(SequenceKey::parse(&key.to_string()), Some(key));
        }
        assert_eq!(SequenceKey::intent("Foo").to_string(), "intent:Foo");
        assert_eq!(SequenceKey::parse("bogus"), None);
    }

    #[test]
    fn test_state_layout() {
        let mut state = WaterfallState::started(json!({ "question": "Sure?" }));
        state.active = Some(SequenceKey::intent("Foo"));
        state.step_index = 1;
        state.values.insert("token".into(), json!("abc"));

        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(
            value,
            json!({
                "activeSequenceKey": "intent:Foo",
                "stepIndex": 1,
                "options": { "question": "Sure?" },
                "values": { "token": "abc" }
            })
        );
        assert_eq!(WaterfallState::load(&value).unwrap(), state);
    }

    #[test]
    fn test_empty_key_is_no_active_sequence() {
        let state = WaterfallState::load(&json!({
            "activeSequenceKey": "",
            "stepIndex": 0,
            "options": null,
            "values": {}
        }))
        .unwrap();
        assert_eq!(state.active, None);
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let result = WaterfallState::load(&json!({ "activeSequenceKey": "nope", "stepIndex": 0 }));
        assert!(result.is_err());
    }

    #[test]
    fn test_null_state_loads_as_default() {
        assert_eq!(WaterfallState::load(&Value::Null).unwrap(), WaterfallState::default());
    }
}

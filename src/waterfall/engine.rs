//! 意图路由的瀑布对话引擎
//!
//! IntentDialog 持有按 SequenceKey 注册的步骤序列，由宿主对话栈通过 begin / continue / resume 驱动：
//! - 没有进行中的序列时调用分类器选出序列（intent:<名> → begin（仅启动时）→ default → 直接结束）
//! - 用户新消息总是触发重新分类，序列只会因 next() 或子对话结束而前进
//! - next() 在同一回合内循环执行下一步，不返回宿主，也不递归
//!
//! 路由器自身没有可变状态，所有状态都在宿主持有的实例 JSON 中，可跨会话并发共享。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::step::{Step, WaterfallStep};
use super::types::{RouterPolicy, SequenceKey, StepOutcome, StepReason, WaterfallState, RECOGNIZER_RESULT};
use crate::classifier::{IntentClassifier, RecognizerResult};
use crate::core::DialogError;
use crate::dialog::{Dialog, DialogReason, DialogTurnResult, TurnContext};

/// 意图路由的瀑布对话
pub struct IntentDialog {
    id: String,
    classifier: Arc<dyn IntentClassifier>,
    policy: RouterPolicy,
    /// 按注册顺序保存
    sequences: Vec<(SequenceKey, Vec<Arc<dyn Step>>)>,
}

impl IntentDialog {
    pub fn new(id: impl Into<String>, classifier: Arc<dyn IntentClassifier>) -> Self {
        Self {
            id: id.into(),
            classifier,
            policy: RouterPolicy::default(),
            sequences: Vec::new(),
        }
    }

    /// 替换意图选择策略（阈值 / 默认标签）
    pub fn with_policy(mut self, policy: RouterPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// 启动时没有匹配意图执行的序列
    pub fn on_begin(self, steps: Vec<Arc<dyn Step>>) -> Self {
        self.register(SequenceKey::Begin, steps)
    }

    /// 最高意图为 `intent` 时执行的序列
    pub fn matches(self, intent: impl Into<String>, steps: Vec<Arc<dyn Step>>) -> Self {
        self.register(SequenceKey::Intent(intent.into()), steps)
    }

    /// 没有匹配序列时执行的序列
    pub fn on_default(self, steps: Vec<Arc<dyn Step>>) -> Self {
        self.register(SequenceKey::Default, steps)
    }

    /// 同一键重复注册时后者覆盖（保留原注册位置）
    fn register(mut self, key: SequenceKey, steps: Vec<Arc<dyn Step>>) -> Self {
        if let Some(entry) = self.sequences.iter_mut().find(|(k, _)| *k == key) {
            tracing::warn!("Dialog '{}': sequence '{}' registered twice, last one wins", self.id, key);
            entry.1 = steps;
        } else {
            self.sequences.push((key, steps));
        }
        self
    }

    /// 已注册的序列键（注册顺序）
    pub fn sequence_keys(&self) -> impl Iterator<Item = &SequenceKey> {
        self.sequences.iter().map(|(k, _)| k)
    }

    pub fn sequence(&self, key: &SequenceKey) -> Option<&[Arc<dyn Step>]> {
        self.sequences
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, steps)| steps.as_slice())
    }

    fn has(&self, key: &SequenceKey) -> bool {
        self.sequence(key).is_some()
    }

    /// 分类并选出序列；None 表示没有可执行的序列
    async fn select_sequence(
        &self,
        ctx: &TurnContext,
        reason: StepReason,
        trigger: &Value,
    ) -> Result<Option<(SequenceKey, Option<RecognizerResult>)>, DialogError> {
        let text = match trigger {
            Value::String(text) => text.as_str(),
            _ => ctx.text(),
        };
        let starting = reason == StepReason::Started;

        // 启动时没有可分类的文本：直接进入 begin
        if starting && text.trim().is_empty() && self.has(&SequenceKey::Begin) {
            return Ok(Some((SequenceKey::Begin, None)));
        }

        let recognized = self.classifier.classify(ctx, text).await?;
        let top = recognized.top_intent(&self.policy.default_label, self.policy.confidence_floor);
        tracing::debug!("Dialog '{}': '{}' classified as '{}'", self.id, text, top);

        let candidates = [
            Some(SequenceKey::Intent(top)),
            starting.then_some(SequenceKey::Begin),
            Some(SequenceKey::Default),
        ];
        let selected = candidates.into_iter().flatten().find(|key| self.has(key));
        Ok(selected.map(|key| (key, Some(recognized))))
    }

    /// 执行当前步骤；next() 时在同一回合内继续执行下一步
    async fn run_step(
        &self,
        ctx: &TurnContext,
        state: &mut WaterfallState,
        mut reason: StepReason,
        mut trigger: Value,
    ) -> Result<DialogTurnResult, DialogError> {
        loop {
            let in_progress = state
                .active
                .as_ref()
                .and_then(|key| self.sequence(key))
                .is_some_and(|steps| state.step_index < steps.len());

            if !in_progress {
                let Some((key, recognized)) = self.select_sequence(ctx, reason, &trigger).await? else {
                    tracing::debug!("Dialog '{}': no sequence matched, ending with trigger", self.id);
                    return Ok(DialogTurnResult::Complete(trigger));
                };
                tracing::debug!("Dialog '{}': selected sequence '{}'", self.id, key);
                state.active = Some(key);
                state.step_index = 0;
                if let Some(recognized) = recognized {
                    state
                        .values
                        .insert(RECOGNIZER_RESULT.to_string(), serde_json::to_value(&recognized)?);
                }
            }

            let Some(key) = state.active.clone() else {
                return Ok(DialogTurnResult::Complete(trigger));
            };
            let Some(step_impl) = self.sequence(&key).and_then(|steps| steps.get(state.step_index)) else {
                return Ok(DialogTurnResult::Complete(trigger));
            };

            let mut step = WaterfallStep::new(
                ctx.clone(),
                self.id.clone(),
                key,
                state.step_index,
                reason,
                trigger,
                state.options.clone(),
                std::mem::take(&mut state.values),
            );
            let outcome = step_impl.run(&mut step).await;
            let misuse = step.advance_misuse(&outcome);
            state.values = step.into_values();
            if let Some(err) = misuse {
                return Err(err);
            }

            match outcome? {
                StepOutcome::End(value) => return Ok(DialogTurnResult::Complete(value)),
                StepOutcome::Wait => return Ok(DialogTurnResult::Waiting),
                StepOutcome::BeginDialog { dialog_id, options } => {
                    return Ok(DialogTurnResult::BeginChild { dialog_id, options })
                }
                StepOutcome::CancelAll => return Ok(DialogTurnResult::CancelAll),
                StepOutcome::Next(advanced) => {
                    state.step_index += 1;
                    reason = StepReason::Advanced;
                    trigger = advanced.into_value();
                }
            }
        }
    }

    /// 运行步骤并把状态写回宿主 JSON（出错时也写回，便于宿主检查）
    async fn run_and_store(
        &self,
        ctx: &TurnContext,
        state: &mut Value,
        mut waterfall: WaterfallState,
        reason: StepReason,
        trigger: Value,
    ) -> Result<DialogTurnResult, DialogError> {
        let result = self.run_step(ctx, &mut waterfall, reason, trigger).await;
        waterfall.store(state)?;
        result
    }
}

#[async_trait]
impl Dialog for IntentDialog {
    fn id(&self) -> &str {
        &self.id
    }

    async fn begin(
        &self,
        ctx: &TurnContext,
        state: &mut Value,
        options: Value,
    ) -> Result<DialogTurnResult, DialogError> {
        let waterfall = WaterfallState::started(options);
        self.run_and_store(ctx, state, waterfall, StepReason::Started, ctx.text_value())
            .await
    }

    async fn continue_dialog(
        &self,
        ctx: &TurnContext,
        state: &mut Value,
    ) -> Result<DialogTurnResult, DialogError> {
        if !ctx.activity().is_message() {
            return Ok(DialogTurnResult::Waiting);
        }

        // 新消息不会推进旧序列：把索引推到序列末尾，强制重新分类
        let mut waterfall = WaterfallState::load(state)?;
        waterfall.step_index = waterfall
            .active
            .as_ref()
            .and_then(|key| self.sequence(key))
            .map_or(0, |steps| steps.len());
        self.run_and_store(ctx, state, waterfall, StepReason::Continued, ctx.text_value())
            .await
    }

    async fn resume(
        &self,
        ctx: &TurnContext,
        state: &mut Value,
        reason: DialogReason,
        result: Value,
    ) -> Result<DialogTurnResult, DialogError> {
        let mut waterfall = WaterfallState::load(state)?;
        waterfall.step_index += 1;
        self.run_and_store(ctx, state, waterfall, StepReason::Resumed(reason), result)
            .await
    }
}

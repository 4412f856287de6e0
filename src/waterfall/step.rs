//! 步骤与步骤调用上下文
//!
//! 每次执行一个步骤都会构造一个 WaterfallStep：携带启动参数、值袋、序号、调用原因、
//! 触发值，以及只能使用一次的 next() 前进能力。

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use super::types::{Advanced, SequenceKey, StepOutcome, StepReason, RECOGNIZER_RESULT};
use crate::classifier::RecognizerResult;
use crate::core::DialogError;
use crate::dialog::TurnContext;

/// 一次步骤执行的上下文
pub struct WaterfallStep {
    ctx: TurnContext,
    dialog_id: String,
    sequence: SequenceKey,
    index: usize,
    reason: StepReason,
    result: Value,
    options: Value,
    values: Map<String, Value>,
    next_called: bool,
    double_advance: bool,
}

impl WaterfallStep {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        ctx: TurnContext,
        dialog_id: String,
        sequence: SequenceKey,
        index: usize,
        reason: StepReason,
        result: Value,
        options: Value,
        values: Map<String, Value>,
    ) -> Self {
        Self {
            ctx,
            dialog_id,
            sequence,
            index,
            reason,
            result,
            options,
            values,
            next_called: false,
            double_advance: false,
        }
    }

    /// 当前回合上下文（发送回复）
    pub fn context(&self) -> &TurnContext {
        &self.ctx
    }

    pub fn dialog_id(&self) -> &str {
        &self.dialog_id
    }

    /// 正在执行的序列
    pub fn sequence(&self) -> &SequenceKey {
        &self.sequence
    }

    /// 步骤在序列中的序号
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn reason(&self) -> StepReason {
        self.reason
    }

    /// 触发本步骤的值：输入文本、上一步 next() 的值或子对话结果
    pub fn result(&self) -> &Value {
        &self.result
    }

    pub fn options(&self) -> &Value {
        &self.options
    }

    /// 把启动参数反序列化为具体类型
    pub fn options_as<T: DeserializeOwned>(&self) -> Result<T, DialogError> {
        Ok(serde_json::from_value(self.options.clone())?)
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.values
    }

    /// 读取值袋中的类型化值
    pub fn value<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, DialogError> {
        match self.values.get(name) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    /// 写入值袋
    pub fn set_value<T: Serialize>(&mut self, name: &str, value: &T) -> Result<(), DialogError> {
        self.values.insert(name.to_string(), serde_json::to_value(value)?);
        Ok(())
    }

    /// 最近一次分类结果
    pub fn recognizer_result(&self) -> Result<Option<RecognizerResult>, DialogError> {
        self.value(RECOGNIZER_RESULT)
    }

    pub async fn send_text(&self, text: impl Into<String>) {
        self.ctx.send_text(text).await;
    }

    /// 结束当前步骤并在同一回合内前进到下一步。每次执行只能调用一次，
    /// 第二次调用返回 AdvanceAlreadyCalled，且路由器在步骤返回后仍会报告该错误。
    /// 返回值必须作为步骤结果交还，否则路由器报告 AdvanceDiscarded。
    #[must_use = "return the outcome from the step to advance the waterfall"]
    pub fn next(&mut self, value: Value) -> Result<StepOutcome, DialogError> {
        if self.next_called {
            self.double_advance = true;
            return Err(self.advance_error());
        }
        self.next_called = true;
        Ok(StepOutcome::Next(Advanced::new(value)))
    }

    pub(crate) fn advance_error(&self) -> DialogError {
        DialogError::AdvanceAlreadyCalled {
            dialog: self.dialog_id.clone(),
            sequence: self.sequence.to_string(),
            index: self.index,
        }
    }

    /// 调用过 next() 但步骤结果不是 Next
    fn discarded_advance(&self, outcome: &Result<StepOutcome, DialogError>) -> bool {
        self.next_called && matches!(outcome, Ok(o) if !matches!(o, StepOutcome::Next(_)))
    }

    /// 步骤使用 next() 的方式有误时返回对应错误
    pub(crate) fn advance_misuse(&self, outcome: &Result<StepOutcome, DialogError>) -> Option<DialogError> {
        if self.double_advance {
            return Some(self.advance_error());
        }
        self.discarded_advance(outcome).then(|| DialogError::AdvanceDiscarded {
            dialog: self.dialog_id.clone(),
            sequence: self.sequence.to_string(),
            index: self.index,
        })
    }

    /// 交还值袋
    pub(crate) fn into_values(self) -> Map<String, Value> {
        self.values
    }
}

/// 步骤：读写值袋、发送回复、调用外部服务，然后返回一个结果
#[async_trait]
pub trait Step: Send + Sync {
    async fn run(&self, step: &mut WaterfallStep) -> Result<StepOutcome, DialogError>;
}

pub type StepFuture<'a> = BoxFuture<'a, Result<StepOutcome, DialogError>>;

struct FnStep<F>(F);

#[async_trait]
impl<F> Step for FnStep<F>
where
    F: for<'a> Fn(&'a mut WaterfallStep) -> StepFuture<'a> + Send + Sync,
{
    async fn run(&self, step: &mut WaterfallStep) -> Result<StepOutcome, DialogError> {
        (self.0)(step).await
    }
}

/// 用闭包定义步骤：`step_fn(|step| Box::pin(async move { ... }))`
pub fn step_fn<F>(f: F) -> Arc<dyn Step>
where
    F: for<'a> Fn(&'a mut WaterfallStep) -> StepFuture<'a> + Send + Sync + 'static,
{
    Arc::new(FnStep(f))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialog::Activity;
    use serde_json::json;

    fn invocation() -> WaterfallStep {
        WaterfallStep::new(
            TurnContext::new(Activity::message("c1", "u", "hi")),
            "root".to_string(),
            SequenceKey::intent("Foo"),
            2,
            StepReason::Started,
            json!("hi"),
            json!({ "question": "Sure?" }),
            Map::new(),
        )
    }

    #[test]
    fn test_next_once() {
        let mut step = invocation();
        let outcome = step.next(json!(42));
        assert!(step.advance_misuse(&outcome).is_none());
        assert_eq!(outcome.unwrap(), StepOutcome::Next(Advanced::new(json!(42))));
    }

    #[test]
    fn test_next_twice_fails() {
        let mut step = invocation();
        let first = step.next(json!(1)).unwrap();
        let err = step.next(json!(2)).unwrap_err();
        assert!(matches!(
            err,
            DialogError::AdvanceAlreadyCalled { ref dialog, ref sequence, index: 2 }
                if dialog == "root" && sequence == "intent:Foo"
        ));
        assert!(matches!(
            step.advance_misuse(&Ok(first)),
            Some(DialogError::AdvanceAlreadyCalled { .. })
        ));
    }

    #[test]
    fn test_discarded_next_is_misuse() {
        let mut step = invocation();
        let _ = step.next(json!(1));
        assert!(matches!(
            step.advance_misuse(&Ok(StepOutcome::Wait)),
            Some(DialogError::AdvanceDiscarded { index: 2, .. })
        ));
        assert!(step.advance_misuse(&Err(DialogError::step("boom"))).is_none());
    }

    #[test]
    fn test_typed_values() {
        #[derive(Serialize, serde::Deserialize, PartialEq, Debug)]
        struct Pick {
            show: String,
            season: u32,
        }

        let mut step = invocation();
        assert_eq!(step.value::<Pick>("pick").unwrap(), None);

        let pick = Pick {
            show: "Dark".into(),
            season: 2,
        };
        step.set_value("pick", &pick).unwrap();
        assert_eq!(step.value::<Pick>("pick").unwrap(), Some(pick));
        assert!(step.value::<u32>("pick").is_err());
    }

    #[test]
    fn test_options_as() {
        #[derive(serde::Deserialize)]
        struct Options {
            question: String,
        }
        let step = invocation();
        let options: Options = step.options_as().unwrap();
        assert_eq!(options.question, "Sure?");
    }

    #[tokio::test]
    async fn test_step_fn_runs_closure() {
        let step_impl = step_fn(|step| {
            Box::pin(async move {
                step.send_text("hello").await;
                step.set_value("seen", &true)?;
                Ok::<_, DialogError>(StepOutcome::Wait)
            })
        });

        let mut step = invocation();
        let outcome = step_impl.run(&mut step).await.unwrap();
        assert_eq!(outcome, StepOutcome::Wait);
        assert_eq!(step.value::<bool>("seen").unwrap(), Some(true));
        assert!(step.context().responded().await);
    }
}

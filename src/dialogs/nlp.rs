//! 意图与实体名（与 [[classifier.rules]] / LUIS 模型中的标签一致）

pub const INTENT_HI: &str = "Education_Hi";
pub const INTENT_THX: &str = "Education_Thx";
pub const INTENT_BYE: &str = "Education_Bye";
pub const INTENT_RECOMMENDATIONS: &str = "Shows_Recommendations";
pub const INTENT_CANCEL: &str = "Command_Cancel";
pub const INTENT_HELP: &str = "Command_Help";
pub const INTENT_YES: &str = "Confirmation_Yes";
pub const INTENT_NO: &str = "Confirmation_No";


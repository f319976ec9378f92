//! 外部决策源的引擎侧适配：提案解析、校验与确定性替补。

pub mod fallback;
pub mod proposal;

pub use fallback::{
    batch_all_in,
    creature_charge,
    default_turn_decision,
    has_any_action,
    resolve_fizzle,
    turn_pass,
};
pub use proposal::{
    extract_json_object,
    parse_batch_decision,
    parse_creature_decision,
    parse_resolve_decision,
    parse_turn_decision,
    BatchDecision,
    CreatureAction,
    CreatureDecision,
    ResolveDecision,
    TurnAction,
    TurnDecision,
};

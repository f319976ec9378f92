//! 游戏核心：状态模型、变更应用器、回合推进器与持续效果。

pub mod catalog;
pub mod changes;
pub mod effects;
pub mod rules;
pub mod state;

pub use changes::{ChangeApplicator, ChangeTarget, StateChange};
pub use effects::{
    can_creature_attack,
    effective_cost,
    process_effect_trigger,
    ActiveEffect,
    EffectSpec,
    EffectTarget,
    EffectTrigger,
    EffectType,
};
pub use rules::{AttackOrder, AttackTarget, RuleEngine, RuleError, RuleResolution};
pub use state::{
    Actor,
    BaseStats,
    Card,
    CardKind,
    Creature,
    EconomyMode,
    EffectId,
    GameConfig,
    GameEvent,
    GameState,
    InstanceId,
    IntegrityError,
    Phase,
    PlayerState,
    Role,
    StatusEffect,
    TargetKind,
};

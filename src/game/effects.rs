//! 延迟/持续效果的生命周期：创建、按触发器翻译成状态变更、倒数与回收。

use serde::{Deserialize, Serialize};

use super::changes::{ChangeApplicator, ChangeTarget, StateChange};
use super::state::{Card, EffectId, GameState, InstanceId, Role, StatusEffect};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EffectTrigger {
    StartOfTurn,
    EndOfTurn,
    OnDamage,
    OnPlay,
    Passive,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EffectType {
    Damage,
    Heal,
    Buff,
    Debuff,
    Draw,
    PreventAttack,
    ModifyCost,
    Custom,
}

/// 效果的作用对象：单个英雄、单个生物、一侧或双方的所有生物、或全局。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EffectTarget {
    Role {
        role: Role,
    },
    Creature {
        instance_id: InstanceId,
    },
    AllCreatures {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        side: Option<Role>,
    },
    Global,
}

/// `apply_effect` 变更携带的描述；id 与创建回合由状态分配。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EffectSpec {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub source_card: String,
    pub owner: Role,
    pub target: EffectTarget,
    pub trigger: EffectTrigger,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turns_remaining: Option<u8>,
    pub effect_type: EffectType,
    #[serde(default)]
    pub magnitude: i16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActiveEffect {
    pub id: EffectId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub source_card: String,
    pub owner: Role,
    pub target: EffectTarget,
    pub trigger: EffectTrigger,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turns_remaining: Option<u8>,
    pub created_turn: u32,
    pub effect_type: EffectType,
    #[serde(default)]
    pub magnitude: i16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl ActiveEffect {
    pub fn from_spec(spec: EffectSpec, id: EffectId, created_turn: u32) -> ActiveEffect {
        ActiveEffect {
            id,
            name: spec.name,
            description: spec.description,
            source_card: spec.source_card,
            owner: spec.owner,
            target: spec.target,
            trigger: spec.trigger,
            turns_remaining: spec.turns_remaining,
            created_turn,
            effect_type: spec.effect_type,
            magnitude: spec.magnitude,
            payload: spec.payload,
        }
    }

    fn applies_to_creature(&self, side: Role, instance_id: InstanceId) -> bool {
        match self.target {
            EffectTarget::Creature { instance_id: id } => id == instance_id,
            EffectTarget::AllCreatures { side: None } | EffectTarget::Global => true,
            EffectTarget::AllCreatures { side: Some(s) } => s == side,
            EffectTarget::Role { .. } => false,
        }
    }
}

/// 结算某一触发类别：匹配 (trigger, owner) 的效果翻译成变更并应用，
/// 然后倒数并移除归零的效果。返回实际生效的变更。
pub fn process_effect_trigger(
    state: &mut GameState,
    trigger: EffectTrigger,
    role: Role,
    applicator: &mut ChangeApplicator,
) -> Vec<StateChange> {
    let pending: Vec<StateChange> = state
        .active_effects
        .iter()
        .filter(|e| e.trigger == trigger && e.owner == role)
        .flat_map(|e| translate(e, state))
        .collect();

    let applied = applicator.apply(state, &pending);
    age_effects(state, trigger, role);
    applied
}

/// 把一个效果翻译成零或多条状态变更。对沉默生物的定向效果被跳过。
fn translate(effect: &ActiveEffect, state: &GameState) -> Vec<StateChange> {
    let role_targets: Vec<Role> = match effect.target {
        EffectTarget::Role { role } => vec![role],
        EffectTarget::Global => vec![Role::Player, Role::Opponent],
        _ => Vec::new(),
    };
    let creature_targets: Vec<InstanceId> = match effect.target {
        EffectTarget::Creature { instance_id } => state
            .find_creature(instance_id)
            .filter(|(_, c)| !c.has_status(StatusEffect::Silenced))
            .map(|(_, c)| c.instance_id)
            .into_iter()
            .collect(),
        EffectTarget::AllCreatures { side } => {
            let sides = match side {
                Some(s) => vec![s],
                None => vec![Role::Player, Role::Opponent],
            };
            sides
                .into_iter()
                .flat_map(|s| state.side(s).field.iter())
                .filter(|c| !c.has_status(StatusEffect::Silenced))
                .map(|c| c.instance_id)
                .collect()
        }
        _ => Vec::new(),
    };

    match effect.effect_type {
        EffectType::Damage => role_targets
            .iter()
            .map(|r| StateChange::Damage {
                target: ChangeTarget::Role(*r),
                value: effect.magnitude,
            })
            .chain(creature_targets.iter().map(|id| StateChange::Damage {
                target: ChangeTarget::Creature(*id),
                value: effect.magnitude,
            }))
            .collect(),
        EffectType::Heal => role_targets
            .iter()
            .map(|r| StateChange::Heal {
                target: ChangeTarget::Role(*r),
                value: effect.magnitude,
            })
            // 英雄以外的治疗走生物生命增益
            .chain(creature_targets.iter().map(|id| StateChange::Buff {
                target: ChangeTarget::Creature(*id),
                value: None,
                attack: Some(0),
                health: Some(effect.magnitude),
            }))
            .collect(),
        EffectType::Buff => creature_targets
            .iter()
            .map(|id| StateChange::Buff {
                target: ChangeTarget::Creature(*id),
                value: Some(effect.magnitude),
                attack: None,
                health: None,
            })
            .collect(),
        EffectType::Debuff => creature_targets
            .iter()
            .map(|id| StateChange::Debuff {
                target: ChangeTarget::Creature(*id),
                value: Some(effect.magnitude),
                attack: None,
                health: None,
            })
            .collect(),
        EffectType::Draw => role_targets
            .iter()
            .map(|r| StateChange::Draw {
                target: *r,
                value: effect.magnitude.max(1) as u8,
            })
            .collect(),
        // 被动效果只在读取端起作用
        EffectType::PreventAttack | EffectType::ModifyCost => Vec::new(),
        EffectType::Custom => effect
            .payload
            .clone()
            .and_then(|value| serde_json::from_value::<Vec<StateChange>>(value).ok())
            .unwrap_or_default(),
    }
}

/// 触发后的老化：匹配的效果倒数一次；被动效果在所有者回合结束时老化。
/// 归零的效果被移除并从生物的引用列表中解除。
fn age_effects(state: &mut GameState, trigger: EffectTrigger, role: Role) {
    let mut expired: Vec<EffectId> = Vec::new();
    for effect in &mut state.active_effects {
        let fired = effect.owner == role
            && (effect.trigger == trigger
                || (trigger == EffectTrigger::EndOfTurn && effect.trigger == EffectTrigger::Passive));
        if !fired {
            continue;
        }
        if let Some(turns) = effect.turns_remaining.as_mut() {
            *turns = turns.saturating_sub(1);
            if *turns == 0 {
                expired.push(effect.id);
            }
        }
    }
    if expired.is_empty() {
        return;
    }
    state.active_effects.retain(|e| !expired.contains(&e.id));
    for side in [Role::Player, Role::Opponent] {
        for creature in &mut state.side_mut(side).field {
            creature.applied_effects.retain(|id| !expired.contains(id));
        }
    }
}

/// 读取端查询：综合自身状态与 `prevent_attack` 被动效果判断能否进攻。
pub fn can_creature_attack(state: &GameState, instance_id: InstanceId) -> bool {
    let Some((side, creature)) = state.find_creature(instance_id) else {
        return false;
    };
    if !creature.can_attack || creature.has_status(StatusEffect::Frozen) {
        return false;
    }
    !state
        .active_effects
        .iter()
        .any(|e| e.effect_type == EffectType::PreventAttack && e.applies_to_creature(side, instance_id))
}

/// 读取端查询：`modify_cost` 被动效果叠加后的出牌费用，下限为 0。
pub fn effective_cost(state: &GameState, role: Role, card: &Card) -> u8 {
    let mut cost = card.cost as i16;
    for effect in &state.active_effects {
        if effect.effect_type != EffectType::ModifyCost || effect.owner != role {
            continue;
        }
        let in_scope = match effect.target {
            EffectTarget::Role { role: r } => r == role,
            EffectTarget::Global => true,
            _ => false,
        };
        if in_scope {
            cost += effect.magnitude;
        }
    }
    cost.clamp(0, i16::from(u8::MAX)) as u8
}

//! 解析并校验外部生成器给出的提案。生成器被视为不可信的神谕：
//! 原始输出是任意文本，其中应当恰好包含一个 JSON 对象；每个索引、
//! 目标与标签都要先核对，站不住脚的提案换成安全的替补动作。

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ai::fallback;
use crate::game::{
    effective_cost, AttackOrder, AttackTarget, Card, ChangeTarget, Creature, EconomyMode,
    EffectSpec, GameState, InstanceId, Role, StateChange, StatusEffect,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TurnAction {
    Play,
    EndTurn,
}

impl FromStr for TurnAction {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "play" => Ok(TurnAction::Play),
            "end_turn" | "pass" => Ok(TurnAction::EndTurn),
            _ => Err(()),
        }
    }
}

/// 出牌阶段的决定：打出某张手牌，或让过这一回合。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TurnDecision {
    pub action: TurnAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_index: Option<usize>,
    pub narrative: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CreatureAction {
    AttackCreature,
    AttackHero,
    Special,
}

impl FromStr for CreatureAction {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "attack_creature" => Ok(CreatureAction::AttackCreature),
            "attack_hero" => Ok(CreatureAction::AttackHero),
            "special" => Ok(CreatureAction::Special),
            _ => Err(()),
        }
    }
}

/// 单个生物的行动决定。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreatureDecision {
    pub action: CreatureAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<InstanceId>,
    pub narrative: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changes: Vec<StateChange>,
}

/// 整轮攻击的批量决定。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchDecision {
    pub narrative: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attacks: Vec<AttackOrder>,
}

/// 法术效果或生物入场效果的结算提案。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResolveDecision {
    pub narrative: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changes: Vec<StateChange>,
}

/// 在任意文本里定位那个 JSON 对象：第一个 `{` 到最后一个 `}`。
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// 生成器线上格式的宽松镜像；所有字段都可缺省。
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawProposal {
    action: Option<String>,
    #[serde(alias = "cardIndex")]
    card_index: Option<usize>,
    #[serde(alias = "targetId")]
    target_id: Option<Value>,
    narrative: Option<String>,
    changes: Vec<RawChange>,
    attacks: Vec<RawAttack>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawChange {
    #[serde(rename = "type")]
    change_type: Option<String>,
    target: Option<Value>,
    #[serde(alias = "targetId")]
    target_id: Option<Value>,
    value: Option<i64>,
    attack: Option<i64>,
    health: Option<i64>,
    status: Option<String>,
    card: Option<Value>,
    owner: Option<String>,
    effect: Option<Value>,
    #[serde(alias = "effectId")]
    effect_id: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawAttack {
    #[serde(alias = "attackerId")]
    attacker_id: Option<Value>,
    #[serde(alias = "targetId")]
    target_id: Option<Value>,
}

fn parse_raw(text: &str) -> Option<RawProposal> {
    let json = extract_json_object(text)?;
    serde_json::from_str(json).ok()
}

/// 实例编号可能以数字或数字字符串出现。
fn as_instance_id(value: &Value) -> Option<InstanceId> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_role(value: &Value) -> Option<Role> {
    match value.as_str()? {
        "player" => Some(Role::Player),
        "opponent" => Some(Role::Opponent),
        _ => None,
    }
}

fn role_from_str(value: &str) -> Option<Role> {
    as_role(&Value::String(value.into()))
}

/// 目标解析只发生在这里一次：角色名、`creature` 加编号、或裸编号。
fn change_target(raw: &RawChange) -> Option<ChangeTarget> {
    match &raw.target {
        Some(value) => {
            if let Some(role) = as_role(value) {
                return Some(ChangeTarget::Role(role));
            }
            if value.as_str() == Some("creature") {
                return raw
                    .target_id
                    .as_ref()
                    .and_then(as_instance_id)
                    .map(ChangeTarget::Creature);
            }
            as_instance_id(value).map(ChangeTarget::Creature)
        }
        None => raw
            .target_id
            .as_ref()
            .and_then(as_instance_id)
            .map(ChangeTarget::Creature),
    }
}

fn creature_target(raw: &RawChange) -> Option<ChangeTarget> {
    match change_target(raw)? {
        target @ ChangeTarget::Creature(_) => Some(target),
        ChangeTarget::Role(_) => None,
    }
}

fn role_target(raw: &RawChange) -> Option<Role> {
    match change_target(raw)? {
        ChangeTarget::Role(role) => Some(role),
        ChangeTarget::Creature(_) => None,
    }
}

fn count_of(raw: &RawChange) -> u8 {
    raw.value.unwrap_or(1).clamp(0, i64::from(u8::MAX)) as u8
}

fn amount_of(raw: &RawChange) -> i16 {
    raw.value
        .unwrap_or(0)
        .clamp(i64::from(i16::MIN), i64::from(i16::MAX)) as i16
}

fn delta(value: Option<i64>) -> Option<i16> {
    value.map(|v| v.clamp(i64::from(i16::MIN), i64::from(i16::MAX)) as i16)
}

fn status_of(raw: &RawChange) -> Option<StatusEffect> {
    let name = raw.status.as_deref()?;
    serde_json::from_value(Value::String(name.to_ascii_lowercase())).ok()
}

/// 一条原始变更归一化为引擎词汇；认不出的标签直接丢弃。
fn normalize_change(raw: &RawChange) -> Option<StateChange> {
    let change_type = raw.change_type.as_deref()?;
    match change_type {
        "damage" => Some(StateChange::Damage {
            target: change_target(raw)?,
            value: amount_of(raw),
        }),
        "heal" => Some(StateChange::Heal {
            target: change_target(raw)?,
            value: amount_of(raw),
        }),
        "destroy" => Some(StateChange::Destroy {
            target: creature_target(raw)?,
        }),
        "buff" => Some(StateChange::Buff {
            target: creature_target(raw)?,
            value: delta(raw.value),
            attack: delta(raw.attack),
            health: delta(raw.health),
        }),
        "debuff" => Some(StateChange::Debuff {
            target: creature_target(raw)?,
            value: delta(raw.value),
            attack: delta(raw.attack),
            health: delta(raw.health),
        }),
        "draw" => Some(StateChange::Draw {
            target: role_target(raw)?,
            value: count_of(raw),
        }),
        "discard" => Some(StateChange::Discard {
            target: role_target(raw)?,
            value: count_of(raw),
        }),
        "mill" => Some(StateChange::Mill {
            target: role_target(raw)?,
            value: count_of(raw),
        }),
        "apply_status" => Some(StateChange::ApplyStatus {
            target: creature_target(raw)?,
            status: status_of(raw)?,
        }),
        "remove_status" => Some(StateChange::RemoveStatus {
            target: creature_target(raw)?,
            status: status_of(raw)?,
        }),
        "add_shield" => Some(StateChange::AddShield {
            target: creature_target(raw)?,
            value: amount_of(raw),
        }),
        "summon" => Some(StateChange::Summon {
            target: role_target(raw)?,
            card: serde_json::from_value::<Card>(raw.card.clone()?).ok()?,
        }),
        "steal_creature" => Some(StateChange::StealCreature {
            target: creature_target(raw)?,
        }),
        "transform" => Some(StateChange::Transform {
            target: creature_target(raw)?,
            card: serde_json::from_value::<Card>(raw.card.clone()?).ok()?,
        }),
        "copy_creature" => Some(StateChange::CopyCreature {
            target: creature_target(raw)?,
            owner: raw.owner.as_deref().and_then(role_from_str)?,
        }),
        "bounce" => Some(StateChange::Bounce {
            target: creature_target(raw)?,
        }),
        "apply_effect" => Some(StateChange::ApplyEffect {
            effect: serde_json::from_value::<EffectSpec>(raw.effect.clone()?).ok()?,
        }),
        "remove_effect" => Some(StateChange::RemoveEffect {
            effect_id: raw.effect_id.as_ref().and_then(as_instance_id)?,
        }),
        _ => None,
    }
}

fn normalize_changes(raw: Vec<RawChange>) -> Vec<StateChange> {
    raw.iter().filter_map(normalize_change).collect()
}

fn is_affordable(state: &GameState, role: Role, hand_index: usize) -> bool {
    let Some(card) = state.side(role).hand.get(hand_index) else {
        return false;
    };
    match state.config.economy {
        EconomyMode::Mana => effective_cost(state, role, card) <= state.side(role).mana,
        EconomyMode::SinglePlay => !state.played_card_this_turn,
    }
}

/// 解析出牌阶段的提案，核对索引与费用；站不住的提案退成让过。
pub fn parse_turn_decision(text: &str, state: &GameState, role: Role) -> TurnDecision {
    let Some(raw) = parse_raw(text) else {
        return fallback::turn_pass();
    };
    let Some(action) = raw.action.as_deref().and_then(|s| TurnAction::from_str(s).ok()) else {
        return fallback::turn_pass();
    };

    match action {
        TurnAction::EndTurn => TurnDecision {
            action: TurnAction::EndTurn,
            card_index: None,
            narrative: raw
                .narrative
                .unwrap_or_else(|| fallback::turn_pass().narrative),
        },
        TurnAction::Play => match raw.card_index {
            Some(index) if is_affordable(state, role, index) => TurnDecision {
                action: TurnAction::Play,
                card_index: Some(index),
                narrative: raw
                    .narrative
                    .unwrap_or_else(|| fallback::turn_pass().narrative),
            },
            _ => fallback::turn_invalid_play(),
        },
    }
}

/// 解析单个生物的行动；指向不存在生物的攻击退成直扑英雄。
pub fn parse_creature_decision(
    text: &str,
    state: &GameState,
    owner: Role,
    attacker: &Creature,
) -> CreatureDecision {
    let Some(raw) = parse_raw(text) else {
        return fallback::creature_charge();
    };
    let Some(action) = raw
        .action
        .as_deref()
        .and_then(|s| CreatureAction::from_str(s).ok())
    else {
        return fallback::creature_charge();
    };
    let narrative = raw
        .narrative
        .unwrap_or_else(|| fallback::creature_charge().narrative);

    match action {
        CreatureAction::AttackHero => CreatureDecision {
            action: CreatureAction::AttackHero,
            target_id: None,
            narrative,
            changes: Vec::new(),
        },
        CreatureAction::AttackCreature => {
            let target = raw
                .target_id
                .as_ref()
                .and_then(as_instance_id)
                .filter(|id| state.side(owner.rival()).find_creature(*id).is_some());
            match target {
                Some(target_id) => CreatureDecision {
                    action: CreatureAction::AttackCreature,
                    target_id: Some(target_id),
                    narrative,
                    changes: Vec::new(),
                },
                None => fallback::creature_redirect(&attacker.card.name),
            }
        }
        CreatureAction::Special => CreatureDecision {
            action: CreatureAction::Special,
            target_id: raw.target_id.as_ref().and_then(as_instance_id),
            narrative,
            changes: normalize_changes(raw.changes),
        },
    }
}

/// 解析批量攻击：攻击者必须站在己方场上，生物目标必须在敌方场上；
/// 其余的合法性（疲惫、冰冻、嘲讽）留给推进器逐条裁决。
pub fn parse_batch_decision(text: &str, state: &GameState, role: Role) -> BatchDecision {
    let Some(raw) = parse_raw(text) else {
        return fallback::batch_all_in(state, role);
    };
    let attacks: Vec<AttackOrder> = raw
        .attacks
        .iter()
        .filter_map(|attack| {
            let attacker = attack.attacker_id.as_ref().and_then(as_instance_id)?;
            state.side(role).find_creature(attacker)?;
            let target = match attack.target_id.as_ref() {
                Some(Value::String(s)) if s == "hero" => AttackTarget::Hero,
                Some(value) => {
                    let instance_id = as_instance_id(value)?;
                    state.side(role.rival()).find_creature(instance_id)?;
                    AttackTarget::Creature { instance_id }
                }
                None => AttackTarget::Hero,
            };
            Some(AttackOrder { attacker, target })
        })
        .collect();

    BatchDecision {
        narrative: raw
            .narrative
            .unwrap_or_else(|| fallback::batch_all_in(state, role).narrative),
        attacks,
    }
}

/// 解析效果结算提案；没有可用的 JSON 时退成一次哑火。
pub fn parse_resolve_decision(text: &str) -> ResolveDecision {
    let Some(raw) = parse_raw(text) else {
        return fallback::resolve_fizzle();
    };
    ResolveDecision {
        narrative: raw
            .narrative
            .unwrap_or_else(|| fallback::resolve_fizzle().narrative),
        changes: normalize_changes(raw.changes),
    }
}

//! 原子状态变更的词汇表与应用器。生成器提出的一切改动都从这里过。

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::effects::{ActiveEffect, EffectSpec, EffectTarget};
use super::state::{Card, Creature, EffectId, GameState, InstanceId, Role, StatusEffect};

/// 变更的作用对象：席位或生物实例，在构造时就已解析完毕。
/// 线上形式：角色字符串或实例编号。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ChangeTarget {
    Role(Role),
    Creature(InstanceId),
}

fn default_count() -> u8 {
    1
}

/// 生成器可提出的全部原子变更。未知标签落入 [`StateChange::Unknown`]，
/// 应用时被忽略而不是报错。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateChange {
    Damage {
        target: ChangeTarget,
        #[serde(default)]
        value: i16,
    },
    Heal {
        target: ChangeTarget,
        #[serde(default)]
        value: i16,
    },
    Destroy {
        target: ChangeTarget,
    },
    Buff {
        target: ChangeTarget,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<i16>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attack: Option<i16>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        health: Option<i16>,
    },
    Debuff {
        target: ChangeTarget,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<i16>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attack: Option<i16>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        health: Option<i16>,
    },
    Draw {
        target: Role,
        #[serde(default = "default_count")]
        value: u8,
    },
    Discard {
        target: Role,
        #[serde(default = "default_count")]
        value: u8,
    },
    Mill {
        target: Role,
        #[serde(default = "default_count")]
        value: u8,
    },
    ApplyStatus {
        target: ChangeTarget,
        status: StatusEffect,
    },
    RemoveStatus {
        target: ChangeTarget,
        status: StatusEffect,
    },
    AddShield {
        target: ChangeTarget,
        #[serde(default)]
        value: i16,
    },
    Summon {
        target: Role,
        card: Card,
    },
    StealCreature {
        target: ChangeTarget,
    },
    Transform {
        target: ChangeTarget,
        card: Card,
    },
    CopyCreature {
        target: ChangeTarget,
        owner: Role,
    },
    Bounce {
        target: ChangeTarget,
    },
    ApplyEffect {
        effect: EffectSpec,
    },
    RemoveEffect {
        effect_id: EffectId,
    },
    #[serde(other)]
    Unknown,
}

/// 把有序的变更列表按顺序落到状态上。随机性（随机弃牌）走注入的 RNG。
pub struct ChangeApplicator {
    rng: SmallRng,
}

impl Default for ChangeApplicator {
    fn default() -> Self {
        ChangeApplicator::new()
    }
}

impl ChangeApplicator {
    pub fn new() -> Self {
        Self {
            rng: SmallRng::from_entropy(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// 按给定顺序应用变更，返回真正生效的那部分（呈现层的事件流）。
    /// 每一条之后都重查胜负；一旦终局，批次剩余的变更不再执行。
    pub fn apply(&mut self, state: &mut GameState, changes: &[StateChange]) -> Vec<StateChange> {
        let mut applied = Vec::new();
        if state.is_finished() {
            return applied;
        }
        for change in changes {
            if self.apply_one(state, change) {
                applied.push(change.clone());
            }
            if state.check_win_condition() {
                break;
            }
        }
        applied
    }

    /// 单条变更。指向已消失实例的变更静默跳过：它可能死于同批前面的变更。
    fn apply_one(&mut self, state: &mut GameState, change: &StateChange) -> bool {
        match change {
            StateChange::Damage { target, value } => {
                if *value <= 0 {
                    return false;
                }
                match target {
                    ChangeTarget::Role(role) => {
                        state.damage_role(*role, *value);
                        true
                    }
                    ChangeTarget::Creature(id) => {
                        if state.find_creature(*id).is_none() {
                            return false;
                        }
                        state.damage_creature(*id, *value);
                        true
                    }
                }
            }

            StateChange::Heal { target, value } => match target {
                ChangeTarget::Role(role) if *value > 0 => {
                    state.heal_role(*role, *value);
                    true
                }
                _ => false,
            },

            StateChange::Destroy { target } => match target {
                ChangeTarget::Creature(id) => state.remove_creature(*id).is_some(),
                ChangeTarget::Role(_) => false,
            },

            StateChange::Buff {
                target,
                value,
                attack,
                health,
            } => self.adjust_stats(state, target, stat_deltas(*value, *attack, *health)),

            StateChange::Debuff {
                target,
                value,
                attack,
                health,
            } => {
                let (da, dh) = stat_deltas(*value, *attack, *health);
                self.adjust_stats(state, target, (-da, -dh))
            }

            StateChange::Draw { target, value } => {
                let mut drawn = false;
                for _ in 0..*value {
                    if state.draw_card(*target).is_none() {
                        break;
                    }
                    drawn = true;
                }
                drawn
            }

            StateChange::Discard { target, value } => {
                let mut discarded = false;
                for _ in 0..*value {
                    let hand = &mut state.side_mut(*target).hand;
                    if hand.is_empty() {
                        break;
                    }
                    let index = self.rng.gen_range(0..hand.len());
                    hand.remove(index);
                    discarded = true;
                }
                discarded
            }

            StateChange::Mill { target, value } => {
                let deck = &mut state.side_mut(*target).deck;
                let count = (*value as usize).min(deck.len());
                deck.drain(..count);
                count > 0
            }

            StateChange::ApplyStatus { target, status } => match target {
                ChangeTarget::Creature(id) => match state.find_creature_mut(*id) {
                    Some((_, creature)) => {
                        creature.add_status(*status);
                        true
                    }
                    None => false,
                },
                ChangeTarget::Role(_) => false,
            },

            StateChange::RemoveStatus { target, status } => match target {
                ChangeTarget::Creature(id) => match state.find_creature_mut(*id) {
                    Some((_, creature)) => {
                        creature.remove_status(*status);
                        true
                    }
                    None => false,
                },
                ChangeTarget::Role(_) => false,
            },

            StateChange::AddShield { target, value } => match target {
                ChangeTarget::Creature(id) if *value > 0 => match state.find_creature_mut(*id) {
                    Some((_, creature)) => {
                        creature.shield += value;
                        true
                    }
                    None => false,
                },
                _ => false,
            },

            StateChange::Summon { target, card } => {
                let id = state.allocate_instance_id();
                match Creature::from_card(card.clone(), id) {
                    Some(mut creature) => {
                        creature.token = true;
                        state.side_mut(*target).field.push(creature);
                        true
                    }
                    None => false,
                }
            }

            StateChange::StealCreature { target } => {
                let ChangeTarget::Creature(id) = target else {
                    return false;
                };
                let Some((holder, _)) = state.find_creature(*id) else {
                    return false;
                };
                let Some(pos) = state.side(holder).creature_position(*id) else {
                    return false;
                };
                let mut creature = state.side_mut(holder).field.remove(pos);
                if creature.original_owner.is_none() {
                    creature.original_owner = Some(holder);
                }
                creature.can_attack = false;
                state.side_mut(holder.rival()).field.push(creature);
                true
            }

            StateChange::Transform { target, card } => {
                let ChangeTarget::Creature(id) = target else {
                    return false;
                };
                let Some((role, _)) = state.find_creature(*id) else {
                    return false;
                };
                let Some(pos) = state.side(role).creature_position(*id) else {
                    return false;
                };
                let new_id = state.allocate_instance_id();
                let Some(replacement) = Creature::from_card(card.clone(), new_id) else {
                    return false;
                };
                // 旧实例视同死亡，先解除指向它的效果
                state.remove_creature(*id);
                state.side_mut(role).field.insert(pos, replacement);
                true
            }

            StateChange::CopyCreature { target, owner } => {
                let ChangeTarget::Creature(id) = target else {
                    return false;
                };
                let Some((_, source)) = state.find_creature(*id) else {
                    return false;
                };
                let card = source.card.clone();
                let attack = source.current_attack;
                let health = source.current_health;
                let new_id = state.allocate_instance_id();
                let Some(mut copy) = Creature::from_card(card, new_id) else {
                    return false;
                };
                copy.current_attack = attack;
                copy.current_health = health;
                copy.token = true;
                state.side_mut(*owner).field.push(copy);
                true
            }

            StateChange::Bounce { target } => {
                let ChangeTarget::Creature(id) = target else {
                    return false;
                };
                let Some((holder, creature)) = state.remove_creature(*id) else {
                    return false;
                };
                // 衍生物离场即消失；其余的以模板形态回到主人手里
                if !creature.token {
                    let owner = creature.original_owner.unwrap_or(holder);
                    state.side_mut(owner).hand.push(creature.card);
                }
                true
            }

            StateChange::ApplyEffect { effect } => {
                if let EffectTarget::Creature { instance_id } = effect.target {
                    if state.find_creature(instance_id).is_none() {
                        return false;
                    }
                }
                let id = state.allocate_effect_id();
                let turn = state.turn;
                let active = ActiveEffect::from_spec(effect.clone(), id, turn);
                if let EffectTarget::Creature { instance_id } = active.target {
                    if let Some((_, creature)) = state.find_creature_mut(instance_id) {
                        creature.applied_effects.push(id);
                    }
                }
                state.active_effects.push(active);
                true
            }

            StateChange::RemoveEffect { effect_id } => {
                let before = state.active_effects.len();
                state.active_effects.retain(|e| e.id != *effect_id);
                if state.active_effects.len() == before {
                    return false;
                }
                for role in [Role::Player, Role::Opponent] {
                    for creature in &mut state.side_mut(role).field {
                        creature.applied_effects.retain(|id| id != effect_id);
                    }
                }
                true
            }

            StateChange::Unknown => false,
        }
    }

    fn adjust_stats(
        &mut self,
        state: &mut GameState,
        target: &ChangeTarget,
        (attack_delta, health_delta): (i16, i16),
    ) -> bool {
        let ChangeTarget::Creature(id) = target else {
            return false;
        };
        let Some((_, creature)) = state.find_creature_mut(*id) else {
            return false;
        };
        creature.current_attack = (creature.current_attack + attack_delta).max(0);
        creature.current_health += health_delta;
        if creature.current_health <= 0 {
            state.remove_creature(*id);
        }
        true
    }
}

/// 攻/防各自给定时独立生效，否则共用一个增量。
fn stat_deltas(value: Option<i16>, attack: Option<i16>, health: Option<i16>) -> (i16, i16) {
    if attack.is_some() || health.is_some() {
        (attack.unwrap_or(0), health.unwrap_or(0))
    } else {
        let v = value.unwrap_or(0);
        (v, v)
    }
}

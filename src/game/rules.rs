//! 回合与战斗的推进器：出牌合法性、攻击判定、回合交替与胜负。

use serde::{Deserialize, Serialize};

use super::changes::{ChangeApplicator, ChangeTarget, StateChange};
use super::effects::{self, EffectTrigger};
use super::state::{
    Card, CardKind, Creature, EconomyMode, GameState, InstanceId, IntegrityError, Phase, Role,
    StatusEffect,
};

/// 攻击目标：敌方英雄或敌方场上的一个生物。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AttackTarget {
    Hero,
    Creature { instance_id: InstanceId },
}

/// 批量战斗中的一条攻击指令。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttackOrder {
    pub attacker: InstanceId,
    pub target: AttackTarget,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum RuleError {
    GameFinished,
    NotPlayerTurn,
    InvalidPhase { expected: Phase, actual: Phase },
    CardOutOfRange { index: usize },
    InsufficientMana { required: u8, available: u8 },
    CardAlreadyPlayed,
    AttackerNotFound { instance_id: InstanceId },
    AttackerCannotAttack { instance_id: InstanceId },
    AttackerFrozen { instance_id: InstanceId },
    AttackPrevented { instance_id: InstanceId },
    TargetNotFound { instance_id: InstanceId },
    TauntInTheWay,
    TargetStealthed { instance_id: InstanceId },
    IntegrityViolation { error: IntegrityError },
}

/// 一次结算步骤的原子结果：新状态、旁白与实际生效的变更放在一起，
/// 供任意呈现层订阅。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleResolution {
    pub state: GameState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applied: Vec<StateChange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<Role>,
}

impl RuleResolution {
    pub fn new(state: &GameState, narrative: Option<String>, applied: Vec<StateChange>) -> Self {
        Self {
            winner: state.winner,
            state: state.clone(),
            narrative,
            applied,
        }
    }
}

pub struct RuleEngine {
    applicator: ChangeApplicator,
}

impl Default for RuleEngine {
    fn default() -> Self {
        RuleEngine::new()
    }
}

impl RuleEngine {
    pub fn new() -> Self {
        Self {
            applicator: ChangeApplicator::new(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            applicator: ChangeApplicator::with_seed(seed),
        }
    }

    pub fn applicator_mut(&mut self) -> &mut ChangeApplicator {
        &mut self.applicator
    }

    fn ensure_active(state: &GameState) -> Result<(), RuleError> {
        if state.is_finished() {
            return Err(RuleError::GameFinished);
        }
        Ok(())
    }

    fn ensure_turn(state: &GameState, role: Role) -> Result<(), RuleError> {
        if state.current_player != role {
            return Err(RuleError::NotPlayerTurn);
        }
        Ok(())
    }

    fn ensure_phase(state: &GameState, expected: Phase) -> Result<(), RuleError> {
        if state.phase != expected {
            return Err(RuleError::InvalidPhase {
                expected,
                actual: state.phase,
            });
        }
        Ok(())
    }

    fn ensure_integrity(state: &GameState) -> Result<(), RuleError> {
        state
            .integrity_check()
            .map_err(|error| RuleError::IntegrityViolation { error })
    }

    /// 出一张牌。成功后状态进入 `resolving`，等待生成器给出效果；
    /// 返回打出的模板，供调用方请求旁白。
    pub fn play_card(
        &mut self,
        state: &mut GameState,
        role: Role,
        hand_index: usize,
    ) -> Result<Card, RuleError> {
        Self::ensure_active(state)?;
        Self::ensure_integrity(state)?;
        Self::ensure_turn(state, role)?;
        Self::ensure_phase(state, Phase::Playing)?;

        if hand_index >= state.side(role).hand.len() {
            return Err(RuleError::CardOutOfRange { index: hand_index });
        }

        match state.config.economy {
            EconomyMode::Mana => {
                let cost = effects::effective_cost(state, role, &state.side(role).hand[hand_index]);
                let available = state.side(role).mana;
                if cost > available {
                    return Err(RuleError::InsufficientMana {
                        required: cost,
                        available,
                    });
                }
                state.side_mut(role).mana -= cost;
            }
            EconomyMode::SinglePlay => {
                if state.played_card_this_turn {
                    return Err(RuleError::CardAlreadyPlayed);
                }
                state.played_card_this_turn = true;
            }
        }

        let card = state.side_mut(role).hand.remove(hand_index);

        // 生物上场自带召唤失调，这回合不能进攻
        if card.kind == CardKind::Creature && card.base_stats.is_some() {
            let id = state.allocate_instance_id();
            if let Some(creature) = Creature::from_card(card.clone(), id) {
                state.side_mut(role).field.push(creature);
            }
        }

        state.phase = Phase::Resolving;
        Ok(card)
    }

    /// 应用生成器为刚打出的牌提出的效果，然后回到 `playing`。
    pub fn resolve_card(
        &mut self,
        state: &mut GameState,
        changes: &[StateChange],
    ) -> Result<Vec<StateChange>, RuleError> {
        Self::ensure_active(state)?;
        Self::ensure_phase(state, Phase::Resolving)?;

        let mut applied = self.applicator.apply(state, changes);
        if !state.is_finished() {
            let role = state.current_player;
            applied.extend(effects::process_effect_trigger(
                state,
                EffectTrigger::OnPlay,
                role,
                &mut self.applicator,
            ));
        }
        self.fire_on_damage(state, &mut applied);

        if !state.is_finished() {
            state.phase = Phase::Playing;
        }
        Ok(applied)
    }

    /// 单次攻击。任何不合法之处都原样退回状态，由调用方决定替补动作。
    pub fn creature_attack(
        &mut self,
        state: &mut GameState,
        attacker_id: InstanceId,
        target: AttackTarget,
    ) -> Result<Vec<StateChange>, RuleError> {
        Self::ensure_active(state)?;
        Self::ensure_integrity(state)?;
        Self::ensure_phase(state, Phase::Playing)?;

        state.phase = Phase::Combat;
        let outcome = self.attack_inner(state, attacker_id, target);
        if !state.is_finished() {
            state.phase = Phase::Playing;
        }
        outcome
    }

    fn attack_inner(
        &mut self,
        state: &mut GameState,
        attacker_id: InstanceId,
        target: AttackTarget,
    ) -> Result<Vec<StateChange>, RuleError> {
        let Some((controller, attacker)) = state.find_creature(attacker_id) else {
            return Err(RuleError::AttackerNotFound { instance_id: attacker_id });
        };
        Self::ensure_turn(state, controller)?;

        if !attacker.can_attack {
            return Err(RuleError::AttackerCannotAttack { instance_id: attacker_id });
        }
        if attacker.has_status(StatusEffect::Frozen) {
            return Err(RuleError::AttackerFrozen { instance_id: attacker_id });
        }
        if !effects::can_creature_attack(state, attacker_id) {
            return Err(RuleError::AttackPrevented { instance_id: attacker_id });
        }

        let defender_role = controller.rival();
        let attack_value = attacker.current_attack;

        let changes = match target {
            AttackTarget::Hero => {
                if state.side(defender_role).has_taunt() {
                    return Err(RuleError::TauntInTheWay);
                }
                vec![StateChange::Damage {
                    target: ChangeTarget::Role(defender_role),
                    value: attack_value,
                }]
            }
            AttackTarget::Creature { instance_id } => {
                let Some(defender) = state.side(defender_role).find_creature(instance_id) else {
                    return Err(RuleError::TargetNotFound { instance_id });
                };
                if defender.has_active_status(StatusEffect::Stealth) {
                    return Err(RuleError::TargetStealthed { instance_id });
                }
                if state.side(defender_role).has_taunt()
                    && !defender.has_active_status(StatusEffect::Taunt)
                {
                    return Err(RuleError::TauntInTheWay);
                }
                // 双方同时结算：反击值取进场时的数值
                let retaliation = defender.current_attack;
                vec![
                    StateChange::Damage {
                        target: ChangeTarget::Creature(instance_id),
                        value: attack_value,
                    },
                    StateChange::Damage {
                        target: ChangeTarget::Creature(attacker_id),
                        value: retaliation,
                    },
                ]
            }
        };

        if let Some((_, attacker)) = state.find_creature_mut(attacker_id) {
            attacker.can_attack = false;
            // 出手即现身
            attacker.remove_status(StatusEffect::Stealth);
        }

        let mut applied = self.applicator.apply(state, &changes);
        self.fire_on_damage(state, &mut applied);
        Ok(applied)
    }

    /// 按给定顺序执行一串攻击；轮到某条指令时攻击者已死、已出手或
    /// 被冻结就跳过它；一旦分出胜负立即停下。
    pub fn execute_batch_combat(
        &mut self,
        state: &mut GameState,
        role: Role,
        orders: &[AttackOrder],
    ) -> Result<Vec<StateChange>, RuleError> {
        Self::ensure_active(state)?;
        Self::ensure_integrity(state)?;
        Self::ensure_turn(state, role)?;
        Self::ensure_phase(state, Phase::Playing)?;

        state.phase = Phase::Combat;
        let mut applied = Vec::new();
        for order in orders {
            if state.is_finished() {
                break;
            }
            if let Ok(mut changes) = self.attack_inner(state, order.attacker, order.target) {
                applied.append(&mut changes);
            }
        }
        if !state.is_finished() {
            state.phase = Phase::Playing;
        }
        Ok(applied)
    }

    /// 结束当前回合并把局面交给另一方。
    pub fn end_turn(&mut self, state: &mut GameState) -> Result<Vec<StateChange>, RuleError> {
        Self::ensure_active(state)?;
        Self::ensure_integrity(state)?;
        Self::ensure_phase(state, Phase::Playing)?;

        let outgoing = state.current_player;
        let mut applied = Vec::new();

        // 离场方的回合结束效果与临终审判
        applied.extend(effects::process_effect_trigger(
            state,
            EffectTrigger::EndOfTurn,
            outgoing,
            &mut self.applicator,
        ));
        if state.is_finished() {
            return Ok(applied);
        }

        let doomed: Vec<StateChange> = state
            .side(outgoing)
            .field
            .iter()
            .filter(|c| c.has_status(StatusEffect::Doomed))
            .map(|c| StateChange::Destroy {
                target: ChangeTarget::Creature(c.instance_id),
            })
            .collect();
        applied.extend(self.applicator.apply(state, &doomed));
        if state.is_finished() {
            return Ok(applied);
        }

        let incoming = outgoing.rival();
        state.current_player = incoming;
        if incoming == Role::Player {
            state.turn += 1;
        }

        match state.config.economy {
            EconomyMode::Mana => {
                let cap = state.config.mana_cap;
                let side = state.side_mut(incoming);
                side.max_mana = (side.max_mana + 1).min(cap);
                side.mana = side.max_mana;
            }
            EconomyMode::SinglePlay => {
                state.played_card_this_turn = false;
            }
        }

        // 新回合方的状态结算：先毒，再解冻与回复行动权
        let poison_ticks: Vec<StateChange> = state
            .side(incoming)
            .field
            .iter()
            .filter(|c| c.has_status(StatusEffect::Poisoned))
            .map(|c| StateChange::Damage {
                target: ChangeTarget::Creature(c.instance_id),
                value: 1,
            })
            .collect();
        applied.extend(self.applicator.apply(state, &poison_ticks));

        for creature in &mut state.side_mut(incoming).field {
            if creature.has_status(StatusEffect::Frozen) {
                // 解冻的生物这回合仍按兵不动，下回合才能出手
                creature.remove_status(StatusEffect::Frozen);
                creature.can_attack = false;
            } else {
                creature.can_attack = true;
            }
        }

        applied.extend(effects::process_effect_trigger(
            state,
            EffectTrigger::StartOfTurn,
            incoming,
            &mut self.applicator,
        ));
        if state.is_finished() {
            return Ok(applied);
        }

        applied.extend(self.applicator.apply(
            state,
            &[StateChange::Draw {
                target: incoming,
                value: 1,
            }],
        ));

        state.check_win_condition();
        Ok(applied)
    }

    pub fn check_victory(state: &mut GameState) -> Option<Role> {
        state.check_win_condition();
        state.winner
    }

    /// 本步骤造成过伤害时，依固定顺序触发双方的 `on_damage` 效果。
    fn fire_on_damage(&mut self, state: &mut GameState, applied: &mut Vec<StateChange>) {
        let dealt = applied
            .iter()
            .any(|c| matches!(c, StateChange::Damage { .. }));
        if !dealt || state.is_finished() {
            return;
        }
        for role in [Role::Player, Role::Opponent] {
            applied.extend(effects::process_effect_trigger(
                state,
                EffectTrigger::OnDamage,
                role,
                &mut self.applicator,
            ));
            if state.is_finished() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{Actor, BaseStats, GameConfig, TargetKind};
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn empty_state() -> GameState {
        let mut rng = SmallRng::seed_from_u64(7);
        let mut state = GameState::new_game(&mut rng);
        state.player.hand.clear();
        state.player.deck.clear();
        state.opponent.hand.clear();
        state.opponent.deck.clear();
        state
    }

    fn creature_card(name: &str, cost: u8, attack: i16, health: i16) -> Card {
        Card {
            id: name.to_ascii_lowercase().replace(' ', "-"),
            name: name.into(),
            flavor: String::new(),
            cost,
            kind: CardKind::Creature,
            base_stats: Some(BaseStats { attack, health }),
            targeting: TargetKind::None,
            special: None,
            token: false,
        }
    }

    fn fielded(state: &mut GameState, role: Role, name: &str, attack: i16, health: i16) -> InstanceId {
        let id = state.allocate_instance_id();
        let mut creature =
            Creature::from_card(creature_card(name, 1, attack, health), id).expect("stats present");
        creature.can_attack = true;
        state.side_mut(role).field.push(creature);
        id
    }

    #[test]
    fn played_creature_arrives_sick_and_cannot_attack_yet() {
        let mut engine = RuleEngine::with_seed(1);
        let mut state = empty_state();
        state.player.hand.push(creature_card("Confused Wizard", 3, 2, 4));
        state.player.mana = 3;

        let card = engine
            .play_card(&mut state, Role::Player, 0)
            .expect("play is legal");
        assert_eq!(card.name, "Confused Wizard");
        assert!(state.player.hand.is_empty());
        assert_eq!(state.player.mana, 0);
        assert_eq!(state.phase, Phase::Resolving);

        let creature = &state.player.field[0];
        assert!(!creature.can_attack);
        let id = creature.instance_id;

        engine
            .resolve_card(&mut state, &[])
            .expect("resolution returns to playing");
        assert_eq!(state.phase, Phase::Playing);

        let err = engine
            .creature_attack(&mut state, id, AttackTarget::Hero)
            .expect_err("summoning sickness blocks the attack");
        assert_eq!(err, RuleError::AttackerCannotAttack { instance_id: id });
        assert_eq!(state.opponent.health, 30, "state unchanged by the rejection");
    }

    #[test]
    fn play_rejects_bad_index_and_unaffordable_cost() {
        let mut engine = RuleEngine::with_seed(1);
        let mut state = empty_state();
        state.player.hand.push(creature_card("Ancient Dragon", 7, 7, 7));
        state.player.mana = 3;

        assert_eq!(
            engine.play_card(&mut state, Role::Player, 5),
            Err(RuleError::CardOutOfRange { index: 5 })
        );
        assert_eq!(
            engine.play_card(&mut state, Role::Player, 0),
            Err(RuleError::InsufficientMana { required: 7, available: 3 })
        );
        assert_eq!(state.player.hand.len(), 1, "the card stayed in hand");
    }

    #[test]
    fn play_rejects_the_wrong_role() {
        let mut engine = RuleEngine::with_seed(1);
        let mut state = empty_state();
        state.opponent.hand.push(creature_card("Angry Squirrel", 1, 2, 1));
        state.opponent.mana = 1;

        assert_eq!(
            engine.play_card(&mut state, Role::Opponent, 0),
            Err(RuleError::NotPlayerTurn)
        );
    }

    #[test]
    fn single_play_economy_allows_exactly_one_card_per_turn() {
        let mut engine = RuleEngine::with_seed(1);
        let mut rng = SmallRng::seed_from_u64(2);
        let mut state = GameState::new_game_with(
            GameConfig {
                economy: EconomyMode::SinglePlay,
                ..GameConfig::default()
            },
            &mut rng,
        );

        engine
            .play_card(&mut state, Role::Player, 0)
            .expect("first play of the turn");
        engine.resolve_card(&mut state, &[]).expect("resolves");

        assert_eq!(
            engine.play_card(&mut state, Role::Player, 0),
            Err(RuleError::CardAlreadyPlayed)
        );

        engine.end_turn(&mut state).expect("turn ends");
        assert!(!state.played_card_this_turn, "flag cleared for the next role");
        engine
            .play_card(&mut state, Role::Opponent, 0)
            .expect("opponent may play again");
    }

    #[test]
    fn attack_on_hero_spends_the_attacker() {
        let mut engine = RuleEngine::with_seed(1);
        let mut state = empty_state();
        let id = fielded(&mut state, Role::Player, "Enthusiastic Goblin", 3, 2);

        let applied = engine
            .creature_attack(&mut state, id, AttackTarget::Hero)
            .expect("attack is legal");

        assert_eq!(applied.len(), 1);
        assert_eq!(state.opponent.health, 27);
        assert!(!state.player.find_creature(id).expect("alive").can_attack);
        assert_eq!(state.phase, Phase::Playing);
    }

    #[test]
    fn creature_combat_resolves_both_directions() {
        let mut engine = RuleEngine::with_seed(1);
        let mut state = empty_state();
        let attacker = fielded(&mut state, Role::Player, "Enthusiastic Goblin", 3, 2);
        let defender = fielded(&mut state, Role::Opponent, "Confused Wizard", 2, 3);

        engine
            .creature_attack(
                &mut state,
                attacker,
                AttackTarget::Creature { instance_id: defender },
            )
            .expect("attack is legal");

        assert!(state.find_creature(defender).is_none(), "3 damage kills the wizard");
        assert!(state.find_creature(attacker).is_none(), "2 retaliation kills the goblin");
    }

    #[test]
    fn taunt_forces_attacks_onto_the_guard() {
        let mut engine = RuleEngine::with_seed(1);
        let mut state = empty_state();
        let attacker = fielded(&mut state, Role::Player, "Time-Lost Knight", 4, 4);
        let guard = fielded(&mut state, Role::Opponent, "Philosophical Crab", 1, 4);
        let bystander = fielded(&mut state, Role::Opponent, "Angry Squirrel", 2, 1);
        state
            .opponent
            .find_creature_mut(guard)
            .expect("on field")
            .add_status(StatusEffect::Taunt);

        assert_eq!(
            engine.creature_attack(&mut state, attacker, AttackTarget::Hero),
            Err(RuleError::TauntInTheWay)
        );
        assert_eq!(
            engine.creature_attack(
                &mut state,
                attacker,
                AttackTarget::Creature { instance_id: bystander },
            ),
            Err(RuleError::TauntInTheWay)
        );
        assert_eq!(state.opponent.health, 30, "rejections leave the state alone");

        engine
            .creature_attack(
                &mut state,
                attacker,
                AttackTarget::Creature { instance_id: guard },
            )
            .expect("the taunt creature is a legal target");
        assert!(state.find_creature(guard).is_none());
    }

    #[test]
    fn stealthed_creatures_cannot_be_singled_out() {
        let mut engine = RuleEngine::with_seed(1);
        let mut state = empty_state();
        let attacker = fielded(&mut state, Role::Player, "Angry Squirrel", 2, 1);
        let sneak = fielded(&mut state, Role::Opponent, "Mirror Mimic", 2, 2);
        state
            .opponent
            .find_creature_mut(sneak)
            .expect("on field")
            .add_status(StatusEffect::Stealth);

        assert_eq!(
            engine.creature_attack(
                &mut state,
                attacker,
                AttackTarget::Creature { instance_id: sneak },
            ),
            Err(RuleError::TargetStealthed { instance_id: sneak })
        );
    }

    #[test]
    fn attacking_breaks_the_attackers_own_stealth() {
        let mut engine = RuleEngine::with_seed(1);
        let mut state = empty_state();
        let attacker = fielded(&mut state, Role::Player, "Mirror Mimic", 2, 2);
        state
            .player
            .find_creature_mut(attacker)
            .expect("on field")
            .add_status(StatusEffect::Stealth);

        engine
            .creature_attack(&mut state, attacker, AttackTarget::Hero)
            .expect("attack is legal");

        let creature = state.player.find_creature(attacker).expect("alive");
        assert!(!creature.has_status(StatusEffect::Stealth));
    }

    #[test]
    fn frozen_attackers_stay_home() {
        let mut engine = RuleEngine::with_seed(1);
        let mut state = empty_state();
        let id = fielded(&mut state, Role::Player, "Sleepy Giant", 8, 4);
        state
            .player
            .find_creature_mut(id)
            .expect("on field")
            .add_status(StatusEffect::Frozen);

        assert_eq!(
            engine.creature_attack(&mut state, id, AttackTarget::Hero),
            Err(RuleError::AttackerFrozen { instance_id: id })
        );
    }

    #[test]
    fn end_turn_alternates_roles_and_counts_full_rounds() {
        let mut engine = RuleEngine::with_seed(1);
        let mut state = empty_state();
        assert_eq!(state.turn, 1);

        engine.end_turn(&mut state).expect("player passes");
        assert_eq!(state.current_player, Role::Opponent);
        assert_eq!(state.turn, 1, "half a round is not a turn");

        engine.end_turn(&mut state).expect("opponent passes");
        assert_eq!(state.current_player, Role::Player);
        assert_eq!(state.turn, 2);
    }

    #[test]
    fn end_turn_ramps_mana_up_to_the_cap() {
        let mut engine = RuleEngine::with_seed(1);
        let mut state = empty_state();
        state.opponent.max_mana = 10;
        state.opponent.mana = 0;

        engine.end_turn(&mut state).expect("turn ends");

        assert_eq!(state.opponent.max_mana, 10, "capped at 10");
        assert_eq!(state.opponent.mana, 10, "refilled to max");
    }

    #[test]
    fn end_turn_refreshes_creatures_and_draws_a_card() {
        let mut engine = RuleEngine::with_seed(1);
        let mut state = empty_state();
        let id = fielded(&mut state, Role::Opponent, "Cursed Accountant", 3, 5);
        state.opponent.find_creature_mut(id).expect("on field").can_attack = false;
        state.opponent.deck.push(creature_card("Angry Squirrel", 1, 2, 1));

        let applied = engine.end_turn(&mut state).expect("turn ends");

        assert!(state.opponent.find_creature(id).expect("alive").can_attack);
        assert_eq!(state.opponent.hand.len(), 1, "incoming role drew a card");
        assert!(applied
            .iter()
            .any(|c| matches!(c, StateChange::Draw { target: Role::Opponent, .. })));
    }

    #[test]
    fn poison_ticks_through_shield_at_start_of_turn() {
        let mut engine = RuleEngine::with_seed(1);
        let mut state = empty_state();
        let id = fielded(&mut state, Role::Opponent, "Philosophical Crab", 1, 2);
        {
            let creature = state.opponent.find_creature_mut(id).expect("on field");
            creature.add_status(StatusEffect::Poisoned);
            creature.shield = 1;
        }

        engine.end_turn(&mut state).expect("turn ends");

        let creature = state.opponent.find_creature(id).expect("alive");
        assert_eq!(creature.shield, 0, "the tick ate the shield first");
        assert_eq!(creature.current_health, 2);
        assert!(creature.has_status(StatusEffect::Poisoned), "poison persists");

        engine.end_turn(&mut state).expect("back to player");
        engine.end_turn(&mut state).expect("opponent again");
        let creature = state.opponent.find_creature(id).expect("alive");
        assert_eq!(creature.current_health, 1, "now it reaches health");
    }

    #[test]
    fn poison_can_kill_at_start_of_turn() {
        let mut engine = RuleEngine::with_seed(1);
        let mut state = empty_state();
        let id = fielded(&mut state, Role::Opponent, "Angry Squirrel", 2, 1);
        state
            .opponent
            .find_creature_mut(id)
            .expect("on field")
            .add_status(StatusEffect::Poisoned);

        engine.end_turn(&mut state).expect("turn ends");

        assert!(state.find_creature(id).is_none());
    }

    #[test]
    fn thawed_creatures_sit_out_the_turn_they_unfreeze() {
        let mut engine = RuleEngine::with_seed(1);
        let mut state = empty_state();
        let frozen = fielded(&mut state, Role::Opponent, "Sleepy Giant", 8, 4);
        let ready = fielded(&mut state, Role::Opponent, "Angry Squirrel", 2, 1);
        for id in [frozen, ready] {
            state.opponent.find_creature_mut(id).expect("on field").can_attack = false;
        }
        state
            .opponent
            .find_creature_mut(frozen)
            .expect("on field")
            .add_status(StatusEffect::Frozen);

        engine.end_turn(&mut state).expect("turn ends");

        let thawed = state.opponent.find_creature(frozen).expect("alive");
        assert!(!thawed.has_status(StatusEffect::Frozen), "frozen wears off");
        assert!(!thawed.can_attack, "but it still cannot act this turn");
        assert!(state.opponent.find_creature(ready).expect("alive").can_attack);
    }

    #[test]
    fn doomed_creatures_die_when_their_owners_turn_ends() {
        let mut engine = RuleEngine::with_seed(1);
        let mut state = empty_state();
        let id = fielded(&mut state, Role::Player, "Cursed Accountant", 3, 5);
        state
            .player
            .find_creature_mut(id)
            .expect("on field")
            .add_status(StatusEffect::Doomed);

        let applied = engine.end_turn(&mut state).expect("turn ends");

        assert!(state.find_creature(id).is_none(), "the debt came due");
        assert!(applied
            .iter()
            .any(|c| matches!(c, StateChange::Destroy { .. })));
    }

    #[test]
    fn batch_combat_skips_spent_attackers() {
        let mut engine = RuleEngine::with_seed(1);
        let mut state = empty_state();
        let spent = fielded(&mut state, Role::Player, "Angry Squirrel", 2, 1);
        let fresh = fielded(&mut state, Role::Player, "Enthusiastic Goblin", 3, 2);
        state.player.find_creature_mut(spent).expect("on field").can_attack = false;

        let orders = vec![
            AttackOrder { attacker: spent, target: AttackTarget::Hero },
            AttackOrder { attacker: fresh, target: AttackTarget::Hero },
        ];
        engine
            .execute_batch_combat(&mut state, Role::Player, &orders)
            .expect("batch runs");

        assert_eq!(state.opponent.health, 27, "only the fresh attacker landed");
    }

    #[test]
    fn batch_combat_stops_the_moment_the_game_ends() {
        let mut engine = RuleEngine::with_seed(1);
        let mut state = empty_state();
        state.opponent.health = 3;
        let first = fielded(&mut state, Role::Player, "Enthusiastic Goblin", 3, 2);
        let second = fielded(&mut state, Role::Player, "Angry Squirrel", 2, 1);

        let orders = vec![
            AttackOrder { attacker: first, target: AttackTarget::Hero },
            AttackOrder { attacker: second, target: AttackTarget::Hero },
        ];
        engine
            .execute_batch_combat(&mut state, Role::Player, &orders)
            .expect("batch runs");

        assert_eq!(state.phase, Phase::Ended);
        assert_eq!(state.winner, Some(Role::Player));
        assert!(
            state.player.find_creature(second).expect("alive").can_attack,
            "the second order never executed"
        );
    }

    #[test]
    fn lethal_attack_ends_the_game_immediately() {
        let mut engine = RuleEngine::with_seed(1);
        let mut state = empty_state();
        state.opponent.health = 2;
        let id = fielded(&mut state, Role::Player, "Enthusiastic Goblin", 3, 2);

        engine
            .creature_attack(&mut state, id, AttackTarget::Hero)
            .expect("attack is legal");

        assert_eq!(state.phase, Phase::Ended);
        assert_eq!(state.winner, Some(Role::Player));

        assert_eq!(
            engine.end_turn(&mut state),
            Err(RuleError::GameFinished),
            "nothing moves after the end"
        );
    }

    #[test]
    fn resolve_outside_resolving_phase_is_rejected() {
        let mut engine = RuleEngine::with_seed(1);
        let mut state = empty_state();

        assert_eq!(
            engine.resolve_card(&mut state, &[]),
            Err(RuleError::InvalidPhase {
                expected: Phase::Resolving,
                actual: Phase::Playing,
            })
        );
    }

    #[test]
    fn spell_resolution_reaches_the_board_and_log_stays_ordered() {
        let mut engine = RuleEngine::with_seed(1);
        let mut state = empty_state();
        state.player.hand.push(Card {
            id: "aggressive-negotiations".into(),
            name: "Aggressive Negotiations".into(),
            flavor: String::new(),
            cost: 3,
            kind: CardKind::Spell,
            base_stats: None,
            targeting: TargetKind::AnyCreature,
            special: None,
            token: false,
        });
        state.player.mana = 3;
        let enemy = fielded(&mut state, Role::Opponent, "Confused Wizard", 2, 4);

        engine.play_card(&mut state, Role::Player, 0).expect("spell played");
        state.add_log_entry(Actor::Player, "Diplomacy, but louder.", 10.0);
        let applied = engine
            .resolve_card(
                &mut state,
                &[StateChange::Damage { target: ChangeTarget::Creature(enemy), value: 3 }],
            )
            .expect("resolution applies");

        assert_eq!(applied.len(), 1);
        let creature = state.opponent.find_creature(enemy).expect("alive");
        assert_eq!(creature.current_health, 1);
        assert_eq!(state.phase, Phase::Playing);
        assert_eq!(state.log.last().expect("log entry").narrative, "Diplomacy, but louder.");
    }
}

//! 生成器拿不出有效提案时的确定性替补动作：回合永远推得下去。

use crate::ai::proposal::{
    BatchDecision, CreatureAction, CreatureDecision, ResolveDecision, TurnAction, TurnDecision,
};
use crate::game::{
    can_creature_attack, effective_cost, AttackOrder, AttackTarget, EconomyMode, GameState, Role,
};

/// 让过这一回合。
pub fn turn_pass() -> TurnDecision {
    TurnDecision {
        action: TurnAction::EndTurn,
        card_index: None,
        narrative: "The opponent contemplates deeply, then passes.".into(),
    }
}

/// 提案不合法时的让过。
pub fn turn_invalid_play() -> TurnDecision {
    TurnDecision {
        action: TurnAction::EndTurn,
        card_index: None,
        narrative: "Hmm, that won't work. I end my turn.".into(),
    }
}

/// 无牌可出也无人能动时的让过。
pub fn turn_nothing_to_do() -> TurnDecision {
    TurnDecision {
        action: TurnAction::EndTurn,
        card_index: None,
        narrative: "Nothing more to do this turn...".into(),
    }
}

/// 效果结算失败时的哑火：有旁白、无变更。
pub fn resolve_fizzle() -> ResolveDecision {
    ResolveDecision {
        narrative: "The card shimmers with uncertain energy...".into(),
        changes: Vec::new(),
    }
}

/// 生物决定解析失败时直扑英雄。
pub fn creature_charge() -> CreatureDecision {
    CreatureDecision {
        action: CreatureAction::AttackHero,
        target_id: None,
        narrative: "The creature charges forward with wild abandon!".into(),
        changes: Vec::new(),
    }
}

/// 指定的生物目标不存在时改扑英雄。
pub fn creature_redirect(attacker_name: &str) -> CreatureDecision {
    CreatureDecision {
        action: CreatureAction::AttackHero,
        target_id: None,
        narrative: format!(
            "{attacker_name} lunges forward, finding no creature to attack, and strikes the enemy hero instead!"
        ),
        changes: Vec::new(),
    }
}

fn first_affordable_card(state: &GameState, role: Role) -> Option<usize> {
    let side = state.side(role);
    side.hand.iter().enumerate().find_map(|(index, card)| {
        let affordable = match state.config.economy {
            EconomyMode::Mana => effective_cost(state, role, card) <= side.mana,
            EconomyMode::SinglePlay => !state.played_card_this_turn,
        };
        affordable.then_some(index)
    })
}

fn ready_attackers(state: &GameState, role: Role) -> Vec<AttackOrder> {
    state
        .side(role)
        .field
        .iter()
        .filter(|c| can_creature_attack(state, c.instance_id))
        .map(|c| AttackOrder {
            attacker: c.instance_id,
            target: AttackTarget::Hero,
        })
        .collect()
}

/// 有没有任何可做的事：出得起一张牌，或有人能动。
pub fn has_any_action(state: &GameState, role: Role) -> bool {
    first_affordable_card(state, role).is_some() || !ready_attackers(state, role).is_empty()
}

/// 确定性的默认回合动作：先试最靠前的出得起的牌，否则让过。
pub fn default_turn_decision(state: &GameState, role: Role) -> TurnDecision {
    if !has_any_action(state, role) {
        return turn_nothing_to_do();
    }
    match first_affordable_card(state, role) {
        Some(index) => TurnDecision {
            action: TurnAction::Play,
            card_index: Some(index),
            narrative: "After a long pause, a card hits the table.".into(),
        },
        None => turn_pass(),
    }
}

/// 默认的批量攻击：所有能动的生物一齐扑向英雄。
pub fn batch_all_in(state: &GameState, role: Role) -> BatchDecision {
    BatchDecision {
        narrative: "The whole board surges forward!".into(),
        attacks: ready_attackers(state, role),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{BaseStats, Card, CardKind, Creature, GameState, TargetKind};
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

    fn card(name: &str, cost: u8) -> Card {
        Card {
            id: name.to_ascii_lowercase().replace(' ', "-"),
            name: name.into(),
            flavor: String::new(),
            cost,
            kind: CardKind::Creature,
            base_stats: Some(BaseStats { attack: 2, health: 2 }),
            targeting: TargetKind::None,
            special: None,
            token: false,
        }
    }

    #[test]
    fn default_decision_prefers_the_first_affordable_card() {
        let mut state = empty_state();
        state.opponent.hand.push(card("Ancient Dragon", 7));
        state.opponent.hand.push(card("Angry Squirrel", 1));
        state.opponent.mana = 2;

        let decision = default_turn_decision(&state, Role::Opponent);
        assert_eq!(decision.action, TurnAction::Play);
        assert_eq!(decision.card_index, Some(1));
    }

    #[test]
    fn default_decision_passes_when_nothing_is_possible() {
        let state = empty_state();
        let decision = default_turn_decision(&state, Role::Opponent);
        assert_eq!(decision.action, TurnAction::EndTurn);
    }

    #[test]
    fn batch_all_in_sends_only_ready_creatures() {
        let mut state = empty_state();
        for (name, ready) in [("Angry Squirrel", true), ("Sleepy Giant", false)] {
            let id = state.allocate_instance_id();
            let mut creature = Creature::from_card(card(name, 1), id).expect("stats present");
            creature.can_attack = ready;
            state.opponent.field.push(creature);
        }

        let decision = batch_all_in(&state, Role::Opponent);
        assert_eq!(decision.attacks.len(), 1);
        assert_eq!(decision.attacks[0].target, AttackTarget::Hero);
    }
}

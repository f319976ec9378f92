use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use rand::Rng;

use super::catalog;
use super::effects::{ActiveEffect, EffectTarget};

/// 场上生物实例的唯一标识，整局游戏内不会复用。
pub type InstanceId = u32;
/// 持续效果标识。
pub type EffectId = u32;

const DEFAULT_MAX_HEALTH: i16 = 30;
const DEFAULT_MANA_CAP: u8 = 10;
const DEFAULT_STARTING_HAND: usize = 4;

/// 两个固定的对局席位，整局游戏不会互换。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Player,
    Opponent,
}

impl Role {
    pub fn rival(self) -> Role {
        match self {
            Role::Player => Role::Opponent,
            Role::Opponent => Role::Player,
        }
    }
}

/// 日志条目的发言者，比 [`Role`] 多一个系统旁白。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Actor {
    Player,
    Opponent,
    System,
}

impl From<Role> for Actor {
    fn from(role: Role) -> Actor {
        match role {
            Role::Player => Actor::Player,
            Role::Opponent => Actor::Opponent,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CardKind {
    Creature,
    Spell,
}

/// 卡牌允许的目标约束。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    #[default]
    None,
    EnemyCreature,
    FriendlyCreature,
    AnyCreature,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StatusEffect {
    Frozen,
    Poisoned,
    Taunt,
    Stealth,
    Silenced,
    Doomed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BaseStats {
    pub attack: i16,
    pub health: i16,
}

/// 图鉴中的卡牌模板。字段带默认值，便于解析生成器给出的残缺模板。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Card {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub flavor: String,
    #[serde(default)]
    pub cost: u8,
    pub kind: CardKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_stats: Option<BaseStats>,
    #[serde(default)]
    pub targeting: TargetKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special: Option<String>,
    #[serde(default)]
    pub token: bool,
}

/// 进入战场的生物实例。模板与实例是两种类型，不靠字段存在性区分。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Creature {
    pub instance_id: InstanceId,
    pub card: Card,
    pub current_attack: i16,
    pub current_health: i16,
    pub can_attack: bool,
    #[serde(default)]
    pub shield: i16,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub statuses: Vec<StatusEffect>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applied_effects: Vec<EffectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_owner: Option<Role>,
    #[serde(default)]
    pub token: bool,
}

impl Creature {
    /// 从模板实例化生物。没有基础属性的模板（法术）返回 `None`。
    pub fn from_card(card: Card, instance_id: InstanceId) -> Option<Creature> {
        let stats = card.base_stats?;
        let token = card.token;
        Some(Creature {
            instance_id,
            card,
            current_attack: stats.attack,
            current_health: stats.health,
            can_attack: false,
            shield: 0,
            statuses: Vec::new(),
            applied_effects: Vec::new(),
            original_owner: None,
            token,
        })
    }

    pub fn has_status(&self, status: StatusEffect) -> bool {
        self.statuses.contains(&status)
    }

    /// 目标合法性所见的状态：沉默的生物不再提供嘲讽与潜行。
    pub fn has_active_status(&self, status: StatusEffect) -> bool {
        match status {
            StatusEffect::Taunt | StatusEffect::Stealth
                if self.has_status(StatusEffect::Silenced) =>
            {
                false
            }
            _ => self.has_status(status),
        }
    }

    pub fn add_status(&mut self, status: StatusEffect) {
        if !self.has_status(status) {
            self.statuses.push(status);
        }
    }

    pub fn remove_status(&mut self, status: StatusEffect) {
        self.statuses.retain(|s| *s != status);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerState {
    pub health: i16,
    #[serde(default)]
    pub mana: u8,
    #[serde(default)]
    pub max_mana: u8,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hand: Vec<Card>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deck: Vec<Card>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub field: Vec<Creature>,
}

impl PlayerState {
    pub fn find_creature(&self, instance_id: InstanceId) -> Option<&Creature> {
        self.field.iter().find(|c| c.instance_id == instance_id)
    }

    pub fn find_creature_mut(&mut self, instance_id: InstanceId) -> Option<&mut Creature> {
        self.field.iter_mut().find(|c| c.instance_id == instance_id)
    }

    pub fn creature_position(&self, instance_id: InstanceId) -> Option<usize> {
        self.field.iter().position(|c| c.instance_id == instance_id)
    }

    /// 该侧是否存在生效中的嘲讽生物。
    pub fn has_taunt(&self) -> bool {
        self.field
            .iter()
            .any(|c| c.has_active_status(StatusEffect::Taunt))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Playing,
    Resolving,
    Combat,
    Ended,
}

/// 出牌经济规则：法力模式或每回合一张的简化模式。二选一的配置，不是两套状态。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EconomyMode {
    #[default]
    Mana,
    SinglePlay,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GameConfig {
    pub economy: EconomyMode,
    pub max_health: i16,
    pub mana_cap: u8,
    pub starting_hand: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            economy: EconomyMode::Mana,
            max_health: DEFAULT_MAX_HEALTH,
            mana_cap: DEFAULT_MANA_CAP,
            starting_hand: DEFAULT_STARTING_HAND,
        }
    }
}

/// 旁白日志条目。时间戳由 wasm 边界盖上，核心不读时钟。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameEvent {
    pub turn: u32,
    pub actor: Actor,
    pub narrative: String,
    #[serde(default)]
    pub timestamp: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum IntegrityError {
    DuplicateInstanceId { instance_id: InstanceId },
    CreatureWithoutHealth { instance_id: InstanceId, value: i16 },
    WinnerWithoutEnd,
    ManaAboveCap { role: Role, value: u8 },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameState {
    pub turn: u32,
    pub current_player: Role,
    pub player: PlayerState,
    pub opponent: PlayerState,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub log: Vec<GameEvent>,
    #[serde(default)]
    pub phase: Phase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<Role>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub active_effects: Vec<ActiveEffect>,
    #[serde(default)]
    pub played_card_this_turn: bool,
    #[serde(default)]
    pub config: GameConfig,
    #[serde(default)]
    pub next_instance_id: InstanceId,
    #[serde(default)]
    pub next_effect_id: EffectId,
}

impl GameState {
    /// 开一局新游戏：双方满血、整套图鉴洗成牌库、起手抽四张。
    pub fn new_game<R: Rng>(rng: &mut R) -> GameState {
        GameState::new_game_with(GameConfig::default(), rng)
    }

    pub fn new_game_with<R: Rng>(config: GameConfig, rng: &mut R) -> GameState {
        let (mana, max_mana) = match config.economy {
            EconomyMode::Mana => (1, 1),
            EconomyMode::SinglePlay => (0, 0),
        };

        let mut side = |rng: &mut R| {
            let mut deck = catalog::shuffled_starter_deck(rng);
            let hand = deck
                .drain(..config.starting_hand.min(deck.len()))
                .collect::<Vec<_>>();
            PlayerState {
                health: config.max_health,
                mana,
                max_mana,
                hand,
                deck,
                field: Vec::new(),
            }
        };

        let player = side(rng);
        let opponent = side(rng);

        GameState {
            turn: 1,
            current_player: Role::Player,
            player,
            opponent,
            log: vec![GameEvent {
                turn: 1,
                actor: Actor::System,
                narrative:
                    "The battle begins! Two champions face off in a contest of wit and whimsy."
                        .into(),
                timestamp: 0.0,
            }],
            phase: Phase::Playing,
            winner: None,
            active_effects: Vec::new(),
            played_card_this_turn: false,
            config,
            next_instance_id: 0,
            next_effect_id: 0,
        }
    }

    pub fn side(&self, role: Role) -> &PlayerState {
        match role {
            Role::Player => &self.player,
            Role::Opponent => &self.opponent,
        }
    }

    pub fn side_mut(&mut self, role: Role) -> &mut PlayerState {
        match role {
            Role::Player => &mut self.player,
            Role::Opponent => &mut self.opponent,
        }
    }

    pub fn allocate_instance_id(&mut self) -> InstanceId {
        self.next_instance_id += 1;
        self.next_instance_id
    }

    pub fn allocate_effect_id(&mut self) -> EffectId {
        self.next_effect_id += 1;
        self.next_effect_id
    }

    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Ended
    }

    /// 在两侧战场中查找生物实例。
    pub fn find_creature(&self, instance_id: InstanceId) -> Option<(Role, &Creature)> {
        for role in [Role::Player, Role::Opponent] {
            if let Some(creature) = self.side(role).find_creature(instance_id) {
                return Some((role, creature));
            }
        }
        None
    }

    pub fn find_creature_mut(&mut self, instance_id: InstanceId) -> Option<(Role, &mut Creature)> {
        if self.player.find_creature(instance_id).is_some() {
            return self
                .player
                .find_creature_mut(instance_id)
                .map(|c| (Role::Player, c));
        }
        self.opponent
            .find_creature_mut(instance_id)
            .map(|c| (Role::Opponent, c))
    }

    /// 将生物移出战场，同时收回所有指向它的持续效果。
    pub fn remove_creature(&mut self, instance_id: InstanceId) -> Option<(Role, Creature)> {
        let removed = [Role::Player, Role::Opponent].into_iter().find_map(|role| {
            let pos = self.side(role).creature_position(instance_id)?;
            let creature = self.side_mut(role).field.remove(pos);
            Some((role, creature))
        })?;

        let dropped: Vec<EffectId> = self
            .active_effects
            .iter()
            .filter(|e| e.target == EffectTarget::Creature { instance_id })
            .map(|e| e.id)
            .collect();
        if !dropped.is_empty() {
            self.active_effects
                .retain(|e| e.target != EffectTarget::Creature { instance_id });
            for side in [Role::Player, Role::Opponent] {
                for creature in &mut self.side_mut(side).field {
                    creature.applied_effects.retain(|id| !dropped.contains(id));
                }
            }
        }

        Some(removed)
    }

    /// 英雄扣血，不会降到 0 以下。
    pub fn damage_role(&mut self, role: Role, value: i16) {
        if value <= 0 {
            return;
        }
        let side = self.side_mut(role);
        side.health = (side.health - value).max(0);
    }

    /// 英雄回血，不超过配置上限。
    pub fn heal_role(&mut self, role: Role, value: i16) {
        if value <= 0 {
            return;
        }
        let cap = self.config.max_health;
        let side = self.side_mut(role);
        side.health = (side.health + value).min(cap);
    }

    /// 生物受伤：护盾先吸收，余下扣血；血量归零当场移出战场。
    /// 返回生物是否因此死亡。
    pub fn damage_creature(&mut self, instance_id: InstanceId, value: i16) -> bool {
        if value <= 0 {
            return false;
        }
        let Some((_, creature)) = self.find_creature_mut(instance_id) else {
            return false;
        };
        let absorbed = creature.shield.min(value);
        creature.shield -= absorbed;
        creature.current_health -= value - absorbed;
        if creature.current_health <= 0 {
            self.remove_creature(instance_id);
            return true;
        }
        false
    }

    /// 从牌库顶抽一张进手牌；空牌库时什么都不发生。
    pub fn draw_card(&mut self, role: Role) -> Option<Card> {
        let side = self.side_mut(role);
        if side.deck.is_empty() {
            return None;
        }
        let card = side.deck.remove(0);
        side.hand.push(card.clone());
        Some(card)
    }

    pub fn add_log_entry(&mut self, actor: Actor, narrative: impl Into<String>, timestamp: f64) {
        let turn = self.turn;
        self.log.push(GameEvent {
            turn,
            actor,
            narrative: narrative.into(),
            timestamp,
        });
    }

    /// 胜负判定，固定先查 player 再查 opponent：同归于尽时 opponent 获胜。
    /// 一旦进入 `ended`，结果不再改变。
    pub fn check_win_condition(&mut self) -> bool {
        if self.phase == Phase::Ended {
            return true;
        }
        if self.player.health <= 0 {
            self.phase = Phase::Ended;
            self.winner = Some(Role::Opponent);
            return true;
        }
        if self.opponent.health <= 0 {
            self.phase = Phase::Ended;
            self.winner = Some(Role::Player);
            return true;
        }
        false
    }

    pub fn integrity_check(&self) -> Result<(), IntegrityError> {
        if self.winner.is_some() && self.phase != Phase::Ended {
            return Err(IntegrityError::WinnerWithoutEnd);
        }

        let mut seen = HashSet::new();
        for role in [Role::Player, Role::Opponent] {
            let side = self.side(role);
            if side.mana > self.config.mana_cap {
                return Err(IntegrityError::ManaAboveCap {
                    role,
                    value: side.mana,
                });
            }
            for creature in &side.field {
                if creature.current_health <= 0 {
                    return Err(IntegrityError::CreatureWithoutHealth {
                        instance_id: creature.instance_id,
                        value: creature.current_health,
                    });
                }
                if !seen.insert(creature.instance_id) {
                    return Err(IntegrityError::DuplicateInstanceId {
                        instance_id: creature.instance_id,
                    });
                }
            }
        }

        Ok(())
    }
}

pub mod ai;
pub mod game;
pub mod utils;

use gloo_timers::future::TimeoutFuture;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::Serialize;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use web_sys::js_sys::{Date, Promise};

pub use ai::{
    extract_json_object, parse_batch_decision, parse_creature_decision, parse_resolve_decision,
    parse_turn_decision, BatchDecision, CreatureAction, CreatureDecision, ResolveDecision,
    TurnAction, TurnDecision,
};
pub use game::{
    catalog, Actor, AttackOrder, AttackTarget, BaseStats, Card, CardKind, ChangeApplicator,
    ChangeTarget, Creature, EconomyMode, GameConfig, GameEvent, GameState, InstanceId,
    IntegrityError, Phase, PlayerState, Role, RuleEngine, RuleError, RuleResolution, StateChange,
    StatusEffect, TargetKind,
};

#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn start() {
    utils::set_panic_hook();
}

fn to_js_error(error: RuleError) -> JsValue {
    to_value(&error).unwrap_or_else(|serialize_err| JsValue::from_str(&serialize_err.to_string()))
}

fn serde_to_js_error<E: std::fmt::Display>(error: E) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn role_from_str(value: &str) -> Result<Role, JsValue> {
    match value {
        "player" => Ok(Role::Player),
        "opponent" => Ok(Role::Opponent),
        _ => Err(JsValue::from_str("expected role \"player\" or \"opponent\"")),
    }
}

fn actor_from_str(value: &str) -> Result<Actor, JsValue> {
    match value {
        "player" => Ok(Actor::Player),
        "opponent" => Ok(Actor::Opponent),
        "system" => Ok(Actor::System),
        _ => Err(JsValue::from_str(
            "expected actor \"player\", \"opponent\" or \"system\"",
        )),
    }
}

fn now_ms() -> f64 {
    Date::now()
}

fn attack_target_of(target_id: Option<u32>) -> AttackTarget {
    match target_id {
        Some(instance_id) => AttackTarget::Creature { instance_id },
        None => AttackTarget::Hero,
    }
}

/// 出牌成功后的返回：打出的模板与新状态，供前端去要旁白。
#[derive(Serialize)]
struct PlayOutcome {
    card: Card,
    state: GameState,
}

/// 一次回合提案应用后的完整回执。
#[derive(Serialize)]
struct TurnProposalOutcome {
    decision: TurnDecision,
    #[serde(skip_serializing_if = "Option::is_none")]
    card: Option<Card>,
    resolution: RuleResolution,
}

/// 持有一局游戏的引擎对象；前端拿它驱动整个对局。
#[wasm_bindgen]
pub struct GameEngine {
    state: GameState,
    engine: RuleEngine,
}

#[wasm_bindgen]
impl GameEngine {
    #[wasm_bindgen(constructor)]
    pub fn new(initial_state_json: Option<String>) -> Result<GameEngine, JsValue> {
        let state = match initial_state_json {
            Some(json) => serde_json::from_str(&json).map_err(serde_to_js_error)?,
            None => GameState::new_game(&mut SmallRng::from_entropy()),
        };
        Ok(GameEngine {
            state,
            engine: RuleEngine::new(),
        })
    }

    /// 带种子的确定性对局，用于回放与调试。
    #[wasm_bindgen(js_name = withSeed)]
    pub fn with_seed(seed: u64) -> GameEngine {
        let mut rng = SmallRng::seed_from_u64(seed);
        GameEngine {
            state: GameState::new_game(&mut rng),
            engine: RuleEngine::with_seed(seed),
        }
    }

    pub fn state_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.state).map_err(serde_to_js_error)
    }

    pub fn set_state_json(&mut self, json: &str) -> Result<(), JsValue> {
        self.state = serde_json::from_str(json).map_err(serde_to_js_error)?;
        Ok(())
    }

    /// 重开一局：旧状态整个丢弃。
    pub fn restart(&mut self) {
        self.state = GameState::new_game(&mut SmallRng::from_entropy());
    }

    /// 出牌。成功后状态停在 `resolving`，等 `resolve_card_text` 收尾。
    pub fn play_card(&mut self, role: &str, hand_index: usize) -> Result<String, JsValue> {
        let role = role_from_str(role)?;
        let card = self
            .engine
            .play_card(&mut self.state, role, hand_index)
            .map_err(to_js_error)?;
        serde_json::to_string(&PlayOutcome {
            card,
            state: self.state.clone(),
        })
        .map_err(serde_to_js_error)
    }

    /// 把生成器对刚打出的牌的原始回复解析、校验并落到状态上。
    pub fn resolve_card_text(&mut self, who: &str, llm_text: &str) -> Result<String, JsValue> {
        let actor = actor_from_str(who)?;
        let decision = parse_resolve_decision(llm_text);
        let applied = self
            .engine
            .resolve_card(&mut self.state, &decision.changes)
            .map_err(to_js_error)?;
        self.state
            .add_log_entry(actor, decision.narrative.clone(), now_ms());
        let resolution = RuleResolution::new(&self.state, Some(decision.narrative), applied);
        serde_json::to_string(&resolution).map_err(serde_to_js_error)
    }

    /// 单个生物的行动：攻击英雄、攻击生物或自由发挥的特殊效果。
    /// 不合法的攻击退化成有旁白的空动作，绝不让对局卡死。
    pub fn creature_action_text(
        &mut self,
        owner: &str,
        attacker_id: u32,
        llm_text: &str,
    ) -> Result<String, JsValue> {
        let owner = role_from_str(owner)?;
        let Some(attacker) = self.state.side(owner).find_creature(attacker_id).cloned() else {
            return Err(to_js_error(RuleError::AttackerNotFound {
                instance_id: attacker_id,
            }));
        };
        let decision = parse_creature_decision(llm_text, &self.state, owner, &attacker);

        let attack_result = match decision.action {
            CreatureAction::AttackHero => Some(self.engine.creature_attack(
                &mut self.state,
                attacker_id,
                AttackTarget::Hero,
            )),
            CreatureAction::AttackCreature => decision.target_id.map(|instance_id| {
                self.engine.creature_attack(
                    &mut self.state,
                    attacker_id,
                    AttackTarget::Creature { instance_id },
                )
            }),
            CreatureAction::Special => None,
        };

        let applied = match attack_result {
            Some(Ok(applied)) => applied,
            Some(Err(error)) => {
                crate::console_log!("creature action rejected, narrating a no-op: {error:?}");
                Vec::new()
            }
            None => self
                .engine
                .applicator_mut()
                .apply(&mut self.state, &decision.changes),
        };

        self.state
            .add_log_entry(owner.into(), decision.narrative.clone(), now_ms());
        let resolution = RuleResolution::new(&self.state, Some(decision.narrative), applied);
        serde_json::to_string(&resolution).map_err(serde_to_js_error)
    }

    /// 解析并应用当前行动方的回合提案（出一张牌或让过）。
    pub fn apply_turn_proposal(&mut self, llm_text: &str) -> Result<String, JsValue> {
        let role = self.state.current_player;
        let decision = parse_turn_decision(llm_text, &self.state, role);

        let (card, applied) = match (decision.action, decision.card_index) {
            (TurnAction::Play, Some(index)) => {
                let card = self
                    .engine
                    .play_card(&mut self.state, role, index)
                    .map_err(to_js_error)?;
                (Some(card), Vec::new())
            }
            _ => {
                let applied = self.engine.end_turn(&mut self.state).map_err(to_js_error)?;
                (None, applied)
            }
        };

        self.state
            .add_log_entry(role.into(), decision.narrative.clone(), now_ms());
        let outcome = TurnProposalOutcome {
            resolution: RuleResolution::new(&self.state, Some(decision.narrative.clone()), applied),
            decision,
            card,
        };
        serde_json::to_string(&outcome).map_err(serde_to_js_error)
    }

    /// 解析并执行一整轮批量攻击。
    pub fn batch_combat_text(&mut self, role: &str, llm_text: &str) -> Result<String, JsValue> {
        let role = role_from_str(role)?;
        let decision = parse_batch_decision(llm_text, &self.state, role);
        let applied = self
            .engine
            .execute_batch_combat(&mut self.state, role, &decision.attacks)
            .map_err(to_js_error)?;
        self.state
            .add_log_entry(role.into(), decision.narrative.clone(), now_ms());
        let resolution = RuleResolution::new(&self.state, Some(decision.narrative), applied);
        serde_json::to_string(&resolution).map_err(serde_to_js_error)
    }

    /// 不经过生成器的直接攻击；`target_id` 缺省表示攻击英雄。
    pub fn creature_attack(
        &mut self,
        attacker_id: u32,
        target_id: Option<u32>,
    ) -> Result<String, JsValue> {
        let applied = self
            .engine
            .creature_attack(&mut self.state, attacker_id, attack_target_of(target_id))
            .map_err(to_js_error)?;
        let resolution = RuleResolution::new(&self.state, None, applied);
        serde_json::to_string(&resolution).map_err(serde_to_js_error)
    }

    pub fn end_turn(&mut self) -> Result<String, JsValue> {
        let applied = self.engine.end_turn(&mut self.state).map_err(to_js_error)?;
        let resolution = RuleResolution::new(&self.state, None, applied);
        serde_json::to_string(&resolution).map_err(serde_to_js_error)
    }

    /// 追加一条旁白日志；时间戳在这里盖上。
    pub fn add_log_entry(&mut self, actor: &str, narrative: &str) -> Result<(), JsValue> {
        let actor = actor_from_str(actor)?;
        self.state.add_log_entry(actor, narrative, now_ms());
        Ok(())
    }

    pub fn check_victory(&mut self) -> Result<JsValue, JsValue> {
        let winner = RuleEngine::check_victory(&mut self.state);
        to_value(&winner).map_err(JsValue::from)
    }

    pub fn validate_state(&self) -> Result<(), JsValue> {
        self.state
            .integrity_check()
            .map_err(|error| to_js_error(RuleError::IntegrityViolation { error }))
    }

    /// 模拟"思考"片刻后给出确定性的替补决定，返回 Promise。
    pub fn think_fallback(&self, delay_ms: Option<u32>) -> Promise {
        let state = self.state.clone();
        let delay = delay_ms.unwrap_or(0);
        future_to_promise(async move {
            if delay > 0 {
                TimeoutFuture::new(delay).await;
            }
            let decision = ai::default_turn_decision(&state, state.current_player);
            let json = serde_json::to_string(&decision).map_err(serde_to_js_error)?;
            Ok(JsValue::from_str(&json))
        })
    }
}

/// 开一局新游戏并返回初始状态，方便前端初始化。
#[wasm_bindgen(js_name = "createGameState")]
pub fn create_game_state() -> Result<JsValue, JsValue> {
    let state = GameState::new_game(&mut SmallRng::from_entropy());
    to_value(&state).map_err(JsValue::from)
}

/// 带种子的初始状态，用于可复现的对局。
#[wasm_bindgen(js_name = "createSeededGameState")]
pub fn create_seeded_game_state(seed: u64) -> Result<JsValue, JsValue> {
    let mut rng = SmallRng::seed_from_u64(seed);
    to_value(&GameState::new_game(&mut rng)).map_err(JsValue::from)
}

/// 深拷贝一份游戏状态。
#[wasm_bindgen(js_name = "cloneGameState")]
pub fn clone_game_state(state: JsValue) -> Result<JsValue, JsValue> {
    let state: GameState = from_value(state).map_err(JsValue::from)?;
    to_value(&state.clone()).map_err(JsValue::from)
}

/// 无状态入口：对给定状态应用一串变更。
#[wasm_bindgen(js_name = "applyStateChanges")]
pub fn apply_state_changes(state: JsValue, changes: JsValue) -> Result<JsValue, JsValue> {
    let mut state: GameState = from_value(state).map_err(JsValue::from)?;
    let changes: Vec<StateChange> = from_value(changes).map_err(JsValue::from)?;
    let applied = ChangeApplicator::new().apply(&mut state, &changes);
    to_value(&RuleResolution::new(&state, None, applied)).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "playCard")]
pub fn play_card(state: JsValue, role: &str, hand_index: usize) -> Result<JsValue, JsValue> {
    let mut state: GameState = from_value(state).map_err(JsValue::from)?;
    let role = role_from_str(role)?;
    let mut engine = RuleEngine::new();
    let card = engine
        .play_card(&mut state, role, hand_index)
        .map_err(to_js_error)?;
    to_value(&PlayOutcome { card, state }).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "creatureAttack")]
pub fn creature_attack(
    state: JsValue,
    attacker_id: u32,
    target_id: Option<u32>,
) -> Result<JsValue, JsValue> {
    let mut state: GameState = from_value(state).map_err(JsValue::from)?;
    let mut engine = RuleEngine::new();
    let applied = engine
        .creature_attack(&mut state, attacker_id, attack_target_of(target_id))
        .map_err(to_js_error)?;
    to_value(&RuleResolution::new(&state, None, applied)).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "endTurn")]
pub fn end_turn(state: JsValue) -> Result<JsValue, JsValue> {
    let mut state: GameState = from_value(state).map_err(JsValue::from)?;
    let mut engine = RuleEngine::new();
    let applied = engine.end_turn(&mut state).map_err(to_js_error)?;
    to_value(&RuleResolution::new(&state, None, applied)).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "checkVictory")]
pub fn check_victory(state: JsValue) -> Result<JsValue, JsValue> {
    let mut state: GameState = from_value(state).map_err(JsValue::from)?;
    let winner = RuleEngine::check_victory(&mut state);
    to_value(&winner).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "validateState")]
pub fn validate_state(state: JsValue) -> Result<(), JsValue> {
    let state: GameState = from_value(state).map_err(JsValue::from)?;
    state
        .integrity_check()
        .map_err(|error| to_js_error(RuleError::IntegrityViolation { error }))
}

/// 从生成器的原始文本里抠出那个 JSON 对象。
#[wasm_bindgen(js_name = "extractProposal")]
pub fn extract_proposal(text: &str) -> Option<String> {
    extract_json_object(text).map(str::to_owned)
}

/// 图鉴：可入牌库的卡。
#[wasm_bindgen(js_name = "listCards")]
pub fn list_cards() -> Result<JsValue, JsValue> {
    to_value(catalog::all_cards()).map_err(JsValue::from)
}

/// 图鉴：衍生物模板。
#[wasm_bindgen(js_name = "listTokens")]
pub fn list_tokens() -> Result<JsValue, JsValue> {
    to_value(catalog::tokens()).map_err(JsValue::from)
}

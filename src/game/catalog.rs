//! 卡牌图鉴：可入牌库的卡与仅能被效果召唤的衍生物。纯数据加纯洗牌。

use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use rand::Rng;

use super::state::{BaseStats, Card, CardKind, TargetKind};

fn creature(id: &str, name: &str, flavor: &str, cost: u8, attack: i16, health: i16) -> Card {
    Card {
        id: id.into(),
        name: name.into(),
        flavor: flavor.into(),
        cost,
        kind: CardKind::Creature,
        base_stats: Some(BaseStats { attack, health }),
        targeting: TargetKind::None,
        special: None,
        token: false,
    }
}

fn spell(id: &str, name: &str, flavor: &str, cost: u8) -> Card {
    Card {
        id: id.into(),
        name: name.into(),
        flavor: flavor.into(),
        cost,
        kind: CardKind::Spell,
        base_stats: None,
        targeting: TargetKind::None,
        special: None,
        token: false,
    }
}

fn with_targeting(mut card: Card, targeting: TargetKind) -> Card {
    card.targeting = targeting;
    card
}

fn with_special(mut card: Card, tag: &str) -> Card {
    card.special = Some(tag.into());
    card
}

static ALL_CARDS: Lazy<Vec<Card>> = Lazy::new(|| {
    vec![
        creature(
            "slightly-damp-towel",
            "Slightly Damp Towel",
            "It's not much, but it's honest work. Surprisingly effective against fire-based threats.",
            1, 1, 2,
        ),
        creature(
            "ancient-dragon",
            "Ancient Dragon",
            "Has seen civilizations rise and fall. Mostly just wants a nap these days.",
            7, 7, 7,
        ),
        creature(
            "confused-wizard",
            "Confused Wizard",
            "Wait, was it \"fireball\" or \"furball\"? The results vary dramatically.",
            3, 2, 4,
        ),
        creature(
            "angry-squirrel",
            "Angry Squirrel",
            "You ate the last acorn. You will pay.",
            1, 2, 1,
        ),
        creature(
            "time-lost-knight",
            "Time-Lost Knight",
            "Arrived late to every battle in history. Still somehow wins.",
            4, 4, 4,
        ),
        creature(
            "philosophical-crab",
            "Philosophical Crab",
            "Ponders the meaning of sideways movement. Very hard to argue with.",
            2, 1, 4,
        ),
        creature(
            "enthusiastic-goblin",
            "Enthusiastic Goblin",
            "Doesn't know what's happening but is VERY excited about it.",
            2, 3, 2,
        ),
        creature(
            "sleepy-giant",
            "Sleepy Giant",
            "Hits hard when awake. Rarely awake.",
            5, 8, 4,
        ),
        with_special(
            creature(
                "mirror-mimic",
                "Mirror Mimic",
                "Copies whatever it sees. Currently very confused by itself.",
                3, 2, 2,
            ),
            "copycat",
        ),
        creature(
            "cursed-accountant",
            "Cursed Accountant",
            "Deals in debts of the soul. Also regular debts.",
            4, 3, 5,
        ),
        with_special(
            spell(
                "suspicious-fog",
                "Suspicious Fog",
                "It's definitely hiding something. What, exactly, remains unclear.",
                2,
            ),
            "concealment",
        ),
        spell(
            "definitely-not-a-trap",
            "Definitely Not a Trap",
            "Trust us. Would this card lie to you?",
            3,
        ),
        with_targeting(
            spell(
                "minor-inconvenience",
                "Minor Inconvenience",
                "Their shoelace is untied. Their coffee is cold. Their day is ruined.",
                1,
            ),
            TargetKind::EnemyCreature,
        ),
        spell(
            "chaos-ensues",
            "Chaos Ensues",
            "Something happens. No one knows what. Results may vary.",
            4,
        ),
        with_targeting(
            spell(
                "aggressive-negotiations",
                "Aggressive Negotiations",
                "Diplomacy, but louder and with more fire.",
                3,
            ),
            TargetKind::AnyCreature,
        ),
        spell(
            "reality-hiccup",
            "Reality Hiccup",
            "The universe blinks. Things are different now.",
            5,
        ),
        with_targeting(
            spell(
                "sudden-inspiration",
                "Sudden Inspiration",
                "A brilliant idea strikes! Literally. It hurts a bit.",
                2,
            ),
            TargetKind::FriendlyCreature,
        ),
        spell(
            "borrowed-time",
            "Borrowed Time",
            "Take now, pay later. Interest rates are cosmic.",
            3,
        ),
    ]
});

static TOKENS: Lazy<Vec<Card>> = Lazy::new(|| {
    let token = |id: &str, name: &str, flavor: &str, attack: i16, health: i16| {
        let mut card = creature(id, name, flavor, 0, attack, health);
        card.token = true;
        card
    };
    vec![
        token(
            "grumpy-pebble",
            "Grumpy Pebble",
            "Was once part of a mountain. Still bitter about the downsizing.",
            1, 1,
        ),
        token(
            "suspiciously-loyal-chicken",
            "Suspiciously Loyal Chicken",
            "Follows you everywhere. Definitely reports to someone.",
            1, 1,
        ),
        token(
            "animated-teacup",
            "Animated Teacup",
            "Holds exactly one serving of boiling resentment.",
            1, 2,
        ),
        token(
            "tiny-tornado",
            "Tiny Tornado",
            "All the fury of a hurricane, scaled down to desk size.",
            2, 1,
        ),
    ]
});

/// 可加入牌库的全部卡牌，顺序固定。
pub fn all_cards() -> &'static [Card] {
    &ALL_CARDS
}

/// 仅供效果召唤的衍生物模板。
pub fn tokens() -> &'static [Card] {
    &TOKENS
}

pub fn get_token(id: &str) -> Option<&'static Card> {
    TOKENS.iter().find(|card| card.id == id)
}

pub fn draw_random_token<R: Rng>(rng: &mut R) -> Card {
    TOKENS
        .choose(rng)
        .cloned()
        .unwrap_or_else(|| TOKENS[0].clone())
}

/// Fisher–Yates 洗整套图鉴；只有注入带种子的 RNG 才可复现。
pub fn shuffled_starter_deck<R: Rng>(rng: &mut R) -> Vec<Card> {
    let mut deck = ALL_CARDS.clone();
    deck.shuffle(rng);
    deck
}

//! Shared scaffolding for runtime integration tests.

use std::path::{Path, PathBuf};

use warden_core::{
    Entity, EntityId, EntityKind, GameState, MapState, Position, RngState, SizeClass, Stats,
};

pub fn fighter(id: &str, kind: EntityKind, position: Position, hp: i64) -> Entity {
    Entity {
        id: EntityId::from(id),
        kind,
        name: id.to_owned(),
        size: SizeClass::M,
        position,
        stats: Stats {
            hp_current: hp,
            hp_max: hp,
            ac: 12,
            movement_speed: 6,
            attack_bonus: Some(3),
            damage_die: Some("1d6".to_owned()),
        },
        conditions: Vec::new(),
        condition_durations: Default::default(),
        ability_cooldowns: Default::default(),
        resources: [("mana".to_owned(), 5u64), ("ap".to_owned(), 2u64)].into(),
        inventory: Vec::new(),
        ability_ids: vec!["fireball".to_owned(), "healing_word".to_owned()],
        controller: None,
    }
}

/// A seeded two-versus-one skirmish: pc-a and pc-b against one goblin.
pub fn skirmish_state() -> GameState {
    let mut state = GameState::new(MapState::open(12, 12));
    state.rng = RngState::seeded("pipeline-tests");
    state
        .entities
        .players
        .push(fighter("pc-a", EntityKind::Player, Position::new(2, 2), 20));
    state
        .entities
        .players
        .push(fighter("pc-b", EntityKind::Player, Position::new(3, 2), 20));
    state
        .entities
        .npcs
        .push(fighter("npc-1", EntityKind::Npc, Position::new(4, 2), 8));
    state
}

pub fn write_json(path: &Path, value: &impl serde::Serialize) -> PathBuf {
    std::fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
    path.to_path_buf()
}

/// A legal single-fireball envelope against `skirmish_state`.
pub fn fireball_envelope() -> serde_json::Value {
    serde_json::json!({
        "narration": "A streak of flame crosses the chamber.",
        "adjudication": [
            {"rule_id": "ability.range", "justification": "goblin is two cells away, range six"}
        ],
        "map_updates": [],
        "state_updates": [],
        "questions": [],
        "ability_uses": [{
            "use_id": "fb-1",
            "actor_id": "pc-a",
            "ability_id": "fireball",
            "target_ids": ["npc-1"]
        }]
    })
}

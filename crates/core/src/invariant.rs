//! Cross-cutting state invariants.
//!
//! The checker runs every invariant in a fixed order and collects all
//! violations; it never mutates. A state that fails this sweep must never
//! be persisted — a violation after a successful engine transition is a
//! resolver bug, not a rules rejection.

use std::collections::BTreeSet;

use crate::state::{CombatMode, EntityKind, GameState, Position, RngMode};

/// Stable violation codes, in evaluation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum InvariantCode {
    InvEntityIdUnique,
    InvEntityKindBucket,
    InvHpMaxPositive,
    InvHpBounds,
    InvPositionInBounds,
    InvCellOccupancy,
    InvBlockedTerrainOccupied,
    InvConditionEmptyName,
    InvInventoryIdUnique,
    InvInventoryQty,
    InvExplorationClean,
    InvCombatRound,
    InvCombatActiveMember,
    InvInitiativeExists,
    InvInitiativeUnique,
    InvTerrainInBounds,
    InvTerrainCellUnique,
    InvMapSize,
    InvLogIdUnique,
    InvLogChronology,
    InvRngSeed,
    InvRollCounter,
    InvRollTotal,
    InvUiSelection,
    InvUiHover,
}

/// One invariant violation with a human-readable description.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    pub code: InvariantCode,
    pub message: String,
}

impl Violation {
    fn new(code: InvariantCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Evaluate the complete invariant set against a state.
pub fn check_invariants(state: &GameState) -> Vec<Violation> {
    let mut violations = Vec::new();

    check_entities(state, &mut violations);
    check_combat(state, &mut violations);
    check_map(state, &mut violations);
    check_log(state, &mut violations);
    check_rng(state, &mut violations);
    check_ui(state, &mut violations);

    violations
}

fn check_entities(state: &GameState, violations: &mut Vec<Violation>) {
    let mut seen_ids = BTreeSet::new();
    for entity in state.entities.iter() {
        if !seen_ids.insert(entity.id.clone()) {
            violations.push(Violation::new(
                InvariantCode::InvEntityIdUnique,
                format!("duplicate entity id '{}'", entity.id),
            ));
        }
    }

    for (bucket_kind, bucket) in [
        (EntityKind::Player, &state.entities.players),
        (EntityKind::Npc, &state.entities.npcs),
        (EntityKind::Object, &state.entities.objects),
    ] {
        for entity in bucket {
            if entity.kind != bucket_kind {
                violations.push(Violation::new(
                    InvariantCode::InvEntityKindBucket,
                    format!(
                        "entity '{}' has kind {} but sits in the {} bucket",
                        entity.id,
                        entity.kind.as_ref(),
                        bucket_kind.as_ref()
                    ),
                ));
            }
        }
    }

    for entity in state.entities.iter() {
        if entity.stats.hp_max < 1 {
            violations.push(Violation::new(
                InvariantCode::InvHpMaxPositive,
                format!("entity '{}' has hpMax {}", entity.id, entity.stats.hp_max),
            ));
        }
        if entity.stats.hp_current < 0 || entity.stats.hp_current > entity.stats.hp_max {
            violations.push(Violation::new(
                InvariantCode::InvHpBounds,
                format!(
                    "entity '{}' has hpCurrent {} outside [0, {}]",
                    entity.id, entity.stats.hp_current, entity.stats.hp_max
                ),
            ));
        }
        if !state.map.in_bounds(&entity.position) {
            violations.push(Violation::new(
                InvariantCode::InvPositionInBounds,
                format!(
                    "entity '{}' at {} is outside the map",
                    entity.id, entity.position
                ),
            ));
        }
    }

    // No two solid entities on one cell.
    let mut solid_cells: BTreeSet<Position> = BTreeSet::new();
    for entity in state.entities.iter().filter(|e| e.is_solid()) {
        if !solid_cells.insert(entity.position) {
            violations.push(Violation::new(
                InvariantCode::InvCellOccupancy,
                format!(
                    "solid entity '{}' shares cell {} with another solid entity",
                    entity.id, entity.position
                ),
            ));
        }
    }

    for entity in state.entities.iter() {
        if state.map.blocks_movement(&entity.position) {
            violations.push(Violation::new(
                InvariantCode::InvBlockedTerrainOccupied,
                format!(
                    "entity '{}' stands on movement-blocking terrain at {}",
                    entity.id, entity.position
                ),
            ));
        }

        for status in &entity.conditions {
            if status.is_empty() {
                violations.push(Violation::new(
                    InvariantCode::InvConditionEmptyName,
                    format!("entity '{}' carries an empty condition name", entity.id),
                ));
            }
        }

        let mut item_ids = BTreeSet::new();
        for item in &entity.inventory {
            if !item_ids.insert(item.id.as_str()) {
                violations.push(Violation::new(
                    InvariantCode::InvInventoryIdUnique,
                    format!("entity '{}' has duplicate item id '{}'", entity.id, item.id),
                ));
            }
            if item.qty < 1 {
                violations.push(Violation::new(
                    InvariantCode::InvInventoryQty,
                    format!(
                        "entity '{}' item '{}' has qty {}",
                        entity.id, item.id, item.qty
                    ),
                ));
            }
        }
    }
}

fn check_combat(state: &GameState, violations: &mut Vec<Violation>) {
    let combat = &state.combat;
    match combat.mode {
        CombatMode::Exploration => {
            if combat.round != 0
                || combat.active_entity_id.is_some()
                || !combat.initiative_order.is_empty()
            {
                violations.push(Violation::new(
                    InvariantCode::InvExplorationClean,
                    "exploration mode requires round 0, no active entity, empty initiative",
                ));
            }
        }
        CombatMode::Combat => {
            if combat.round < 1 {
                violations.push(Violation::new(
                    InvariantCode::InvCombatRound,
                    format!("combat mode with round {}", combat.round),
                ));
            }
            match &combat.active_entity_id {
                Some(active) if combat.initiative_order.contains(active) => {}
                Some(active) => violations.push(Violation::new(
                    InvariantCode::InvCombatActiveMember,
                    format!("active entity '{active}' is not in the initiative order"),
                )),
                None => violations.push(Violation::new(
                    InvariantCode::InvCombatActiveMember,
                    "combat mode with no active entity",
                )),
            }
        }
    }

    let mut seen = BTreeSet::new();
    for id in &combat.initiative_order {
        if !state.entities.contains(id) {
            violations.push(Violation::new(
                InvariantCode::InvInitiativeExists,
                format!("initiative entry '{id}' does not exist"),
            ));
        }
        if !seen.insert(id.clone()) {
            violations.push(Violation::new(
                InvariantCode::InvInitiativeUnique,
                format!("initiative entry '{id}' appears more than once"),
            ));
        }
    }
}

fn check_map(state: &GameState, violations: &mut Vec<Violation>) {
    let mut cells = BTreeSet::new();
    for cell in &state.map.terrain {
        let position = cell.position();
        if !state.map.in_bounds(&position) {
            violations.push(Violation::new(
                InvariantCode::InvTerrainInBounds,
                format!("terrain cell at {position} is outside the map"),
            ));
        }
        if !cells.insert(position) {
            violations.push(Violation::new(
                InvariantCode::InvTerrainCellUnique,
                format!("terrain defined twice at {position}"),
            ));
        }
    }

    if state.map.grid.size.width < 1 || state.map.grid.size.height < 1 {
        violations.push(Violation::new(
            InvariantCode::InvMapSize,
            format!(
                "map size {}x{} is not positive",
                state.map.grid.size.width, state.map.grid.size.height
            ),
        ));
    }
}

fn check_log(state: &GameState, violations: &mut Vec<Violation>) {
    let mut ids = BTreeSet::new();
    let mut last_timestamp: Option<u64> = None;
    for event in &state.log.events {
        if !ids.insert(event.id().to_owned()) {
            violations.push(Violation::new(
                InvariantCode::InvLogIdUnique,
                format!("duplicate log event id '{}'", event.id()),
            ));
        }
        if let Some(last) = last_timestamp
            && event.timestamp() < last
        {
            violations.push(Violation::new(
                InvariantCode::InvLogChronology,
                format!(
                    "event '{}' timestamp {} precedes {}",
                    event.id(),
                    event.timestamp(),
                    last
                ),
            ));
        }
        last_timestamp = Some(event.timestamp());
    }
}

fn check_rng(state: &GameState, violations: &mut Vec<Violation>) {
    if state.rng.mode == RngMode::Seeded
        && state.rng.seed.as_deref().map(str::is_empty).unwrap_or(true)
    {
        violations.push(Violation::new(
            InvariantCode::InvRngSeed,
            "seeded rng requires a non-empty seed",
        ));
    }

    for record in &state.rng.last_rolls {
        if record.counter_after < record.counter_before
            || (record.counter_after - record.counter_before) != record.raw_draws.len() as u64
        {
            violations.push(Violation::new(
                InvariantCode::InvRollCounter,
                format!(
                    "roll '{}' spans counters {}..{} but consumed {} draws",
                    record.request,
                    record.counter_before,
                    record.counter_after,
                    record.raw_draws.len()
                ),
            ));
        }
        // Totals are typed i64; the reachable failure is an empty draw list
        // claiming a rolled result.
        if record.raw_draws.is_empty() {
            violations.push(Violation::new(
                InvariantCode::InvRollTotal,
                format!("roll '{}' recorded no raw draws", record.request),
            ));
        }
    }
}

fn check_ui(state: &GameState, violations: &mut Vec<Violation>) {
    if let Some(selected) = &state.ui.selected_entity_id
        && !state.entities.contains(selected)
    {
        violations.push(Violation::new(
            InvariantCode::InvUiSelection,
            format!("ui selection '{selected}' does not exist"),
        ));
    }
    if let Some(hovered) = &state.ui.hovered_cell
        && !state.map.in_bounds(hovered)
    {
        violations.push(Violation::new(
            InvariantCode::InvUiHover,
            format!("ui hover {hovered} is outside the map"),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{
        Entity, EntityId, InventoryItem, MapState, SizeClass, Stats, TerrainCell,
    };

    fn entity(id: &str, kind: EntityKind, position: Position) -> Entity {
        Entity {
            id: EntityId::from(id),
            kind,
            name: id.to_owned(),
            size: SizeClass::M,
            position,
            stats: Stats {
                hp_current: 10,
                hp_max: 10,
                ac: 12,
                movement_speed: 6,
                attack_bonus: None,
                damage_die: None,
            },
            conditions: Vec::new(),
            condition_durations: Default::default(),
            ability_cooldowns: Default::default(),
            resources: Default::default(),
            inventory: Vec::new(),
            ability_ids: Vec::new(),
            controller: None,
        }
    }

    fn valid_state() -> GameState {
        let mut state = GameState::new(MapState::open(10, 10));
        state
            .entities
            .players
            .push(entity("pc-a", EntityKind::Player, Position::new(1, 1)));
        state
            .entities
            .npcs
            .push(entity("npc-1", EntityKind::Npc, Position::new(3, 3)));
        state
    }

    fn codes(state: &GameState) -> Vec<InvariantCode> {
        check_invariants(state).into_iter().map(|v| v.code).collect()
    }

    #[test]
    fn clean_state_passes() {
        assert!(check_invariants(&valid_state()).is_empty());
    }

    #[test]
    fn duplicate_ids_and_wrong_bucket() {
        let mut state = valid_state();
        state
            .entities
            .npcs
            .push(entity("pc-a", EntityKind::Npc, Position::new(5, 5)));
        assert!(codes(&state).contains(&InvariantCode::InvEntityIdUnique));

        let mut state = valid_state();
        state
            .entities
            .players
            .push(entity("npc-2", EntityKind::Npc, Position::new(6, 6)));
        assert!(codes(&state).contains(&InvariantCode::InvEntityKindBucket));
    }

    #[test]
    fn hp_and_position_bounds() {
        let mut state = valid_state();
        state.entities.players[0].stats.hp_current = 11;
        state.entities.npcs[0].position = Position::new(10, 3);
        let found = codes(&state);
        assert!(found.contains(&InvariantCode::InvHpBounds));
        assert!(found.contains(&InvariantCode::InvPositionInBounds));
    }

    #[test]
    fn solid_overlap_is_caught_but_corpses_may_share() {
        let mut state = valid_state();
        state.entities.npcs[0].position = state.entities.players[0].position;
        assert!(codes(&state).contains(&InvariantCode::InvCellOccupancy));

        // A dead npc no longer blocks the cell.
        state.entities.npcs[0].stats.hp_current = 0;
        state.entities.npcs[0].conditions.push("dead".to_owned());
        assert!(!codes(&state).contains(&InvariantCode::InvCellOccupancy));
    }

    #[test]
    fn combat_shape_checks() {
        let mut state = valid_state();
        state.combat.mode = CombatMode::Combat;
        state.combat.round = 0;
        state.combat.active_entity_id = Some(EntityId::from("ghost"));
        state.combat.initiative_order =
            vec![EntityId::from("pc-a"), EntityId::from("pc-a"), EntityId::from("ghost")];
        let found = codes(&state);
        assert!(found.contains(&InvariantCode::InvCombatRound));
        assert!(found.contains(&InvariantCode::InvInitiativeExists));
        assert!(found.contains(&InvariantCode::InvInitiativeUnique));

        let mut state = valid_state();
        state.combat.round = 3;
        assert!(codes(&state).contains(&InvariantCode::InvExplorationClean));
    }

    #[test]
    fn terrain_and_inventory_checks() {
        let mut state = valid_state();
        state.map.terrain.push(TerrainCell {
            x: 20,
            y: 1,
            kind: "wall".to_owned(),
            blocks_movement: true,
            blocks_vision: true,
        });
        state.map.terrain.push(TerrainCell {
            x: 2,
            y: 2,
            kind: "wall".to_owned(),
            blocks_movement: false,
            blocks_vision: false,
        });
        state.map.terrain.push(TerrainCell {
            x: 2,
            y: 2,
            kind: "water".to_owned(),
            blocks_movement: false,
            blocks_vision: false,
        });
        state.entities.players[0].inventory = vec![
            InventoryItem {
                id: "potion".to_owned(),
                name: "Potion".to_owned(),
                qty: 0,
                tags: Vec::new(),
            },
            InventoryItem {
                id: "potion".to_owned(),
                name: "Potion".to_owned(),
                qty: 1,
                tags: Vec::new(),
            },
        ];
        let found = codes(&state);
        assert!(found.contains(&InvariantCode::InvTerrainInBounds));
        assert!(found.contains(&InvariantCode::InvTerrainCellUnique));
        assert!(found.contains(&InvariantCode::InvInventoryIdUnique));
        assert!(found.contains(&InvariantCode::InvInventoryQty));
    }

    #[test]
    fn rng_and_ui_checks() {
        let mut state = valid_state();
        state.rng.mode = RngMode::Seeded;
        state.rng.seed = Some(String::new());
        state.ui.selected_entity_id = Some(EntityId::from("ghost"));
        state.ui.hovered_cell = Some(Position::new(99, 99));
        let found = codes(&state);
        assert!(found.contains(&InvariantCode::InvRngSeed));
        assert!(found.contains(&InvariantCode::InvUiSelection));
        assert!(found.contains(&InvariantCode::InvUiHover));
    }
}

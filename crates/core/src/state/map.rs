//! Static map geometry: grid dimensions and terrain cells.

use serde::{Deserialize, Serialize};

use super::entity::Position;

/// Grid topology. Range math uses Chebyshev distance in both cases.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GridKind {
    Square,
    Hex,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GridSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GridSpec {
    #[serde(rename = "type")]
    pub kind: GridKind,
    pub size: GridSize,
    pub cell_size: u32,
}

/// A single terrain override at a grid cell.
///
/// Cells absent from the terrain list are plain floor. The `difficult`
/// terrain type doubles movement cost without blocking.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TerrainCell {
    pub x: i32,
    pub y: i32,
    #[serde(rename = "type")]
    pub kind: String,
    pub blocks_movement: bool,
    pub blocks_vision: bool,
}

impl TerrainCell {
    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MapState {
    pub grid: GridSpec,
    #[serde(default)]
    pub terrain: Vec<TerrainCell>,
    #[serde(default)]
    pub fog_of_war_enabled: bool,
}

impl MapState {
    /// A minimal open square map, mostly for tests and scenario seeds.
    pub fn open(width: u32, height: u32) -> Self {
        Self {
            grid: GridSpec {
                kind: GridKind::Square,
                size: GridSize { width, height },
                cell_size: 5,
            },
            terrain: Vec::new(),
            fog_of_war_enabled: false,
        }
    }

    pub fn in_bounds(&self, position: &Position) -> bool {
        position.x >= 0
            && position.y >= 0
            && (position.x as u32) < self.grid.size.width
            && (position.y as u32) < self.grid.size.height
    }

    pub fn terrain_at(&self, position: &Position) -> Option<&TerrainCell> {
        self.terrain
            .iter()
            .find(|cell| cell.x == position.x && cell.y == position.y)
    }

    pub fn blocks_movement(&self, position: &Position) -> bool {
        self.terrain_at(position)
            .map(|cell| cell.blocks_movement)
            .unwrap_or(false)
    }

    /// Movement budget consumed by stepping onto a cell.
    pub fn step_cost(&self, position: &Position) -> u32 {
        match self.terrain_at(position) {
            Some(cell) if cell.kind == "difficult" => 2,
            _ => 1,
        }
    }
}

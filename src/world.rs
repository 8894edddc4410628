//! Grid model shared by the editor draft and every replayed round.
//!
//! A [`World`] is a row-major grid of [`Cell`]s plus the agents standing on
//! it. Cells carry a stack of [`ContentLayer`]s, top layer last. Worlds are
//! values: applying a snapshot yields a new world and leaves the old one as
//! it was.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{EngineError, EngineResult};
use crate::snapshot::{AgentSnapshot, CellSnapshot, GroupSnapshot, StackContent, WorldSnapshot};

/// Upper bound of an agent's energy level.
pub const MAX_ENERGY: u32 = 1000;

/// Grid coordinate, origin at the bottom-left cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Location {
    pub x: i32,
    pub y: i32,
}

impl Location {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Terrain marking of a cell. Anything but `Normal` is a special cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellType {
    #[default]
    Normal,
    Killer,
    Fire,
    Charging,
    Spawn,
}

impl CellType {
    /// Accepts both `CellType.FIRE_CELL` style runner names and plain `fire`.
    pub fn from_wire(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        let key = trimmed.strip_prefix("CellType.").unwrap_or(trimmed);
        let key = key.strip_suffix("_CELL").unwrap_or(key);
        match key.to_ascii_lowercase().as_str() {
            "normal" => Some(CellType::Normal),
            "killer" => Some(CellType::Killer),
            "fire" => Some(CellType::Fire),
            "charging" => Some(CellType::Charging),
            "spawn" => Some(CellType::Spawn),
            _ => None,
        }
    }

    pub fn as_wire(self) -> &'static str {
        match self {
            CellType::Normal => "CellType.NORMAL_CELL",
            CellType::Killer => "CellType.KILLER_CELL",
            CellType::Fire => "CellType.FIRE_CELL",
            CellType::Charging => "CellType.CHARGING_CELL",
            CellType::Spawn => "CellType.SPAWN_CELL",
        }
    }

    pub fn is_special(self) -> bool {
        self != CellType::Normal
    }
}

/// Who may spawn on a spawn cell: every group, or only the listed gids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpawnZone {
    Any,
    Group,
}

/// One entry of a cell's stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ContentLayer {
    Survivor {
        energy_level: u32,
    },
    Rubble {
        energy_required: u32,
        agents_required: u32,
    },
    Spawn {
        zone: SpawnZone,
        groups: BTreeSet<u32>,
    },
}

impl ContentLayer {
    /// Survivors and rubble; spawn markers belong to the special-cell marking.
    pub fn is_stack_content(&self) -> bool {
        !matches!(self, ContentLayer::Spawn { .. })
    }

    pub fn to_stack_content(&self) -> Option<StackContent> {
        match self {
            ContentLayer::Survivor { energy_level } => Some(StackContent::Survivor {
                energy_level: *energy_level,
            }),
            ContentLayer::Rubble {
                energy_required,
                agents_required,
            } => Some(StackContent::Rubble {
                energy_required: *energy_required,
                agents_required: *agents_required,
            }),
            ContentLayer::Spawn { .. } => None,
        }
    }
}

impl From<&StackContent> for ContentLayer {
    fn from(value: &StackContent) -> Self {
        match value {
            StackContent::Survivor { energy_level } => ContentLayer::Survivor {
                energy_level: *energy_level,
            },
            StackContent::Rubble {
                energy_required,
                agents_required,
            } => ContentLayer::Rubble {
                energy_required: *energy_required,
                agents_required: *agents_required,
            },
        }
    }
}

/// A single grid tile with its terrain, move cost and layer stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub loc: Location,
    pub cell_type: CellType,
    pub move_cost: u32,
    /// Bottom to top.
    pub layers: Vec<ContentLayer>,
}

impl Cell {
    pub fn new(loc: Location) -> Self {
        Self {
            loc,
            cell_type: CellType::Normal,
            move_cost: 1,
            layers: Vec::new(),
        }
    }

    pub fn top_layer(&self) -> Option<&ContentLayer> {
        self.layers.last()
    }

    pub fn has_stack_content(&self) -> bool {
        self.layers.iter().any(ContentLayer::is_stack_content)
    }

    pub fn spawn_zone(&self) -> Option<(SpawnZone, &BTreeSet<u32>)> {
        self.layers.iter().find_map(|layer| match layer {
            ContentLayer::Spawn { zone, groups } => Some((*zone, groups)),
            _ => None,
        })
    }

    /// Replaces `self` with a cell the runner delivered. The wire stack only
    /// carries survivors and rubble, so a spawn cell keeps its spawn marker.
    fn redelivered(&self, mut delivered: Cell) -> Cell {
        if delivered.cell_type == CellType::Spawn && delivered.spawn_zone().is_none() {
            if let Some(spawn) = self
                .layers
                .iter()
                .find(|layer| matches!(layer, ContentLayer::Spawn { .. }))
            {
                delivered.layers.insert(0, spawn.clone());
            }
        }
        delivered
    }

    fn from_snapshot(snapshot: &CellSnapshot) -> EngineResult<Self> {
        let loc = snapshot.stack.cell_loc;
        let cell_type = CellType::from_wire(&snapshot.cell_type).ok_or_else(|| {
            EngineError::InvalidSnapshot(format!(
                "unknown cell type '{}' at ({}, {})",
                snapshot.cell_type, loc.x, loc.y
            ))
        })?;
        if snapshot.stack.move_cost == 0 {
            return Err(EngineError::InvalidSnapshot(format!(
                "cell ({}, {}) has a move cost of zero",
                loc.x, loc.y
            )));
        }
        Ok(Self {
            loc,
            cell_type,
            move_cost: snapshot.stack.move_cost,
            layers: snapshot.stack.contents.iter().map(ContentLayer::from).collect(),
        })
    }
}

/// Agent ids are only unique within their group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentKey {
    pub id: u32,
    pub gid: u32,
}

/// An agent as reported at the end of a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: u32,
    pub gid: u32,
    pub loc: Location,
    pub energy_level: u32,
    pub command_sent: String,
    pub steps_taken: u32,
}

impl Agent {
    pub fn key(&self) -> AgentKey {
        AgentKey {
            id: self.id,
            gid: self.gid,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.energy_level > 0
    }
}

impl From<&AgentSnapshot> for Agent {
    fn from(value: &AgentSnapshot) -> Self {
        Self {
            id: value.id,
            gid: value.gid,
            loc: Location::new(value.x, value.y),
            energy_level: value.energy_level.clamp(0, i64::from(MAX_ENERGY)) as u32,
            command_sent: value.command_sent.clone(),
            steps_taken: value.steps_taken,
        }
    }
}

/// Per-group score sheet of a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub gid: u32,
    pub name: String,
    pub score: i64,
    pub survivors_saved: u32,
    pub correct_predictions: u32,
    pub incorrect_predictions: u32,
}

impl From<&GroupSnapshot> for Group {
    fn from(value: &GroupSnapshot) -> Self {
        Self {
            gid: value.gid,
            name: value.name.clone(),
            score: value.score,
            survivors_saved: value.number_saved,
            correct_predictions: value.number_predicted_right,
            incorrect_predictions: value.number_predicted_wrong,
        }
    }
}

/// Aggregates recomputed from cell and agent data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldCounts {
    pub agents_alive: u32,
    pub agents_dead: u32,
    pub survivors_alive: u32,
    pub survivors_dead: u32,
}

impl WorldCounts {
    pub fn total_survivors(&self) -> u32 {
        self.survivors_alive + self.survivors_dead
    }
}

/// The full grid plus the agents on it, with counters kept in step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct World {
    width: u32,
    height: u32,
    cells: Vec<Cell>,
    agents: Vec<Agent>,
    counts: WorldCounts,
}

impl World {
    /// A blank grid: every cell normal, move cost 1, no layers.
    pub fn new(width: u32, height: u32) -> Self {
        let mut cells = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height as i32 {
            for x in 0..width as i32 {
                cells.push(Cell::new(Location::new(x, y)));
            }
        }
        Self {
            width,
            height,
            cells,
            agents: Vec::new(),
            counts: WorldCounts::default(),
        }
    }

    /// Builds a world from a snapshot that must describe every cell of the grid.
    pub fn from_snapshot(width: u32, height: u32, snapshot: &WorldSnapshot) -> EngineResult<Self> {
        let expected = width as usize * height as usize;
        if snapshot.cell_data.len() != expected {
            return Err(EngineError::InvalidSnapshot(format!(
                "expected {expected} cells for a {width}x{height} grid, got {}",
                snapshot.cell_data.len()
            )));
        }
        World::new(width, height).apply_snapshot(snapshot)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < i64::from(self.width) && y < i64::from(self.height)
    }

    fn index_of(&self, x: i32, y: i32) -> EngineResult<usize> {
        if !self.contains(i64::from(x), i64::from(y)) {
            return Err(EngineError::OutOfBounds {
                x: i64::from(x),
                y: i64::from(y),
                width: self.width,
                height: self.height,
            });
        }
        Ok(x as usize + y as usize * self.width as usize)
    }

    pub fn cell_at(&self, x: i32, y: i32) -> EngineResult<&Cell> {
        let index = self.index_of(x, y)?;
        Ok(&self.cells[index])
    }

    pub(crate) fn cell_at_mut(&mut self, x: i32, y: i32) -> EngineResult<&mut Cell> {
        let index = self.index_of(x, y)?;
        Ok(&mut self.cells[index])
    }

    /// Layers of a cell, top layer last.
    pub fn layers_at(&self, x: i32, y: i32) -> EngineResult<&[ContentLayer]> {
        Ok(&self.cell_at(x, y)?.layers)
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn agent_at(&self, id: u32, gid: u32) -> Option<&Agent> {
        self.agents
            .iter()
            .find(|agent| agent.id == id && agent.gid == gid)
    }

    pub fn agents_at(&self, x: i32, y: i32) -> Vec<&Agent> {
        let loc = Location::new(x, y);
        self.agents.iter().filter(|agent| agent.loc == loc).collect()
    }

    pub fn counts(&self) -> WorldCounts {
        self.counts
    }

    /// Produces the world that follows `self` once `snapshot` is applied.
    ///
    /// Delivered cells replace the previous ones exactly as sent. Cells that
    /// were not delivered carry over and lose their top layer once per
    /// `top_layer_rem_data` entry naming them. Agents are replaced wholesale.
    pub fn apply_snapshot(&self, snapshot: &WorldSnapshot) -> EngineResult<World> {
        let mut next = self.clone();
        let mut delivered = HashSet::with_capacity(snapshot.cell_data.len());

        for cell_snapshot in &snapshot.cell_data {
            let cell = Cell::from_snapshot(cell_snapshot)?;
            let index = next.index_of(cell.loc.x, cell.loc.y)?;
            if !delivered.insert(index) {
                return Err(EngineError::InvalidSnapshot(format!(
                    "cell ({}, {}) delivered more than once",
                    cell.loc.x, cell.loc.y
                )));
            }
            next.cells[index] = next.cells[index].redelivered(cell);
        }

        for loc in &snapshot.top_layer_rem_data {
            let index = next.index_of(loc.x, loc.y)?;
            if !delivered.contains(&index) {
                next.cells[index].layers.pop();
            }
        }

        let mut agents = Vec::with_capacity(snapshot.agent_data.len());
        let mut keys = HashSet::with_capacity(snapshot.agent_data.len());
        for agent_snapshot in &snapshot.agent_data {
            let agent = Agent::from(agent_snapshot);
            next.index_of(agent.loc.x, agent.loc.y)?;
            if !keys.insert(agent.key()) {
                return Err(EngineError::InvalidSnapshot(format!(
                    "agent (id {}, group {}) listed more than once",
                    agent.id, agent.gid
                )));
            }
            agents.push(agent);
        }
        next.agents = agents;
        next.recount();
        next.check_declared_counts(snapshot);
        Ok(next)
    }

    fn check_declared_counts(&self, snapshot: &WorldSnapshot) {
        let declared = WorldCounts {
            agents_alive: snapshot.number_of_alive_agents,
            agents_dead: snapshot.number_of_dead_agents,
            survivors_alive: snapshot.number_of_survivors_alive,
            survivors_dead: snapshot.number_of_survivors_dead,
        };
        if declared != WorldCounts::default() && declared != self.counts {
            warn!(
                ?declared,
                computed = ?self.counts,
                "snapshot counters disagree with cell and agent data, using computed values"
            );
        }
    }

    pub fn recount(&mut self) {
        let mut counts = WorldCounts::default();
        for agent in &self.agents {
            if agent.is_alive() {
                counts.agents_alive += 1;
            } else {
                counts.agents_dead += 1;
            }
        }
        for layer in self.cells.iter().flat_map(|cell| cell.layers.iter()) {
            if let ContentLayer::Survivor { energy_level } = layer {
                if *energy_level > 0 {
                    counts.survivors_alive += 1;
                } else {
                    counts.survivors_dead += 1;
                }
            }
        }
        self.counts = counts;
    }

    /// True when nothing has been painted on the grid yet.
    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(|cell| {
            cell.layers.is_empty() && cell.cell_type == CellType::Normal && cell.move_cost == 1
        })
    }

    pub fn cells_of_type(&self, cell_type: CellType) -> impl Iterator<Item = &Cell> {
        self.cells
            .iter()
            .filter(move |cell| cell.cell_type == cell_type)
    }

    pub fn move_cost_range(&self) -> Option<(u32, u32)> {
        let min = self.cells.iter().map(|cell| cell.move_cost).min()?;
        let max = self.cells.iter().map(|cell| cell.move_cost).max()?;
        Some((min, max))
    }

    pub fn spawn_zones(&self) -> impl Iterator<Item = (Location, SpawnZone, &BTreeSet<u32>)> {
        self.cells.iter().filter_map(|cell| {
            cell.spawn_zone()
                .map(|(zone, groups)| (cell.loc, zone, groups))
        })
    }

    pub fn has_survivors(&self) -> bool {
        self.cells.iter().any(|cell| {
            cell.layers
                .iter()
                .any(|layer| matches!(layer, ContentLayer::Survivor { .. }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::StackSnapshot;

    fn cell(x: i32, y: i32, cell_type: &str, contents: Vec<StackContent>) -> CellSnapshot {
        CellSnapshot {
            cell_type: cell_type.to_string(),
            stack: StackSnapshot {
                cell_loc: Location::new(x, y),
                move_cost: 1,
                contents,
            },
        }
    }

    fn agent(id: u32, gid: u32, x: i32, y: i32, energy_level: i64) -> AgentSnapshot {
        AgentSnapshot {
            id,
            gid,
            x,
            y,
            energy_level,
            command_sent: "MOVE".into(),
            steps_taken: 0,
        }
    }

    #[test]
    fn cell_at_rejects_out_of_bounds() {
        let world = World::new(4, 3);
        assert!(world.cell_at(3, 2).is_ok());
        assert!(matches!(
            world.cell_at(4, 0),
            Err(EngineError::OutOfBounds { x: 4, y: 0, .. })
        ));
        assert!(world.cell_at(0, -1).is_err());
        assert!(world.layers_at(2, 2).expect("in bounds").is_empty());
    }

    #[test]
    fn every_cell_answers_with_its_own_location() {
        let world = World::new(5, 4);
        for y in 0..4 {
            for x in 0..5 {
                assert_eq!(world.cell_at(x, y).unwrap().loc, Location::new(x, y));
            }
        }
    }

    #[test]
    fn snapshot_preserves_layer_order() {
        let snapshot = WorldSnapshot {
            cell_data: vec![cell(
                1,
                1,
                "CellType.NORMAL_CELL",
                vec![
                    StackContent::Rubble {
                        energy_required: 3,
                        agents_required: 1,
                    },
                    StackContent::Survivor { energy_level: 10 },
                ],
            )],
            ..WorldSnapshot::default()
        };
        let world = World::new(3, 3).apply_snapshot(&snapshot).unwrap();
        let layers = world.layers_at(1, 1).unwrap();
        assert!(matches!(layers[0], ContentLayer::Rubble { .. }));
        assert_eq!(layers[1], ContentLayer::Survivor { energy_level: 10 });
    }

    #[test]
    fn snapshot_rejects_duplicate_and_stray_cells() {
        let duplicate = WorldSnapshot {
            cell_data: vec![cell(0, 0, "normal", vec![]), cell(0, 0, "fire", vec![])],
            ..WorldSnapshot::default()
        };
        assert!(matches!(
            World::new(2, 2).apply_snapshot(&duplicate),
            Err(EngineError::InvalidSnapshot(_))
        ));

        let stray = WorldSnapshot {
            cell_data: vec![cell(5, 0, "normal", vec![])],
            ..WorldSnapshot::default()
        };
        assert!(matches!(
            World::new(2, 2).apply_snapshot(&stray),
            Err(EngineError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn full_snapshot_must_cover_grid() {
        let snapshot = WorldSnapshot {
            cell_data: vec![cell(0, 0, "normal", vec![])],
            ..WorldSnapshot::default()
        };
        assert!(World::from_snapshot(2, 1, &snapshot).is_err());
    }

    #[test]
    fn counters_are_recomputed_not_trusted() {
        let snapshot = WorldSnapshot {
            cell_data: vec![
                cell(0, 0, "normal", vec![StackContent::Survivor { energy_level: 5 }]),
                cell(1, 0, "normal", vec![StackContent::Survivor { energy_level: 0 }]),
            ],
            agent_data: vec![agent(1, 1, 0, 0, 40), agent(2, 1, 1, 0, 0)],
            number_of_alive_agents: 99,
            number_of_survivors_alive: 42,
            ..WorldSnapshot::default()
        };
        let world = World::new(2, 1).apply_snapshot(&snapshot).unwrap();
        let counts = world.counts();
        assert_eq!(counts.agents_alive, 1);
        assert_eq!(counts.agents_dead, 1);
        assert_eq!(counts.survivors_alive, 1);
        assert_eq!(counts.survivors_dead, 1);
        assert_eq!(counts.total_survivors(), 2);
    }

    #[test]
    fn top_layer_removal_only_touches_carried_cells() {
        let mut base = World::new(2, 1);
        base.cell_at_mut(0, 0).unwrap().layers = vec![
            ContentLayer::Rubble {
                energy_required: 1,
                agents_required: 1,
            },
            ContentLayer::Survivor { energy_level: 9 },
        ];
        let snapshot = WorldSnapshot {
            cell_data: vec![cell(
                1,
                0,
                "normal",
                vec![StackContent::Survivor { energy_level: 2 }],
            )],
            top_layer_rem_data: vec![Location::new(0, 0), Location::new(1, 0)],
            ..WorldSnapshot::default()
        };
        let next = base.apply_snapshot(&snapshot).unwrap();
        assert_eq!(next.layers_at(0, 0).unwrap().len(), 1);
        assert_eq!(next.layers_at(1, 0).unwrap().len(), 1);
        assert_eq!(base.layers_at(0, 0).unwrap().len(), 2);
    }

    #[test]
    fn agents_need_both_ids() {
        let snapshot = WorldSnapshot {
            agent_data: vec![agent(1, 1, 0, 0, 100), agent(1, 2, 1, 1, 2000)],
            ..WorldSnapshot::default()
        };
        let world = World::new(2, 2).apply_snapshot(&snapshot).unwrap();
        assert_eq!(world.agent_at(1, 2).unwrap().loc, Location::new(1, 1));
        assert_eq!(world.agent_at(1, 2).unwrap().energy_level, MAX_ENERGY);
        assert!(world.agent_at(2, 1).is_none());
        assert_eq!(world.agents_at(0, 0).len(), 1);
    }

    #[test]
    fn wire_cell_types_parse() {
        assert_eq!(CellType::from_wire("CellType.KILLER_CELL"), Some(CellType::Killer));
        assert_eq!(CellType::from_wire("charging"), Some(CellType::Charging));
        assert_eq!(CellType::from_wire("lava"), None);
        assert_eq!(
            CellType::from_wire(CellType::Spawn.as_wire()),
            Some(CellType::Spawn)
        );
    }

    #[test]
    fn redelivered_spawn_cell_keeps_its_zone() {
        let mut base = World::new(2, 1);
        {
            let cell = base.cell_at_mut(0, 0).unwrap();
            cell.cell_type = CellType::Spawn;
            cell.layers = vec![ContentLayer::Spawn {
                zone: SpawnZone::Group,
                groups: BTreeSet::from([2]),
            }];
        }
        let snapshot = WorldSnapshot {
            cell_data: vec![
                cell(0, 0, "CellType.SPAWN_CELL", vec![]),
                cell(1, 0, "CellType.SPAWN_CELL", vec![]),
            ],
            ..WorldSnapshot::default()
        };
        let next = base.apply_snapshot(&snapshot).unwrap();
        let zones: Vec<_> = next
            .spawn_zones()
            .map(|(loc, zone, groups)| (loc, zone, groups.clone()))
            .collect();
        assert_eq!(
            zones,
            vec![(Location::new(0, 0), SpawnZone::Group, BTreeSet::from([2]))]
        );

        let demoted = WorldSnapshot {
            cell_data: vec![cell(0, 0, "normal", vec![])],
            ..WorldSnapshot::default()
        };
        assert_eq!(next.apply_snapshot(&demoted).unwrap().spawn_zones().count(), 0);
    }

    #[test]
    fn move_cost_range_tracks_extremes() {
        let mut world = World::new(3, 1);
        assert!(world.is_empty());
        world.cell_at_mut(2, 0).unwrap().move_cost = 7;
        assert_eq!(world.move_cost_range(), Some((1, 7)));
        assert!(!world.is_empty());
    }
}

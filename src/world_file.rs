//! Editor-authored world files.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{EngineError, EngineResult};
use crate::snapshot::StackSnapshot;
use crate::world::{CellType, ContentLayer, Location, SpawnZone, World};

pub const WORLD_FILE_EXTENSION: &str = "world";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldFile {
    pub settings: Settings,
    #[serde(default)]
    pub spawn_locs: Vec<SpawnLocation>,
    #[serde(default)]
    pub cell_types: CellTypes,
    #[serde(default)]
    pub stacks: Vec<StackSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub world_info: WorldInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldInfo {
    pub size: Size,
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub world_file_levels: Levels,
    #[serde(default)]
    pub agent_energy: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Levels {
    pub high: u32,
    pub mid: u32,
    pub low: u32,
}

/// A spawn entry without `gid` opens the cell to every group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnLocation {
    pub x: i32,
    pub y: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gid: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellTypes {
    #[serde(default)]
    pub fire_cells: Vec<Location>,
    #[serde(default)]
    pub killer_cells: Vec<Location>,
    #[serde(default)]
    pub charging_cells: Vec<Location>,
}

impl WorldInfo {
    pub fn new(width: u32, height: u32, agent_energy: u32) -> Self {
        Self {
            size: Size { width, height },
            seed: 0,
            world_file_levels: Levels::default(),
            agent_energy,
        }
    }

    /// Replaces a zero seed and zero levels with random picks.
    pub fn fill_unset<R: Rng>(&mut self, rng: &mut R) {
        if self.seed == 0 {
            self.seed = rng.gen_range(1..10_000);
        }
        let levels = &mut self.world_file_levels;
        if levels.high == 0 {
            levels.high = rng.gen_range(11..=15);
        }
        if levels.mid == 0 {
            levels.mid = rng.gen_range(6..=10);
        }
        if levels.low == 0 {
            levels.low = rng.gen_range(1..=5);
        }
    }
}

/// Deterministic when seeded, otherwise drawn from the OS.
pub fn world_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}

/// Reasons a world cannot be exported, first one wins.
pub fn validate(world: &World) -> EngineResult<()> {
    if world.spawn_zones().next().is_none() {
        return Err(EngineError::Rejected("Missing spawn zones".into()));
    }
    if !world.has_survivors() {
        return Err(EngineError::Rejected("Missing at least 1 survivor".into()));
    }
    Ok(())
}

impl WorldFile {
    pub fn export<R: Rng>(world: &World, mut info: WorldInfo, rng: &mut R) -> EngineResult<Self> {
        validate(world)?;
        info.size = Size {
            width: world.width(),
            height: world.height(),
        };
        info.fill_unset(rng);

        let mut spawn_locs = Vec::new();
        for (loc, zone, groups) in world.spawn_zones() {
            match zone {
                SpawnZone::Any => spawn_locs.push(SpawnLocation {
                    x: loc.x,
                    y: loc.y,
                    gid: None,
                }),
                SpawnZone::Group => spawn_locs.extend(groups.iter().map(|gid| SpawnLocation {
                    x: loc.x,
                    y: loc.y,
                    gid: Some(*gid),
                })),
            }
        }

        let locations = |cell_type| {
            world
                .cells_of_type(cell_type)
                .map(|cell| cell.loc)
                .collect::<Vec<_>>()
        };
        let cell_types = CellTypes {
            fire_cells: locations(CellType::Fire),
            killer_cells: locations(CellType::Killer),
            charging_cells: locations(CellType::Charging),
        };

        let stacks = world
            .cells()
            .iter()
            .map(|cell| StackSnapshot {
                cell_loc: cell.loc,
                move_cost: cell.move_cost,
                contents: cell
                    .layers
                    .iter()
                    .filter_map(ContentLayer::to_stack_content)
                    .collect(),
            })
            .collect();

        Ok(Self {
            settings: Settings { world_info: info },
            spawn_locs,
            cell_types,
            stacks,
        })
    }

    pub fn info(&self) -> &WorldInfo {
        &self.settings.world_info
    }

    /// Rebuilds the editor grid described by the file.
    pub fn to_world(&self) -> EngineResult<World> {
        let Size { width, height } = self.info().size;
        if width == 0 || height == 0 {
            return Err(EngineError::InvalidSnapshot(format!(
                "world size {width}x{height} is empty"
            )));
        }
        let mut world = World::new(width, height);

        for stack in &self.stacks {
            if stack.move_cost == 0 {
                return Err(EngineError::InvalidSnapshot(format!(
                    "cell ({}, {}) has a move cost of zero",
                    stack.cell_loc.x, stack.cell_loc.y
                )));
            }
            let cell = world.cell_at_mut(stack.cell_loc.x, stack.cell_loc.y)?;
            cell.move_cost = stack.move_cost;
            cell.layers = stack.contents.iter().map(ContentLayer::from).collect();
        }

        let typed = [
            (CellType::Fire, &self.cell_types.fire_cells),
            (CellType::Killer, &self.cell_types.killer_cells),
            (CellType::Charging, &self.cell_types.charging_cells),
        ];
        for (cell_type, locations) in typed {
            for loc in locations {
                world.cell_at_mut(loc.x, loc.y)?.cell_type = cell_type;
            }
        }

        let mut spawns: BTreeMap<Location, ContentLayer> = BTreeMap::new();
        for spawn in &self.spawn_locs {
            let loc = Location::new(spawn.x, spawn.y);
            let entry = spawns.entry(loc).or_insert(ContentLayer::Spawn {
                zone: SpawnZone::Any,
                groups: Default::default(),
            });
            if let (Some(gid), ContentLayer::Spawn { zone, groups }) = (spawn.gid, entry) {
                *zone = SpawnZone::Group;
                groups.insert(gid);
            }
        }
        for (loc, spawn) in spawns {
            let cell = world.cell_at_mut(loc.x, loc.y)?;
            if cell.cell_type.is_special() {
                return Err(EngineError::InvalidSnapshot(format!(
                    "cell ({}, {}) is both {:?} and a spawn zone",
                    loc.x, loc.y, cell.cell_type
                )));
            }
            cell.cell_type = CellType::Spawn;
            cell.layers.retain(ContentLayer::is_stack_content);
            cell.layers.push(spawn);
        }

        world.recount();
        Ok(world)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Failed to parse world file")
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialise world file")
    }
}

pub struct WorldFileLoader {
    base_dir: PathBuf,
}

impl WorldFileLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<WorldFile> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read world file {}", path.display()))?;
        let world_file: WorldFile = serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(world_file)
    }

    /// Writes `<name>.world` under the base directory and returns its path.
    pub fn save(&self, name: &str, world_file: &WorldFile) -> Result<PathBuf> {
        fs::create_dir_all(&self.base_dir)
            .with_context(|| format!("Failed to create {}", self.base_dir.display()))?;
        let path = self
            .base_dir
            .join(name)
            .with_extension(WORLD_FILE_EXTENSION);
        fs::write(&path, world_file.to_json()?)
            .with_context(|| format!("Failed to write world file {}", path.display()))?;
        info!(path = %path.display(), "world exported");
        Ok(path)
    }
}

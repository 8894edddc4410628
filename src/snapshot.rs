//! Wire format of the round payloads emitted by the simulation runner.

use serde::{Deserialize, Serialize};

use crate::world::Location;

fn default_move_cost() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundPayload {
    pub event_type: String,
    #[serde(default)]
    pub round: u32,
    #[serde(default)]
    pub after_world: WorldSnapshot,
    #[serde(default)]
    pub groups_data: Vec<GroupSnapshot>,
}

impl RoundPayload {
    /// Runner events other than round snapshots share the same stream.
    pub fn is_round_event(&self) -> bool {
        self.event_type.starts_with("Round")
    }

    /// Marks the start of another game in the same stream.
    pub fn is_game_header(&self) -> bool {
        self.event_type.starts_with("GameHeader")
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    #[serde(default)]
    pub cell_data: Vec<CellSnapshot>,
    #[serde(default)]
    pub agent_data: Vec<AgentSnapshot>,
    #[serde(default)]
    pub top_layer_rem_data: Vec<Location>,
    #[serde(default)]
    pub number_of_alive_agents: u32,
    #[serde(default)]
    pub number_of_dead_agents: u32,
    #[serde(default)]
    pub number_of_survivors: u32,
    #[serde(default)]
    pub number_of_survivors_alive: u32,
    #[serde(default)]
    pub number_of_survivors_dead: u32,
    #[serde(default)]
    pub number_of_survivors_saved_alive: u32,
    #[serde(default)]
    pub number_of_survivors_saved_dead: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellSnapshot {
    pub cell_type: String,
    pub stack: StackSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackSnapshot {
    pub cell_loc: Location,
    #[serde(default = "default_move_cost")]
    pub move_cost: u32,
    #[serde(default)]
    pub contents: Vec<StackContent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "arguments")]
pub enum StackContent {
    #[serde(rename = "sv", alias = "SV")]
    Survivor { energy_level: u32 },
    #[serde(rename = "rb", alias = "RB")]
    Rubble {
        energy_required: u32,
        agents_required: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub id: u32,
    pub gid: u32,
    pub x: i32,
    pub y: i32,
    pub energy_level: i64,
    #[serde(default)]
    pub command_sent: String,
    #[serde(default)]
    pub steps_taken: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSnapshot {
    pub gid: u32,
    pub name: String,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub number_saved: u32,
    #[serde(default)]
    pub number_predicted_right: u32,
    #[serde(default)]
    pub number_predicted_wrong: u32,
}

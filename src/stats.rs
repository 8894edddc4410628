//! Figures shown in the sidebar for the round on screen.

use serde::Serialize;

use crate::timeline::Round;
use crate::world::{Group, World};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorldStats {
    pub agents_alive: u32,
    pub agents_dead: u32,
    /// Survivors still on the grid plus the ones already saved.
    pub total_survivors: u32,
    pub survivors_saved: u32,
    pub max_steps_taken: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupStats {
    pub gid: u32,
    pub name: String,
    pub score: i64,
    pub survivors_saved: u32,
    pub correct_predictions: u32,
    pub incorrect_predictions: u32,
    /// `None` until the group made a prediction.
    pub prediction_accuracy: Option<f64>,
}

impl From<&Group> for GroupStats {
    fn from(group: &Group) -> Self {
        let predictions = group.correct_predictions + group.incorrect_predictions;
        Self {
            gid: group.gid,
            name: group.name.clone(),
            score: group.score,
            survivors_saved: group.survivors_saved,
            correct_predictions: group.correct_predictions,
            incorrect_predictions: group.incorrect_predictions,
            prediction_accuracy: (predictions > 0)
                .then(|| f64::from(group.correct_predictions) / f64::from(predictions)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Stats {
    pub world: WorldStats,
    pub groups: Vec<GroupStats>,
}

impl Stats {
    /// Highest scoring group; ties go to the lower gid.
    pub fn leader(&self) -> Option<&GroupStats> {
        self.groups
            .iter()
            .max_by(|a, b| a.score.cmp(&b.score).then(b.gid.cmp(&a.gid)))
    }
}

pub fn world_stats(world: &World, survivors_saved: u32) -> WorldStats {
    let counts = world.counts();
    WorldStats {
        agents_alive: counts.agents_alive,
        agents_dead: counts.agents_dead,
        total_survivors: counts.total_survivors() + survivors_saved,
        survivors_saved,
        max_steps_taken: world
            .agents()
            .iter()
            .map(|agent| agent.steps_taken)
            .max()
            .unwrap_or(0),
    }
}

pub fn round_stats(round: &Round) -> Stats {
    Stats {
        world: world_stats(round.world(), round.survivors_saved()),
        groups: round.groups().iter().map(GroupStats::from).collect(),
    }
}

/// Shade bucket of `value` within `[min, max]` for terrain colouring.
pub fn shade_bucket(min: u32, max: u32, value: u32, buckets: usize) -> usize {
    if buckets == 0 || max <= min {
        return 0;
    }
    let span = f64::from(max - min) / buckets as f64;
    (0..buckets)
        .find(|bucket| f64::from(value) <= f64::from(min) + span * (*bucket as f64 + 1.0))
        .unwrap_or(0)
}

//! Immutable round snapshots and the navigable playback timeline.

use serde::Serialize;

use crate::error::{EngineError, EngineResult};
use crate::snapshot::RoundPayload;
use crate::world::{Group, Location, World};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Round {
    number: u32,
    event_type: String,
    world: World,
    groups: Vec<Group>,
    layers_removed: Vec<Location>,
    declared_saved: u32,
}

impl Round {
    /// Round 0: the world as it stands before any agent has acted.
    pub fn zero(world: World) -> Self {
        Self {
            number: 0,
            event_type: "RoundZero".into(),
            world,
            groups: Vec::new(),
            layers_removed: Vec::new(),
            declared_saved: 0,
        }
    }

    /// Round 0 delivered by the runner. A snapshot with cell data must cover
    /// the whole grid of `draft`; one without cells decorates the draft.
    pub fn first(draft: &World, payload: &RoundPayload) -> EngineResult<Self> {
        let world = if payload.after_world.cell_data.is_empty() {
            draft.apply_snapshot(&payload.after_world)?
        } else {
            World::from_snapshot(draft.width(), draft.height(), &payload.after_world)?
        };
        Ok(Self::assemble(world, payload))
    }

    /// Builds the round described by `payload` on top of the previous world.
    pub fn from_payload(previous: &World, payload: &RoundPayload) -> EngineResult<Self> {
        let world = previous.apply_snapshot(&payload.after_world)?;
        Ok(Self::assemble(world, payload))
    }

    fn assemble(world: World, payload: &RoundPayload) -> Self {
        let snapshot = &payload.after_world;
        Self {
            number: payload.round,
            event_type: payload.event_type.clone(),
            world,
            groups: payload.groups_data.iter().map(Group::from).collect(),
            layers_removed: snapshot.top_layer_rem_data.clone(),
            declared_saved: snapshot.number_of_survivors_saved_alive
                + snapshot.number_of_survivors_saved_dead,
        }
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn is_round_zero(&self) -> bool {
        self.number == 0
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn group(&self, gid: u32) -> Option<&Group> {
        self.groups.iter().find(|group| group.gid == gid)
    }

    /// Cells whose top layer was consumed this round; drives transition
    /// animation only.
    pub fn layers_removed(&self) -> &[Location] {
        &self.layers_removed
    }

    /// Saved survivors have left the grid, so the total comes from group
    /// data, falling back to the snapshot counters when no group reported.
    pub fn survivors_saved(&self) -> u32 {
        if self.groups.is_empty() {
            return self.declared_saved;
        }
        self.groups.iter().map(|group| group.survivors_saved).sum()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SimulationState {
    pub current_round: u32,
    pub max_rounds: u32,
    pub is_round_zero: bool,
}

#[derive(Debug, Clone)]
pub struct Timeline {
    rounds: Vec<Round>,
    state: SimulationState,
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Timeline {
    pub fn new() -> Self {
        Self {
            rounds: Vec::new(),
            state: SimulationState {
                current_round: 0,
                max_rounds: 0,
                is_round_zero: true,
            },
        }
    }

    pub fn state(&self) -> SimulationState {
        self.state
    }

    pub fn current_round(&self) -> u32 {
        self.state.current_round
    }

    pub fn max_rounds(&self) -> u32 {
        self.state.max_rounds
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    /// The round number the timeline will accept next.
    pub fn expected_round(&self) -> u32 {
        self.rounds.len() as u32
    }

    pub fn append_round(&mut self, round: Round) -> EngineResult<()> {
        let expected = self.expected_round();
        if round.number != expected {
            return Err(EngineError::Sequence {
                expected,
                received: round.number,
            });
        }
        self.state.max_rounds = round.number;
        self.rounds.push(round);
        Ok(())
    }

    /// Clamps `round` into `[0, max_rounds]`; any scrubber position is legal.
    pub fn set_current_round(&mut self, round: i64) -> u32 {
        let clamped = round.clamp(0, i64::from(self.state.max_rounds)) as u32;
        self.state.current_round = clamped;
        self.state.is_round_zero = clamped == 0;
        clamped
    }

    pub fn step_forward(&mut self) -> u32 {
        self.set_current_round(i64::from(self.state.current_round) + 1)
    }

    pub fn step_back(&mut self) -> u32 {
        self.set_current_round(i64::from(self.state.current_round) - 1)
    }

    pub fn is_game_over(&self) -> bool {
        self.state.current_round >= self.state.max_rounds
    }

    /// Whether `round` is the last snapshot ingested so far.
    pub fn is_end(&self, round: &Round) -> bool {
        round.number == self.state.max_rounds
    }

    pub fn round(&self, number: u32) -> Option<&Round> {
        self.rounds.get(number as usize)
    }

    pub fn current(&self) -> Option<&Round> {
        self.round(self.state.current_round)
    }

    pub fn latest(&self) -> Option<&Round> {
        self.rounds.last()
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

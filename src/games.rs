//! Games replayed in one session.
//!
//! A runner stream may hold several games back to back, each announced by a
//! game header. Every game keeps its own timeline; exactly one of them is
//! current, and that is the one the scrubber and the queries look at.

use serde::Serialize;

use crate::error::{EngineError, EngineResult};
use crate::timeline::Timeline;

/// Stable handle of a game within its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct GameId(u32);

impl GameId {
    pub fn get(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct Game {
    id: GameId,
    timeline: Timeline,
}

impl Game {
    fn new(id: GameId) -> Self {
        Self {
            id,
            timeline: Timeline::new(),
        }
    }

    pub fn id(&self) -> GameId {
        self.id
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }
}

/// Every game of the session, oldest first. Never empty.
#[derive(Debug, Clone)]
pub struct Games {
    games: Vec<Game>,
    current: usize,
    next_id: u32,
}

impl Default for Games {
    fn default() -> Self {
        Self::new()
    }
}

impl Games {
    pub fn new() -> Self {
        Self {
            games: vec![Game::new(GameId(0))],
            current: 0,
            next_id: 1,
        }
    }

    pub fn all(&self) -> &[Game] {
        &self.games
    }

    pub fn current(&self) -> &Game {
        &self.games[self.current]
    }

    pub(crate) fn current_timeline_mut(&mut self) -> &mut Timeline {
        &mut self.games[self.current].timeline
    }

    pub fn get(&self, id: GameId) -> Option<&Game> {
        self.games.iter().find(|game| game.id == id)
    }

    /// Makes a fresh game current. A current game without any round is
    /// reused instead. Returns whether the current game changed.
    pub(crate) fn open(&mut self) -> bool {
        if self.current().timeline.is_empty() {
            return false;
        }
        let game = self.allocate();
        self.games.push(game);
        self.current = self.games.len() - 1;
        true
    }

    /// Returns whether the current game changed.
    pub(crate) fn select(&mut self, id: GameId) -> EngineResult<bool> {
        let index = self
            .games
            .iter()
            .position(|game| game.id == id)
            .ok_or_else(|| EngineError::Rejected(format!("no game with id {}", id.0)))?;
        let changed = index != self.current;
        self.current = index;
        Ok(changed)
    }

    /// Drops every game and starts over with a single empty one.
    pub(crate) fn clear(&mut self) {
        let fresh = self.allocate();
        self.games = vec![fresh];
        self.current = 0;
    }

    fn allocate(&mut self) -> Game {
        let id = GameId(self.next_id);
        self.next_id += 1;
        Game::new(id)
    }
}

//! Session facade: the one value a client holds.
//!
//! A session starts as an editable draft world. `start` freezes the draft
//! into round 0 of the current game; from then on round payloads extend that
//! game's timeline and the scrubber moves over it. A game header in the
//! stream opens another game. Once the current game has a round beyond 0 the
//! map can no longer be edited, until `reset` discards every game.

use tracing::{debug, info, warn};

use crate::brush::{default_brushes, BrushKind, EditorBrush};
use crate::bus::{Bus, CanvasEvent, Topic};
use crate::config::ClientConfig;
use crate::error::{EngineError, EngineResult};
use crate::feed::{Admission, ReorderBuffer};
use crate::games::{Game, GameId, Games};
use crate::interaction::{InteractionState, PointerButton};
use crate::snapshot::RoundPayload;
use crate::stats::{round_stats, world_stats, Stats};
use crate::timeline::{Round, SimulationState, Timeline};
use crate::world::{Agent, ContentLayer, Group, Location, World};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Rounds were appended; carries the last one.
    Applied(u32),
    /// Held until the rounds before it arrive.
    Buffered(u32),
    /// A game header made this game current.
    GameOpened(GameId),
    /// Neither a round nor a game header.
    Ignored,
}

pub struct Simulation {
    config: ClientConfig,
    draft: World,
    games: Games,
    bus: Bus,
    interaction: InteractionState,
    brushes: Vec<EditorBrush>,
    reorder: ReorderBuffer,
    late_rejections: Vec<EngineError>,
}

impl Simulation {
    /// Session with a blank draft sized by the editor configuration.
    pub fn new(config: ClientConfig) -> Self {
        let draft = World::new(config.editor.width, config.editor.height);
        Self::with_world(config, draft)
    }

    pub fn with_world(config: ClientConfig, draft: World) -> Self {
        let bus = Bus::new();
        let interaction =
            InteractionState::new(bus.clone(), config.view, draft.width(), draft.height());
        let reorder = ReorderBuffer::new(config.playback.ordering);
        Self {
            config,
            draft,
            games: Games::new(),
            bus,
            interaction,
            brushes: default_brushes(),
            reorder,
            late_rejections: Vec::new(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn interaction(&self) -> &InteractionState {
        &self.interaction
    }

    /// Timeline of the current game.
    pub fn timeline(&self) -> &Timeline {
        self.games.current().timeline()
    }

    fn timeline_mut(&mut self) -> &mut Timeline {
        self.games.current_timeline_mut()
    }

    pub fn draft(&self) -> &World {
        &self.draft
    }

    pub fn games(&self) -> &[Game] {
        self.games.all()
    }

    pub fn current_game(&self) -> GameId {
        self.games.current().id()
    }

    /// Switches playback to another game of this session.
    pub fn select_game(&mut self, id: GameId) -> EngineResult<()> {
        if self.games.select(id)? {
            self.game_switched();
        }
        Ok(())
    }

    fn game_switched(&mut self) {
        self.reorder.clear();
        self.interaction.clear_selection();
        info!(game = self.current_game().get(), "current game changed");
        self.bus.notify(Topic::GameChanged);
        self.bus.dispatch(CanvasEvent::RenderMap);
        let current = self.timeline().current_round();
        self.set_current_round(i64::from(current));
    }

    pub fn is_started(&self) -> bool {
        !self.timeline().is_empty()
    }

    /// True once a round beyond 0 exists; editing is closed from then on.
    pub fn is_running(&self) -> bool {
        self.timeline().max_rounds() > 0
    }

    /// Freezes the draft into round 0.
    pub fn start(&mut self) -> EngineResult<()> {
        if self.is_started() {
            return Err(EngineError::Rejected("session already started".into()));
        }
        let round_zero = Round::zero(self.draft.clone());
        self.timeline_mut().append_round(round_zero)?;
        self.log_started();
        self.set_current_round(0);
        Ok(())
    }

    fn log_started(&self) {
        info!(
            game = self.current_game().get(),
            width = self.draft.width(),
            height = self.draft.height(),
            "session started"
        );
    }

    /// Feeds one runner payload into the current game. A rejected payload
    /// leaves every stored round, and whether the game has started, as it was.
    pub fn ingest(&mut self, payload: RoundPayload) -> EngineResult<IngestOutcome> {
        let round = payload.round;
        self.admit(payload).map_err(|error| {
            warn!(round, %error, "round rejected");
            error
        })
    }

    /// Errors of buffered rounds that failed once their turn came, oldest
    /// first. The ingest call that released them still succeeded.
    pub fn take_late_rejections(&mut self) -> Vec<EngineError> {
        std::mem::take(&mut self.late_rejections)
    }

    fn admit(&mut self, payload: RoundPayload) -> EngineResult<IngestOutcome> {
        if payload.is_game_header() {
            if self.games.open() {
                self.game_switched();
            }
            return Ok(IngestOutcome::GameOpened(self.current_game()));
        }
        if !payload.is_round_event() {
            debug!(event_type = %payload.event_type, "ignoring non-round event");
            return Ok(IngestOutcome::Ignored);
        }
        if self.is_started() || payload.round == 0 {
            return self.admit_round(payload);
        }

        // A later round before any round 0 starts the game from the draft,
        // but only if the round itself is taken.
        let round_zero = Round::zero(self.draft.clone());
        self.timeline_mut().append_round(round_zero)?;
        match self.admit_round(payload) {
            Ok(outcome) => {
                self.log_started();
                if let IngestOutcome::Buffered(_) = outcome {
                    self.set_current_round(0);
                }
                Ok(outcome)
            }
            Err(error) => {
                self.timeline_mut().reset();
                Err(error)
            }
        }
    }

    fn admit_round(&mut self, payload: RoundPayload) -> EngineResult<IngestOutcome> {
        let expected = self.timeline().expected_round();
        let payload = match self.reorder.admit(expected, payload)? {
            Admission::Ready(payload) => payload,
            Admission::Buffered(round) => {
                debug!(round, expected, "round buffered");
                return Ok(IngestOutcome::Buffered(round));
            }
        };

        let mut last = self.append(&payload)?;
        loop {
            let expected = self.timeline().expected_round();
            let Some(next) = self.reorder.take(expected) else {
                break;
            };
            match self.append(&next) {
                Ok(number) => last = number,
                Err(error) => {
                    warn!(round = next.round, %error, "buffered round rejected");
                    self.late_rejections.push(error);
                    break;
                }
            }
        }

        let target = if self.config.playback.follow_latest {
            last
        } else {
            self.timeline().current_round()
        };
        self.set_current_round(i64::from(target));
        Ok(IngestOutcome::Applied(last))
    }

    fn append(&mut self, payload: &RoundPayload) -> EngineResult<u32> {
        let round = match self.timeline().latest() {
            Some(previous) => Round::from_payload(previous.world(), payload)?,
            None => Round::first(&self.draft, payload)?,
        };
        let number = round.number();
        let counts = round.world().counts();
        self.timeline_mut().append_round(round)?;
        info!(
            round = number,
            agents_alive = counts.agents_alive,
            survivors_alive = counts.survivors_alive,
            "round ingested"
        );
        Ok(number)
    }

    /// Drops every game and any buffered rounds; the draft survives.
    pub fn reset(&mut self) {
        self.games.clear();
        self.reorder.clear();
        self.interaction.clear_selection();
        info!("session reset");
        self.bus.notify(Topic::GameChanged);
        self.bus.notify(Topic::RoundChanged);
        self.bus.dispatch(CanvasEvent::RenderMap);
    }

    pub fn state(&self) -> SimulationState {
        self.timeline().state()
    }

    pub fn is_game_over(&self) -> bool {
        self.timeline().is_game_over()
    }

    /// Moves the scrubber; out-of-range requests are clamped.
    pub fn set_current_round(&mut self, round: i64) -> u32 {
        let current = self.timeline_mut().set_current_round(round);
        self.bus.notify(Topic::RoundChanged);
        self.bus.dispatch(CanvasEvent::Render);
        if let Some(round) = self.timeline().current() {
            if !round.layers_removed().is_empty() {
                self.bus.dispatch(CanvasEvent::RenderStack {
                    cells: round.layers_removed().to_vec(),
                });
            }
        }
        current
    }

    pub fn step_forward(&mut self) -> u32 {
        self.set_current_round(i64::from(self.timeline().current_round()) + 1)
    }

    pub fn step_back(&mut self) -> u32 {
        self.set_current_round(i64::from(self.timeline().current_round()) - 1)
    }

    pub fn current_round(&self) -> Option<&Round> {
        self.timeline().current()
    }

    /// The world on screen: the current round, or the draft before `start`.
    pub fn current_world(&self) -> &World {
        self.timeline()
            .current()
            .map(Round::world)
            .unwrap_or(&self.draft)
    }

    pub fn get_agent_with_ids(&self, id: u32, gid: u32) -> Option<&Agent> {
        self.current_world().agent_at(id, gid)
    }

    pub fn get_layers_at_cell(&self, x: i32, y: i32) -> EngineResult<&[ContentLayer]> {
        self.current_world().layers_at(x, y)
    }

    pub fn groups(&self) -> &[Group] {
        self.timeline()
            .current()
            .map(Round::groups)
            .unwrap_or_default()
    }

    pub fn group(&self, gid: u32) -> Option<&Group> {
        self.groups().iter().find(|group| group.gid == gid)
    }

    pub fn stats(&self) -> Stats {
        match self.timeline().current() {
            Some(round) => round_stats(round),
            None => Stats {
                world: world_stats(&self.draft, 0),
                groups: Vec::new(),
            },
        }
    }

    // Editing

    pub fn brushes(&self) -> &[EditorBrush] {
        &self.brushes
    }

    pub fn brush(&self, kind: BrushKind) -> Option<&EditorBrush> {
        self.brushes.iter().find(|brush| brush.kind() == kind)
    }

    pub fn open_brush(&self) -> Option<&EditorBrush> {
        self.brushes.iter().find(|brush| brush.is_open())
    }

    /// Shows the panel of `kind` and hides every other one.
    pub fn select_brush(&mut self, kind: BrushKind) {
        self.brushes = self
            .brushes
            .iter()
            .map(|brush| brush.with_open(brush.kind() == kind))
            .collect();
        self.bus.notify(Topic::CanvasInteraction);
    }

    pub fn close_brushes(&mut self) {
        self.brushes = self
            .brushes
            .iter()
            .map(|brush| brush.with_open(false))
            .collect();
        self.bus.notify(Topic::CanvasInteraction);
    }

    pub fn set_brush_field(&mut self, kind: BrushKind, key: &str, input: &str) -> EngineResult<()> {
        let brush = self
            .brushes
            .iter_mut()
            .find(|brush| brush.kind() == kind)
            .ok_or_else(|| EngineError::Rejected(format!("no {kind:?} brush")))?;
        brush.fields_mut().set_from_input(key, input)
    }

    /// Cells the open brush would touch under the pointer.
    pub fn brush_preview(&self) -> Vec<Location> {
        match self.open_brush() {
            Some(brush) => brush.targets(&self.draft, self.interaction.hovered()),
            None => Vec::new(),
        }
    }

    pub fn apply_brush(&mut self, kind: BrushKind, x: i64, y: i64) -> EngineResult<bool> {
        self.edit(kind, x, y, PointerButton::Primary)
    }

    pub fn erase_brush(&mut self, kind: BrushKind, x: i64, y: i64) -> EngineResult<bool> {
        self.edit(kind, x, y, PointerButton::Secondary)
    }

    fn edit(&mut self, kind: BrushKind, x: i64, y: i64, button: PointerButton) -> EngineResult<bool> {
        self.ensure_editable()?;
        let brush = self
            .brush(kind)
            .cloned()
            .ok_or_else(|| EngineError::Rejected(format!("no {kind:?} brush")))?;
        let changed = match button {
            PointerButton::Primary => brush.apply(&mut self.draft, x, y, brush.fields())?,
            PointerButton::Secondary => brush.erase(&mut self.draft, x, y, brush.fields())?,
        };
        if changed {
            self.refresh_round_zero()?;
            self.bus.dispatch(CanvasEvent::RenderMap);
        }
        Ok(changed)
    }

    /// Replaces the draft, e.g. with an imported world file.
    pub fn load_world(&mut self, world: World) -> EngineResult<()> {
        self.ensure_editable()?;
        self.interaction.resize(world.width(), world.height());
        self.draft = world;
        self.refresh_round_zero()?;
        self.bus.dispatch(CanvasEvent::RenderMap);
        Ok(())
    }

    fn ensure_editable(&self) -> EngineResult<()> {
        if self.is_running() {
            return Err(EngineError::Editing);
        }
        Ok(())
    }

    /// Keeps a started but not yet running session in step with the draft.
    fn refresh_round_zero(&mut self) -> EngineResult<()> {
        if self.is_started() {
            let round_zero = Round::zero(self.draft.clone());
            let timeline = self.timeline_mut();
            timeline.reset();
            timeline.append_round(round_zero)?;
        }
        Ok(())
    }

    // Canvas input

    pub fn pointer_moved(&mut self, px: f32, py: f32) -> Option<Location> {
        let before = self.interaction.hovered();
        let tile = self.interaction.pointer_moved(px, py);
        if let Some(loc) = tile.filter(|loc| Some(*loc) != before) {
            let button = if self.interaction.mouse_down() {
                Some(PointerButton::Primary)
            } else if self.interaction.right_down() {
                Some(PointerButton::Secondary)
            } else {
                None
            };
            if let Some(button) = button {
                self.paint_with_open_brush(loc, button);
            }
        }
        tile
    }

    pub fn pointer_left(&mut self) {
        self.interaction.pointer_left();
    }

    pub fn button_pressed(&mut self, button: PointerButton) {
        self.interaction.button_pressed(button);
    }

    pub fn button_released(&mut self, button: PointerButton) {
        self.interaction.button_released(button);
    }

    /// Forwards a click to the interaction state and paints with the open
    /// brush, if any.
    pub fn click(&mut self, px: f32, py: f32, button: PointerButton) -> Option<Location> {
        let tile = self.interaction.click(px, py, button)?;
        self.paint_with_open_brush(tile, button);
        Some(tile)
    }

    fn paint_with_open_brush(&mut self, loc: Location, button: PointerButton) {
        let Some(kind) = self.open_brush().map(EditorBrush::kind) else {
            return;
        };
        if kind == BrushKind::View || self.is_running() {
            return;
        }
        if let Err(error) = self.edit(kind, i64::from(loc.x), i64::from(loc.y), button) {
            debug!(%error, x = loc.x, y = loc.y, "brush stroke skipped");
        }
    }
}

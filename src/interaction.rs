//! Pointer-derived canvas state: hovered tile, selection, held buttons.
//!
//! Every change is announced on [`Topic::CanvasInteraction`] so hover
//! highlights, the info panel and brush previews re-read it instead of
//! polling.

use crate::bus::{Bus, CanvasEvent, Topic};
use crate::config::ViewConfig;
use crate::world::Location;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
}

pub struct InteractionState {
    bus: Bus,
    view: ViewConfig,
    width: u32,
    height: u32,
    hovered: Option<Location>,
    selected: Option<Location>,
    mouse_down: bool,
    right_down: bool,
}

impl InteractionState {
    pub fn new(bus: Bus, view: ViewConfig, width: u32, height: u32) -> Self {
        Self {
            bus,
            view,
            width,
            height,
            hovered: None,
            selected: None,
            mouse_down: false,
            right_down: false,
        }
    }

    pub fn hovered(&self) -> Option<Location> {
        self.hovered
    }

    pub fn selected(&self) -> Option<Location> {
        self.selected
    }

    pub fn mouse_down(&self) -> bool {
        self.mouse_down
    }

    pub fn right_down(&self) -> bool {
        self.right_down
    }

    /// Maps a canvas pixel to a grid tile. Pixels outside the canvas have no tile.
    pub fn tile_from_pixel(&self, px: f32, py: f32) -> Option<Location> {
        let tile = self.view.tile_size;
        if self.width == 0 || self.height == 0 || !(tile > 0.0) {
            return None;
        }
        let canvas_width = self.width as f32 * tile;
        let canvas_height = self.height as f32 * tile;
        if !(px >= 0.0 && py >= 0.0 && px < canvas_width && py < canvas_height) {
            return None;
        }
        let column = ((px / tile).floor() as i64).clamp(0, i64::from(self.width) - 1) as i32;
        let row = ((py / tile).floor() as i64).clamp(0, i64::from(self.height) - 1) as i32;
        let y = if self.view.flip_y {
            self.height as i32 - 1 - row
        } else {
            row
        };
        Some(Location::new(column, y))
    }

    /// Grid dimensions changed (new session or editor resize); stale tiles are dropped.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.hovered = None;
        self.selected = None;
        self.notify();
    }

    pub fn pointer_moved(&mut self, px: f32, py: f32) -> Option<Location> {
        let tile = self.tile_from_pixel(px, py);
        if tile != self.hovered {
            self.hovered = tile;
            self.notify();
        }
        tile
    }

    pub fn pointer_left(&mut self) {
        if self.hovered.is_some() || self.mouse_down || self.right_down {
            self.hovered = None;
            self.mouse_down = false;
            self.right_down = false;
            self.notify();
        }
    }

    pub fn button_pressed(&mut self, button: PointerButton) {
        let flag = self.flag_mut(button);
        if !*flag {
            *flag = true;
            self.notify();
        }
    }

    pub fn button_released(&mut self, button: PointerButton) {
        let flag = self.flag_mut(button);
        if *flag {
            *flag = false;
            self.notify();
        }
    }

    /// A completed click: the primary button commits the selection, the
    /// secondary one only announces the right click.
    pub fn click(&mut self, px: f32, py: f32, button: PointerButton) -> Option<Location> {
        let tile = self.tile_from_pixel(px, py)?;
        match button {
            PointerButton::Primary => {
                if self.selected != Some(tile) {
                    self.selected = Some(tile);
                    self.notify();
                }
                self.bus.dispatch(CanvasEvent::TileClick(tile));
            }
            PointerButton::Secondary => {
                self.bus.dispatch(CanvasEvent::RightClick(tile));
            }
        }
        Some(tile)
    }

    pub fn clear_selection(&mut self) {
        if self.selected.take().is_some() {
            self.notify();
        }
    }

    fn flag_mut(&mut self, button: PointerButton) -> &mut bool {
        match button {
            PointerButton::Primary => &mut self.mouse_down,
            PointerButton::Secondary => &mut self.right_down,
        }
    }

    fn notify(&self) {
        self.bus.notify(Topic::CanvasInteraction);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::bus::EventName;

    fn state(flip_y: bool) -> (InteractionState, Rc<Cell<u32>>) {
        let bus = Bus::new();
        let notifications = Rc::new(Cell::new(0));
        {
            let notifications = Rc::clone(&notifications);
            bus.subscribe(Topic::CanvasInteraction, move || {
                notifications.set(notifications.get() + 1)
            });
        }
        let view = ViewConfig {
            tile_size: 10.0,
            flip_y,
        };
        (InteractionState::new(bus, view, 4, 3), notifications)
    }

    #[test]
    fn pixels_floor_into_tiles() {
        let (state, _) = state(false);
        assert_eq!(state.tile_from_pixel(0.0, 0.0), Some(Location::new(0, 0)));
        assert_eq!(state.tile_from_pixel(19.9, 10.0), Some(Location::new(1, 1)));
        assert_eq!(state.tile_from_pixel(39.99, 29.99), Some(Location::new(3, 2)));
    }

    #[test]
    fn pixels_outside_canvas_have_no_tile() {
        let (state, _) = state(false);
        assert_eq!(state.tile_from_pixel(-0.5, 4.0), None);
        assert_eq!(state.tile_from_pixel(40.0, 4.0), None);
        assert_eq!(state.tile_from_pixel(4.0, 30.0), None);
        assert_eq!(state.tile_from_pixel(f32::NAN, 4.0), None);
    }

    #[test]
    fn flipped_view_counts_rows_from_the_bottom() {
        let (state, _) = state(true);
        assert_eq!(state.tile_from_pixel(5.0, 5.0), Some(Location::new(0, 2)));
        assert_eq!(state.tile_from_pixel(5.0, 25.0), Some(Location::new(0, 0)));
    }

    #[test]
    fn every_change_is_published_once() {
        let (mut state, notifications) = state(false);
        state.pointer_moved(5.0, 5.0);
        state.pointer_moved(6.0, 6.0);
        assert_eq!(notifications.get(), 1);

        state.button_pressed(PointerButton::Primary);
        state.button_pressed(PointerButton::Primary);
        assert!(state.mouse_down());
        assert_eq!(notifications.get(), 2);

        state.button_released(PointerButton::Primary);
        state.pointer_left();
        assert_eq!(state.hovered(), None);
        assert_eq!(notifications.get(), 4);
    }

    #[test]
    fn click_commits_selection_and_broadcasts() {
        let (mut state, notifications) = state(false);
        let clicks = Rc::new(Cell::new(0));
        let right_clicks = Rc::new(Cell::new(0));
        {
            let clicks = Rc::clone(&clicks);
            state
                .bus
                .listen(EventName::TileClick, move |_| clicks.set(clicks.get() + 1));
            let right_clicks = Rc::clone(&right_clicks);
            state.bus.listen(EventName::RightClick, move |_| {
                right_clicks.set(right_clicks.get() + 1)
            });
        }

        assert_eq!(
            state.click(15.0, 25.0, PointerButton::Primary),
            Some(Location::new(1, 2))
        );
        assert_eq!(state.selected(), Some(Location::new(1, 2)));
        assert_eq!(notifications.get(), 1);

        state.click(15.0, 25.0, PointerButton::Secondary);
        assert_eq!(clicks.get(), 1);
        assert_eq!(right_clicks.get(), 1);
        assert_eq!(state.click(-1.0, 0.0, PointerButton::Primary), None);

        state.clear_selection();
        assert_eq!(state.selected(), None);
    }
}

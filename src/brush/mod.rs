//! Map-editing brushes.
//!
//! A brush pairs a field schema with a [`Painter`] for its kind. Painting
//! works on a copy of the target cell that is only written back once the
//! painter accepted the input, so a rejected edit never leaves a half
//! applied cell behind.

mod field;
mod painters;

pub use field::{Field, FieldSet, SelectOption, VisibleIf};
pub use painters::{
    MoveCostPainter, Painter, SpecialCellPainter, StackContentPainter, ViewPainter,
};

use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::world::{Cell, Location, World};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BrushKind {
    SpecialCells,
    MoveCost,
    StackContents,
    View,
}

impl BrushKind {
    pub fn painter(self) -> &'static dyn Painter {
        match self {
            BrushKind::SpecialCells => &SpecialCellPainter,
            BrushKind::MoveCost => &MoveCostPainter,
            BrushKind::StackContents => &StackContentPainter,
            BrushKind::View => &ViewPainter,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EditorBrush {
    kind: BrushKind,
    name: &'static str,
    fields: FieldSet,
    open: bool,
}

impl EditorBrush {
    pub fn new(kind: BrushKind) -> Self {
        let painter = kind.painter();
        Self {
            kind,
            name: painter.name(),
            fields: painter.fields(),
            open: false,
        }
    }

    pub fn kind(&self) -> BrushKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut FieldSet {
        &mut self.fields
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Copy of this brush differing only in whether its panel is shown.
    pub fn with_open(&self, open: bool) -> Self {
        Self {
            open,
            ..self.clone()
        }
    }

    /// Cells the brush would touch if applied under the pointer.
    pub fn targets(&self, world: &World, hovered: Option<Location>) -> Vec<Location> {
        match (self.kind, hovered) {
            (BrushKind::View, _) | (_, None) => Vec::new(),
            (_, Some(loc)) if world.contains(i64::from(loc.x), i64::from(loc.y)) => vec![loc],
            _ => Vec::new(),
        }
    }

    /// Paints `(x, y)` with `fields`. Returns whether the cell changed.
    pub fn apply(&self, world: &mut World, x: i64, y: i64, fields: &FieldSet) -> EngineResult<bool> {
        self.edit(world, x, y, |painter, cell| painter.paint(cell, fields))
    }

    /// Secondary-button counterpart of [`EditorBrush::apply`].
    pub fn erase(&self, world: &mut World, x: i64, y: i64, fields: &FieldSet) -> EngineResult<bool> {
        self.edit(world, x, y, |painter, cell| painter.erase(cell, fields))
    }

    fn edit<F>(&self, world: &mut World, x: i64, y: i64, edit: F) -> EngineResult<bool>
    where
        F: FnOnce(&dyn Painter, &mut Cell) -> EngineResult<()>,
    {
        if !world.contains(x, y) {
            return Err(EngineError::OutOfBounds {
                x,
                y,
                width: world.width(),
                height: world.height(),
            });
        }
        let (x, y) = (x as i32, y as i32);
        let original = world.cell_at(x, y)?;
        let mut cell = original.clone();
        edit(self.kind.painter(), &mut cell)?;
        if &cell == original {
            return Ok(false);
        }
        debug!(brush = self.name, x, y, "cell edited");
        *world.cell_at_mut(x, y)? = cell;
        world.recount();
        Ok(true)
    }
}

/// Every brush the editor offers, in panel order.
pub fn default_brushes() -> Vec<EditorBrush> {
    [
        BrushKind::SpecialCells,
        BrushKind::MoveCost,
        BrushKind::StackContents,
        BrushKind::View,
    ]
    .into_iter()
    .map(EditorBrush::new)
    .collect()
}

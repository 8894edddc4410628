//! Cell edits performed by each brush kind.
//!
//! Special-cell markings and stack content never share a cell: whichever
//! painter runs last clears what the other one left behind.

use crate::error::{EngineError, EngineResult};
use crate::world::{Cell, CellType, ContentLayer, SpawnZone, MAX_ENERGY};

use super::field::{Field, FieldSet, SelectOption};

/// Cell mutation behind one brush kind.
pub trait Painter {
    fn name(&self) -> &'static str;

    /// Default field schema for a freshly created brush.
    fn fields(&self) -> FieldSet;

    fn paint(&self, cell: &mut Cell, fields: &FieldSet) -> EngineResult<()>;

    fn erase(&self, cell: &mut Cell, fields: &FieldSet) -> EngineResult<()>;
}

fn invalid(field: &str, reason: String) -> EngineError {
    EngineError::InvalidField {
        field: field.to_string(),
        reason,
    }
}

fn positive(fields: &FieldSet, key: &str) -> EngineResult<u32> {
    let value = fields.integer(key)?;
    u32::try_from(value)
        .ok()
        .filter(|value| *value >= 1)
        .ok_or_else(|| invalid(key, format!("{value} is not a positive integer")))
}

/// Drops survivors and rubble, keeping spawn markings.
fn clear_stack_content(cell: &mut Cell) {
    cell.layers.retain(|layer| !layer.is_stack_content());
}

fn clear_spawn(cell: &mut Cell) {
    cell.layers.retain(ContentLayer::is_stack_content);
}

/// Marks killer, fire, charging and spawn cells.
pub struct SpecialCellPainter;

fn is_spawn(fields: &FieldSet) -> bool {
    fields.select("cellType") == Ok("spawn")
}

fn is_group_spawn(fields: &FieldSet) -> bool {
    is_spawn(fields) && fields.select("spawnZone") == Ok("group")
}

impl Painter for SpecialCellPainter {
    fn name(&self) -> &'static str {
        "Special Cells"
    }

    fn fields(&self) -> FieldSet {
        FieldSet::new()
            .with(
                "cellType",
                Field::select(
                    "Cell Type",
                    vec![
                        SelectOption::new("killer", "Killer"),
                        SelectOption::new("fire", "Fire"),
                        SelectOption::new("charging", "Charging"),
                        SelectOption::new("spawn", "Spawn"),
                    ],
                ),
            )
            .with(
                "spawnZone",
                Field::select(
                    "Spawn Zone",
                    vec![
                        SelectOption::new("any", "Any"),
                        SelectOption::new("group", "Group"),
                    ],
                )
                .visible_if(is_spawn),
            )
            .with(
                "groupId",
                Field::integer("Group ID", 1, 1, 255).visible_if(is_group_spawn),
            )
    }

    fn paint(&self, cell: &mut Cell, fields: &FieldSet) -> EngineResult<()> {
        let selected = fields.select("cellType")?;
        let cell_type = CellType::from_wire(selected)
            .filter(|cell_type| cell_type.is_special())
            .ok_or_else(|| invalid("cellType", format!("'{selected}' is not a special cell")))?;

        clear_stack_content(cell);
        if cell_type != CellType::Spawn {
            clear_spawn(cell);
            cell.cell_type = cell_type;
            return Ok(());
        }

        let zone = match fields.select("spawnZone")? {
            "group" => SpawnZone::Group,
            _ => SpawnZone::Any,
        };
        let gid = match zone {
            SpawnZone::Group => Some(positive(fields, "groupId")?),
            SpawnZone::Any => None,
        };

        let existing = cell
            .layers
            .iter()
            .position(|layer| matches!(layer, ContentLayer::Spawn { .. }));
        match existing {
            Some(index) => {
                if let ContentLayer::Spawn {
                    zone: current,
                    groups,
                } = &mut cell.layers[index]
                {
                    if *current != zone {
                        return Err(EngineError::Rejected(format!(
                            "cell ({}, {}) already holds a {:?} spawn zone",
                            cell.loc.x, cell.loc.y, current
                        )));
                    }
                    groups.extend(gid);
                }
            }
            None => cell.layers.push(ContentLayer::Spawn {
                zone,
                groups: gid.into_iter().collect(),
            }),
        }
        cell.cell_type = CellType::Spawn;
        Ok(())
    }

    fn erase(&self, cell: &mut Cell, _fields: &FieldSet) -> EngineResult<()> {
        clear_spawn(cell);
        cell.cell_type = CellType::Normal;
        Ok(())
    }
}

/// Sets the cost of stepping onto a cell.
pub struct MoveCostPainter;

/// Largest move cost the editor hands out.
const MAX_MOVE_COST: i64 = 99;

impl Painter for MoveCostPainter {
    fn name(&self) -> &'static str {
        "Move Cost"
    }

    fn fields(&self) -> FieldSet {
        FieldSet::new().with(
            "moveCost",
            Field::integer("Move Cost", 1, 1, MAX_MOVE_COST),
        )
    }

    fn paint(&self, cell: &mut Cell, fields: &FieldSet) -> EngineResult<()> {
        cell.move_cost = positive(fields, "moveCost")?;
        Ok(())
    }

    fn erase(&self, cell: &mut Cell, _fields: &FieldSet) -> EngineResult<()> {
        cell.move_cost = 1;
        Ok(())
    }
}

/// Pushes survivors and rubble onto a cell's stack.
pub struct StackContentPainter;

fn is_survivor(fields: &FieldSet) -> bool {
    fields.select("contentType") == Ok("survivor")
}

fn is_rubble(fields: &FieldSet) -> bool {
    fields.select("contentType") == Ok("rubble")
}

impl StackContentPainter {
    fn layer(fields: &FieldSet) -> EngineResult<ContentLayer> {
        match fields.select("contentType")? {
            "survivor" => Ok(ContentLayer::Survivor {
                energy_level: positive(fields, "energyLevel")?,
            }),
            "rubble" => Ok(ContentLayer::Rubble {
                energy_required: positive(fields, "energyRequired")?,
                agents_required: positive(fields, "agentsRequired")?,
            }),
            other => Err(invalid(
                "contentType",
                format!("'{other}' is not stack content"),
            )),
        }
    }
}

impl Painter for StackContentPainter {
    fn name(&self) -> &'static str {
        "Stack Contents"
    }

    fn fields(&self) -> FieldSet {
        FieldSet::new()
            .with(
                "contentType",
                Field::select(
                    "Content",
                    vec![
                        SelectOption::new("survivor", "Survivor"),
                        SelectOption::new("rubble", "Rubble"),
                    ],
                ),
            )
            .with(
                "energyLevel",
                Field::integer("Energy Level", 100, 1, i64::from(MAX_ENERGY))
                    .visible_if(is_survivor),
            )
            .with(
                "energyRequired",
                Field::integer("Energy Required", 10, 1, i64::from(MAX_ENERGY))
                    .visible_if(is_rubble),
            )
            .with(
                "agentsRequired",
                Field::integer("Agents Required", 1, 1, 10).visible_if(is_rubble),
            )
    }

    /// Pushes a new top layer unless the top already is exactly that layer.
    fn paint(&self, cell: &mut Cell, fields: &FieldSet) -> EngineResult<()> {
        let layer = Self::layer(fields)?;
        clear_spawn(cell);
        cell.cell_type = CellType::Normal;
        if cell.top_layer() != Some(&layer) {
            cell.layers.push(layer);
        }
        Ok(())
    }

    /// Removes the most recently placed layer of the selected content type.
    fn erase(&self, cell: &mut Cell, fields: &FieldSet) -> EngineResult<()> {
        let survivor = fields.select("contentType")? == "survivor";
        let last = cell.layers.iter().rposition(|layer| match layer {
            ContentLayer::Survivor { .. } => survivor,
            ContentLayer::Rubble { .. } => !survivor,
            ContentLayer::Spawn { .. } => false,
        });
        if let Some(index) = last {
            cell.layers.remove(index);
        }
        Ok(())
    }
}

/// Inspection only; the view brush never edits.
pub struct ViewPainter;

impl Painter for ViewPainter {
    fn name(&self) -> &'static str {
        "View"
    }

    fn fields(&self) -> FieldSet {
        FieldSet::new()
    }

    fn paint(&self, _cell: &mut Cell, _fields: &FieldSet) -> EngineResult<()> {
        Ok(())
    }

    fn erase(&self, _cell: &mut Cell, _fields: &FieldSet) -> EngineResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::world::Location;

    fn cell() -> Cell {
        Cell::new(Location::new(2, 3))
    }

    fn special(cell_type: &str) -> FieldSet {
        let mut fields = SpecialCellPainter.fields();
        fields.set_from_input("cellType", cell_type).unwrap();
        fields
    }

    #[test]
    fn special_cell_clears_stack_content() {
        let mut cell = cell();
        StackContentPainter
            .paint(&mut cell, &StackContentPainter.fields())
            .unwrap();
        SpecialCellPainter.paint(&mut cell, &special("fire")).unwrap();
        assert_eq!(cell.cell_type, CellType::Fire);
        assert!(cell.layers.is_empty());
    }

    #[test]
    fn stack_content_clears_special_marking() {
        let mut cell = cell();
        SpecialCellPainter.paint(&mut cell, &special("spawn")).unwrap();
        assert!(cell.spawn_zone().is_some());

        StackContentPainter
            .paint(&mut cell, &StackContentPainter.fields())
            .unwrap();
        assert_eq!(cell.cell_type, CellType::Normal);
        assert_eq!(cell.layers, vec![ContentLayer::Survivor { energy_level: 100 }]);
    }

    #[test]
    fn repeated_paint_is_idempotent() {
        let fields = StackContentPainter.fields();
        let mut once = cell();
        StackContentPainter.paint(&mut once, &fields).unwrap();
        let mut twice = once.clone();
        StackContentPainter.paint(&mut twice, &fields).unwrap();
        assert_eq!(once, twice);

        let group = {
            let mut fields = special("spawn");
            fields.set_from_input("spawnZone", "group").unwrap();
            fields.set_from_input("groupId", "3").unwrap();
            fields
        };
        let mut spawn_once = cell();
        SpecialCellPainter.paint(&mut spawn_once, &group).unwrap();
        let mut spawn_twice = spawn_once.clone();
        SpecialCellPainter.paint(&mut spawn_twice, &group).unwrap();
        assert_eq!(spawn_once, spawn_twice);
    }

    #[test]
    fn group_spawn_merges_gids() {
        let mut fields = special("spawn");
        fields.set_from_input("spawnZone", "group").unwrap();
        let mut cell = cell();
        for gid in ["2", "1", "2"] {
            fields.set_from_input("groupId", gid).unwrap();
            SpecialCellPainter.paint(&mut cell, &fields).unwrap();
        }
        let (zone, groups) = cell.spawn_zone().unwrap();
        assert_eq!(zone, SpawnZone::Group);
        assert_eq!(groups, &BTreeSet::from([1, 2]));
    }

    #[test]
    fn erase_removes_latest_layer_of_selected_type() {
        let mut fields = StackContentPainter.fields();
        let mut cell = cell();
        StackContentPainter.paint(&mut cell, &fields).unwrap();
        fields.set_from_input("contentType", "rubble").unwrap();
        StackContentPainter.paint(&mut cell, &fields).unwrap();
        fields.set_from_input("contentType", "survivor").unwrap();
        fields.set_from_input("energyLevel", "7").unwrap();
        StackContentPainter.paint(&mut cell, &fields).unwrap();

        StackContentPainter.erase(&mut cell, &fields).unwrap();
        assert_eq!(cell.layers.len(), 2);
        assert!(matches!(cell.layers[1], ContentLayer::Rubble { .. }));
        assert_eq!(cell.layers[0], ContentLayer::Survivor { energy_level: 100 });
    }

    #[test]
    fn move_cost_paints_and_resets() {
        let mut fields = MoveCostPainter.fields();
        fields.set_from_input("moveCost", "0").unwrap();
        assert_eq!(fields.integer("moveCost"), Ok(1));
        fields.set_from_input("moveCost", "250").unwrap();

        let mut cell = cell();
        MoveCostPainter.paint(&mut cell, &fields).unwrap();
        assert_eq!(cell.move_cost, MAX_MOVE_COST as u32);
        MoveCostPainter.erase(&mut cell, &fields).unwrap();
        assert_eq!(cell.move_cost, 1);
    }

    #[test]
    fn special_cell_erase_restores_normal() {
        let mut cell = cell();
        SpecialCellPainter.paint(&mut cell, &special("spawn")).unwrap();
        SpecialCellPainter.erase(&mut cell, &special("spawn")).unwrap();
        assert_eq!(cell, Cell::new(Location::new(2, 3)));
    }
}

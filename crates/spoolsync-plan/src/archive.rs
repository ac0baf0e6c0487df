//! Reading a usage plan out of a sliced 3MF archive.
//!
//! Layout consumed:
//! - `Metadata/slice_info.config`: XML with one `<plate>` carrying
//!   `<metadata key="index">` and one `<filament id=.. used_g=..>` per slot.
//! - `Metadata/plate_<index>.gcode`: toolpath scanned for tray selects.
//! - `Metadata/plate_<index>.png`: optional plate preview.

use std::io::{BufReader, Read, Seek};

use tracing::{debug, warn};
use zip::ZipArchive;
use zip::result::ZipError;

use crate::error::{PlanError, PlanResult, io_error};
use crate::gcode::filament_order;
use crate::plan::{SlotId, SlotUsage, UsagePlan, single_slot_order};

pub const SLICE_INFO_PATH: &str = "Metadata/slice_info.config";

pub fn gcode_path(plate: &str) -> String {
    format!("Metadata/plate_{plate}.gcode")
}

pub fn thumbnail_path(plate: &str) -> String {
    format!("Metadata/plate_{plate}.png")
}

/// Parse an archive into a plan. `file` is the job file name recorded on the plan.
pub fn read_plan<R: Read + Seek>(reader: R, file: &str) -> PlanResult<UsagePlan> {
    let mut archive = ZipArchive::new(reader)?;

    let slice_info = read_entry_string(&mut archive, SLICE_INFO_PATH)?
        .ok_or_else(|| PlanError::MissingEntry(SLICE_INFO_PATH.into()))?;
    let mut plan = parse_slice_info(&slice_info, file)?;

    let gcode = gcode_path(&plan.plate);
    plan.order = match archive.by_name(&gcode) {
        Ok(entry) => filament_order(BufReader::new(entry)).map_err(|e| io_error(&gcode, e))?,
        Err(ZipError::FileNotFound) => {
            warn!(entry = %gcode, "toolpath missing from archive; assuming single filament");
            single_slot_order()
        }
        Err(e) => return Err(e.into()),
    };
    plan.align_single_slot_order();

    plan.thumbnail = read_entry_bytes(&mut archive, &thumbnail_path(&plan.plate))?;

    debug!(
        file = %plan.file,
        plate = %plan.plate,
        slots = plan.slots.len(),
        order = ?plan.order,
        "usage plan extracted"
    );
    Ok(plan)
}

/// Parse `slice_info.config` into a plan without toolpath order.
pub fn parse_slice_info(xml: &str, file: &str) -> PlanResult<UsagePlan> {
    let doc = roxmltree::Document::parse(xml)?;
    let mut plan = UsagePlan::new(file);

    let plate = doc
        .descendants()
        .find(|n| n.has_tag_name("plate"))
        .ok_or_else(|| PlanError::Malformed("no <plate> element".into()))?;

    if let Some(index) = plate
        .children()
        .filter(|n| n.has_tag_name("metadata"))
        .find(|n| n.attribute("key") == Some("index"))
        .and_then(|n| n.attribute("value"))
    {
        plan.plate = index.to_string();
    }

    for node in plate.descendants().filter(|n| n.has_tag_name("filament")) {
        let slot: SlotId = required_attr(&node, "id")?
            .parse()
            .map_err(|_| PlanError::Malformed("filament id is not a number".into()))?;
        let grams: f64 = required_attr(&node, "used_g")?
            .parse()
            .map_err(|_| PlanError::Malformed(format!("used_g of filament {slot} is not a number")))?;

        let usage = SlotUsage {
            slot,
            grams,
            meters: node.attribute("used_m").and_then(|m| m.parse().ok()),
            material: node.attribute("type").map(str::to_string),
            color: node.attribute("color").map(str::to_string),
            tray_info_idx: node.attribute("tray_info_idx").map(str::to_string),
        };
        plan.slots.insert(slot, usage);
    }

    Ok(plan)
}

fn required_attr<'a>(node: &roxmltree::Node<'a, '_>, name: &str) -> PlanResult<&'a str> {
    node.attribute(name)
        .ok_or_else(|| PlanError::Malformed(format!("filament element missing '{name}'")))
}

fn read_entry_string<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> PlanResult<Option<String>> {
    match archive.by_name(name) {
        Ok(mut entry) => {
            let mut out = String::new();
            entry
                .read_to_string(&mut out)
                .map_err(|e| io_error(name, e))?;
            Ok(Some(out))
        }
        Err(ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn read_entry_bytes<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> PlanResult<Option<Vec<u8>>> {
    match archive.by_name(name) {
        Ok(mut entry) => {
            let mut out = Vec::new();
            entry.read_to_end(&mut out).map_err(|e| io_error(name, e))?;
            Ok(Some(out))
        }
        Err(ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

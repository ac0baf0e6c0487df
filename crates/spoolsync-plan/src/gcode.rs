//! First-use order of filament slots in a sliced toolpath.
//!
//! Every `M620 S<n>` line is a tray-select directive; `n` is the zero-based
//! filament index the slicer switches to. A slot's order value is the number
//! of directives seen before its first one.

use std::io::{self, BufRead};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::plan::{FilamentOrder, SlotId, single_slot_order};

/// Filament index the slicer emits when no tray is selected.
pub const NO_SELECTION: u32 = 255;

static TRAY_SELECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^M620 S(\d+)[^;\r\n]*$").expect("tray select pattern"));

pub fn filament_order<R: BufRead>(reader: R) -> io::Result<FilamentOrder> {
    let mut order = FilamentOrder::new();
    let mut directives: u32 = 0;

    for line in reader.split(b'\n') {
        let line = line?;
        let text = String::from_utf8_lossy(&line);
        let Some(caps) = TRAY_SELECT.captures(text.trim()) else {
            continue;
        };
        if let Ok(index) = caps[1].parse::<u32>() {
            if index != NO_SELECTION {
                order.entry(slot_for_index(index)).or_insert(directives);
            }
        }
        directives += 1;
    }

    if order.is_empty() {
        return Ok(single_slot_order());
    }
    Ok(order)
}

fn slot_for_index(index: u32) -> SlotId {
    index + 1
}

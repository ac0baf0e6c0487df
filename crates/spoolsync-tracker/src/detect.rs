//! Edge detection between two consecutive printer states.
//!
//! Two raw signals announce a filament swap: the stage code entering the
//! tray-switch value, and the sub-stage dropping from 4 to 2. Both are folded
//! into a single [`StageEvent::FilamentChange`] per cycle.

use serde_json::Value;

use crate::state::{int_at, lookup, str_at};

/// Stage code reported while the printer switches trays.
pub const STAGE_TRAY_SWITCH: i64 = 4;
/// `tray_tar` value meaning no tray is targeted.
pub const NO_TRAY: i64 = 255;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageEvent {
    JobStarted { file: String },
    FilamentChange { target_tray: i64 },
}

/// Events raised by moving from `previous` to `current`. At most one of each
/// kind; a job start is listed before a filament change.
pub fn detect(previous: &Value, current: &Value) -> Vec<StageEvent> {
    let mut events = Vec::new();
    if let Some(file) = job_started(previous, current) {
        events.push(StageEvent::JobStarted { file });
    }
    if filament_changed(previous, current) {
        if let Some(target_tray) = int_at(current, &["print", "ams", "tray_tar"]) {
            events.push(StageEvent::FilamentChange { target_tray });
        }
    }
    events
}

fn job_started(previous: &Value, current: &Value) -> Option<String> {
    lookup(previous, &["print"])?;
    let was = str_at(previous, &["print", "gcode_state"])?;
    let now = str_at(current, &["print", "gcode_state"])?;
    let origin = str_at(current, &["print", "print_type"])?;
    let file = str_at(current, &["print", "gcode_file"])?;
    (was == "PREPARE" && now == "RUNNING" && origin == "local").then(|| file.to_string())
}

fn filament_changed(previous: &Value, current: &Value) -> bool {
    tray_switch_entered(previous, current) || sub_stage_swapped(previous, current)
}

fn tray_switch_entered(previous: &Value, current: &Value) -> bool {
    let Some(stage) = int_at(current, &["print", "stg_cur"]) else {
        return false;
    };
    if stage != STAGE_TRAY_SWITCH {
        return false;
    }
    let entered = int_at(previous, &["print", "stg_cur"]) != Some(stage);
    let idle_before = match lookup(previous, &["print", "ams"]) {
        None => true,
        Some(ams) => int_at(ams, &["tray_tar"]) == Some(NO_TRAY),
    };
    entered && idle_before
}

fn sub_stage_swapped(previous: &Value, current: &Value) -> bool {
    int_at(previous, &["print", "mc_print_sub_stage"]) == Some(4)
        && int_at(current, &["print", "mc_print_sub_stage"]) == Some(2)
}

/// URL of a cloud job announced by this delta (`command: project_file`).
pub fn project_file_url(delta: &Value) -> Option<&str> {
    if str_at(delta, &["print", "command"])? != "project_file" {
        return None;
    }
    str_at(delta, &["print", "url"])
}

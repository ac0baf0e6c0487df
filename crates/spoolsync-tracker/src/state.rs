//! Cumulative printer state built from partial telemetry reports.
//!
//! Printers publish deltas: each report carries only the fields that changed.
//! [`merge`] folds a delta into the running document and [`PrinterState`]
//! keeps the snapshot from the end of the previous cycle next to it, so edge
//! detection can compare the two.

use serde_json::{Map, Value};

/// Deep-merge `delta` into `target`.
///
/// Objects merge key by key; any other value (arrays included) replaces what
/// was there. A non-object delta leaves `target` untouched.
pub fn merge(target: &mut Value, delta: &Value) {
    let Value::Object(updates) = delta else {
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(fields) = target {
        merge_fields(fields, updates);
    }
}

fn merge_fields(fields: &mut Map<String, Value>, updates: &Map<String, Value>) {
    for (key, value) in updates {
        match (fields.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(nested)) => {
                merge_fields(existing, nested);
            }
            _ => {
                fields.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Current and previous-cycle views of the printer.
#[derive(Debug, Clone)]
pub struct PrinterState {
    current: Value,
    previous: Value,
}

impl Default for PrinterState {
    fn default() -> Self {
        Self {
            current: Value::Object(Map::new()),
            previous: Value::Object(Map::new()),
        }
    }
}

impl PrinterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, delta: &Value) {
        merge(&mut self.current, delta);
    }

    /// Snapshot the current state as the previous one. Called once at the end
    /// of every processing cycle.
    pub fn commit(&mut self) {
        self.previous = self.current.clone();
    }

    pub fn current(&self) -> &Value {
        &self.current
    }

    pub fn previous(&self) -> &Value {
        &self.previous
    }

    /// Drop the leaf at `path` from the current state. Fields that describe
    /// a single job are removed once that job has been handled.
    pub fn forget(&mut self, path: &[&str]) {
        let Some((leaf, parents)) = path.split_last() else {
            return;
        };
        let mut node = &mut self.current;
        for key in parents {
            match node.get_mut(*key) {
                Some(next) => node = next,
                None => return,
            }
        }
        if let Some(map) = node.as_object_mut() {
            map.remove(*leaf);
        }
    }
}

/// Walk `path` through nested objects.
pub fn lookup<'a>(doc: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(doc, |node, key| node.get(*key))
}

/// Integer field; printers send some numbers as strings.
pub fn int_at(doc: &Value, path: &[&str]) -> Option<i64> {
    as_int(lookup(doc, path)?)
}

pub fn str_at<'a>(doc: &'a Value, path: &[&str]) -> Option<&'a str> {
    lookup(doc, path)?.as_str()
}

pub fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Boolean field, also accepting `0`/`1` and their string forms.
pub fn bool_at(doc: &Value, path: &[&str]) -> Option<bool> {
    match lookup(doc, path)? {
        Value::Bool(b) => Some(*b),
        other => as_int(other).map(|n| n != 0),
    }
}

use serde::Serialize;
use serde_json::{Map, Value};

use crate::{DeliveryMode, RecordKind, SubscriptionId};

/// A single action trace or table delta flowing through the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub subscription_id: SubscriptionId,
    pub kind: RecordKind,
    pub mode: DeliveryMode,
    /// The normalised trace, with decoded meta fields folded into its `data` object.
    pub content: Value,
    pub block_num: u64,
    /// Set once the block carrying this record has become irreversible.
    pub irreversible: bool,
}

impl Record {
    /// Builds a record from a raw trace, normalising it first.
    ///
    /// Returns `None` when the trace has no usable `block_num`.
    #[must_use]
    pub fn from_trace(
        subscription_id: SubscriptionId,
        kind: RecordKind,
        mode: DeliveryMode,
        mut content: Value,
    ) -> Option<Self> {
        match kind {
            RecordKind::Action => normalize_action(&mut content),
            RecordKind::Delta => normalize_delta(&mut content),
        }
        let block_num = block_num_of(&content)?;
        Some(Self { subscription_id, kind, mode, content, block_num, irreversible: false })
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        self.mode == DeliveryMode::Live
    }
}

/// Reads `block_num` as a number or a numeric string.
pub(crate) fn block_num_of(content: &Value) -> Option<u64> {
    match content.get("block_num")? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Folds `@<action name>` into `act.data`.
pub fn normalize_action(content: &mut Value) {
    let Some(name) = content.pointer("/act/name").and_then(Value::as_str) else {
        return;
    };
    let meta_key = format!("@{name}");
    let Some(meta) = take_object(content, &meta_key) else {
        return;
    };
    if let Some(act) = content.get_mut("act") {
        merge_into(act, "data", meta);
    }
}

/// Folds `@<table>.data`, or `@<table>` when the former is absent, into `data`.
pub fn normalize_delta(content: &mut Value) {
    let Some(table) = content.get("table").and_then(Value::as_str) else {
        return;
    };
    let plain = format!("@{table}");
    let with_data = format!("{plain}.data");
    let meta_key = if content.get(&with_data).is_some() { with_data } else { plain };
    let Some(meta) = take_object(content, &meta_key) else {
        return;
    };
    merge_into(content, "data", meta);
}

fn take_object(content: &mut Value, key: &str) -> Option<Map<String, Value>> {
    let object = content.as_object_mut()?;
    if !matches!(object.get(key), Some(Value::Object(_))) {
        return None;
    }
    match object.remove(key) {
        Some(Value::Object(meta)) => Some(meta),
        _ => None,
    }
}

fn merge_into(target: &mut Value, field: &str, meta: Map<String, Value>) {
    let Some(target) = target.as_object_mut() else {
        return;
    };
    let slot = target.entry(field).or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    if let Value::Object(data) = slot {
        data.extend(meta);
    }
}

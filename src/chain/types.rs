//! Plain event types produced by the node client.

use serde_json::json;

/// All events emitted in one block, in block order.
pub type EventBatch = Vec<EventRecord>;

/// When in block processing an event was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// During the extrinsic at this index.
    ApplyExtrinsic(u32),
    /// After all extrinsics (on_finalize).
    Finalization,
    /// Before any extrinsic (on_initialize).
    Initialization,
}

/// One payload field with its declared type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventField {
    pub type_name: String,
    pub value: String,
}

/// A decoded system event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    /// lowerCamelCase pallet name, e.g. "balances".
    pub section: String,
    /// Event variant name, e.g. "Transfer".
    pub method: String,
    pub phase: Phase,
    pub fields: Vec<EventField>,
}

impl EventRecord {
    /// Declared types of the payload, in field order.
    pub fn type_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.type_name.as_str()).collect()
    }
}

/// Section name for a pallet: the pallet name with its first letter lowercased.
pub fn section_name(pallet: &str) -> String {
    let mut chars = pallet.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = match self {
            Self::ApplyExtrinsic(index) => json!({ "applyExtrinsic": index }),
            Self::Finalization => json!({ "finalization": null }),
            Self::Initialization => json!({ "initialization": null }),
        };
        write!(f, "{}", value)
    }
}

//! Store mutation instructions emitted by board rules.
//!
//! A `MutationOp` is opaque to the board engine: it is produced by rule
//! `set`/`unset` generators and the order allocator, and interpreted by the
//! store (`BoardStore::apply`).

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Mutation kind understood by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationVerb {
    Create,
    Delete,
    Update,
}

/// One create/delete/update instruction against a store collection path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationOp {
    pub verb: MutationVerb,
    /// Collection path, e.g. `["tags", tag_id, "notes"]`.
    pub path: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl MutationOp {
    /// Attaches tag `tag_id` to `note_id`.
    pub fn attach_tag(tag_id: &str, note_id: &str) -> Self {
        Self {
            verb: MutationVerb::Create,
            path: vec!["tags".to_string(), tag_id.to_string(), "notes".to_string()],
            body: Some(json!({ "id": note_id })),
        }
    }

    /// Detaches tag `tag_id` from `note_id`.
    pub fn detach_tag(tag_id: &str, note_id: &str) -> Self {
        Self {
            verb: MutationVerb::Delete,
            path: vec![
                "tags".to_string(),
                tag_id.to_string(),
                "notes".to_string(),
                note_id.to_string(),
            ],
            body: None,
        }
    }

    /// Partial note update with the given field object.
    pub fn update_note(note_id: &str, body: Value) -> Self {
        Self {
            verb: MutationVerb::Update,
            path: vec!["notes".to_string(), note_id.to_string()],
            body: Some(body),
        }
    }

    /// Moves `note_id` into `notebook_id`.
    pub fn set_notebook(note_id: &str, notebook_id: &str) -> Self {
        Self::update_note(note_id, json!({ "parent_id": notebook_id }))
    }

    /// Stamps (non-zero) or clears (`0`) the todo completion time.
    pub fn set_todo_completed(note_id: &str, completed_ms: i64) -> Self {
        Self::update_note(note_id, json!({ "todo_completed": completed_ms }))
    }

    /// Sets the manual ordering key.
    pub fn set_order(note_id: &str, order: f64) -> Self {
        Self::update_note(note_id, json!({ "order": order }))
    }
}

//! Note projection consumed by board classification.
//!
//! # Responsibility
//! - Define the board-facing shape of one note (tags, notebook, todo state).
//! - Define the config note shape that carries the board configuration.
//!
//! # Invariants
//! - `tags` hold normalized (trimmed, lowercase) tag names.
//! - `notebook_id` is `ROOT_NOTEBOOK_ID` for notes at the top level.
//! - `order` is the manual sort key; larger values are displayed first.

use serde::{Deserialize, Serialize};

/// Stable note identifier assigned by the store.
pub type NoteId = String;
/// Stable notebook (folder) identifier assigned by the store.
pub type NotebookId = String;
/// Stable tag identifier assigned by the store.
pub type TagId = String;

/// Identifier of the universal root that contains every notebook.
pub const ROOT_NOTEBOOK_ID: &str = "";

/// Board-facing note record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteRecord {
    pub id: NoteId,
    pub title: String,
    /// Normalized tag names.
    pub tags: Vec<String>,
    /// Containing notebook.
    pub notebook_id: NotebookId,
    /// Whether the note is a completable todo.
    pub is_todo: bool,
    /// Meaningful only when `is_todo` is set.
    pub is_completed: bool,
    /// Unix epoch milliseconds.
    pub due_ms: Option<i64>,
    /// Manual ordering key among siblings of one column.
    pub order: f64,
    /// Unix epoch milliseconds. Secondary display sort key.
    pub created_ms: i64,
}

impl NoteRecord {
    /// Creates a plain (non-todo) note without tags.
    pub fn new(id: impl Into<NoteId>, notebook_id: impl Into<NotebookId>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            tags: Vec::new(),
            notebook_id: notebook_id.into(),
            is_todo: false,
            is_completed: false,
            due_ms: None,
            order: 0.0,
            created_ms: 0,
        }
    }

    /// Returns whether the note carries `tag`, comparing normalized names.
    pub fn has_tag(&self, tag: &str) -> bool {
        let Some(wanted) = normalize_tag(tag) else {
            return false;
        };
        self.tags
            .iter()
            .any(|value| normalize_tag(value).as_deref() == Some(wanted.as_str()))
    }
}

/// Note that holds a board configuration block in its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigNote {
    pub id: NoteId,
    /// Used as the board name.
    pub title: String,
    /// Markdown body containing the fenced configuration.
    pub body: String,
    pub notebook_id: NotebookId,
}

/// Normalizes one tag value: trimmed and lowercase, `None` when blank.
pub fn normalize_tag(tag: &str) -> Option<String> {
    let trimmed = tag.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Normalizes a slash-separated notebook path.
///
/// Leading/trailing separators and empty segments are dropped, so `"/a//b/"`
/// becomes `"a/b"` and `"/"` becomes the universal root `""`.
pub fn normalize_notebook_path(path: &str) -> String {
    path.split('/')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Joins a path relative to `root`, normalizing both sides.
pub fn join_notebook_path(root: &str, relative: &str) -> String {
    let root = normalize_notebook_path(root);
    let relative = normalize_notebook_path(relative);
    match (root.is_empty(), relative.is_empty()) {
        (true, _) => relative,
        (false, true) => root,
        (false, false) => format!("{root}/{relative}"),
    }
}

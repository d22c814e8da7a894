//! Store collaborator contract and SQLite implementation.
//!
//! # Responsibility
//! - Define the read/write surface the board engine needs from note storage.
//! - Keep SQL details behind `SqliteBoardStore`.
//!
//! # Invariants
//! - Tag and notebook creation is idempotent: resolving an existing name
//!   never creates a second backing entity.
//! - Search filters are hints; callers still classify every returned note.

use crate::db::DbError;
use crate::model::mutation::MutationOp;
use crate::model::note::{ConfigNote, NoteId, NoteRecord, NotebookId, TagId};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod sqlite;

pub use sqlite::{NoteDraft, SqliteBoardStore};

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by store implementations.
#[derive(Debug)]
pub enum StoreError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    NoteNotFound(NoteId),
    NotebookNotFound(String),
    TagNotFound(TagId),
    /// Mutation path/body combination the store cannot interpret.
    UnsupportedMutation(String),
    /// Connection is missing a table required by the store.
    MissingRequiredTable(&'static str),
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NoteNotFound(id) => write!(f, "note not found: {id}"),
            Self::NotebookNotFound(path) => write!(f, "notebook not found: `{path}`"),
            Self::TagNotFound(id) => write!(f, "tag not found: {id}"),
            Self::UnsupportedMutation(details) => write!(f, "unsupported mutation: {details}"),
            Self::MissingRequiredTable(table) => {
                write!(f, "board store requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid store data: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// One candidate-narrowing condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchFilter {
    /// Note carries the tag (normalized name).
    Tag(String),
    /// Note lives directly in one of these notebooks.
    Notebooks(Vec<NotebookId>),
    /// Note is a todo whose completion state equals the flag.
    Completed(bool),
    /// Note is not this one.
    ExcludeNote(NoteId),
}

/// Pre-filter for candidate notes.
///
/// `groups` are combined with AND; filters inside one group with OR.
/// An empty query matches every note.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub groups: Vec<Vec<SearchFilter>>,
}

impl SearchQuery {
    /// Adds one disjunctive group; empty groups are ignored.
    pub fn require_any(&mut self, filters: Vec<SearchFilter>) {
        if !filters.is_empty() {
            self.groups.push(filters);
        }
    }
}

/// Storage surface consumed by rule factories, the board service and CLI.
pub trait BoardStore {
    /// Loads one note projection by id.
    fn get_note(&self, note_id: &str) -> StoreResult<Option<NoteRecord>>;
    /// Loads one note with its body for configuration parsing.
    fn get_config_note(&self, note_id: &str) -> StoreResult<Option<ConfigNote>>;
    /// Lists notes matching the pre-filter, sorted `order DESC, created DESC`.
    fn search_notes(&self, query: &SearchQuery) -> StoreResult<Vec<NoteRecord>>;
    /// Replaces the markdown body of one note.
    fn update_note_body(&self, note_id: &str, body: &str) -> StoreResult<()>;
    /// Resolves a tag id by name.
    fn tag_id(&self, name: &str) -> StoreResult<Option<TagId>>;
    /// Creates a tag, returning the existing id when the name is taken.
    fn create_tag(&self, name: &str) -> StoreResult<TagId>;
    /// Returns all known tag names sorted by name.
    fn list_tags(&self) -> StoreResult<Vec<String>>;
    /// Resolves a notebook id by slash-separated path from the universal root.
    fn resolve_notebook_path(&self, path: &str) -> StoreResult<Option<NotebookId>>;
    /// Resolves a notebook path, creating missing segments.
    fn create_notebook_path(&self, path: &str) -> StoreResult<NotebookId>;
    /// Returns the slash-separated path of a notebook.
    fn notebook_path(&self, notebook_id: &str) -> StoreResult<Option<String>>;
    /// Lists every notebook below `notebook_id` (not including itself).
    fn descendant_notebooks(&self, notebook_id: &str) -> StoreResult<Vec<NotebookId>>;
    /// Applies one mutation.
    fn apply(&self, op: &MutationOp) -> StoreResult<()>;
    /// Applies mutations in order as one unit; on error none of them stick.
    ///
    /// The default applies them one by one and cannot roll back.
    fn apply_all(&self, ops: &[MutationOp]) -> StoreResult<()> {
        ops.iter().try_for_each(|op| self.apply(op))
    }
}

impl<T: BoardStore + ?Sized> BoardStore for &T {
    fn get_note(&self, note_id: &str) -> StoreResult<Option<NoteRecord>> {
        (**self).get_note(note_id)
    }

    fn get_config_note(&self, note_id: &str) -> StoreResult<Option<ConfigNote>> {
        (**self).get_config_note(note_id)
    }

    fn search_notes(&self, query: &SearchQuery) -> StoreResult<Vec<NoteRecord>> {
        (**self).search_notes(query)
    }

    fn update_note_body(&self, note_id: &str, body: &str) -> StoreResult<()> {
        (**self).update_note_body(note_id, body)
    }

    fn tag_id(&self, name: &str) -> StoreResult<Option<TagId>> {
        (**self).tag_id(name)
    }

    fn create_tag(&self, name: &str) -> StoreResult<TagId> {
        (**self).create_tag(name)
    }

    fn list_tags(&self) -> StoreResult<Vec<String>> {
        (**self).list_tags()
    }

    fn resolve_notebook_path(&self, path: &str) -> StoreResult<Option<NotebookId>> {
        (**self).resolve_notebook_path(path)
    }

    fn create_notebook_path(&self, path: &str) -> StoreResult<NotebookId> {
        (**self).create_notebook_path(path)
    }

    fn notebook_path(&self, notebook_id: &str) -> StoreResult<Option<String>> {
        (**self).notebook_path(notebook_id)
    }

    fn descendant_notebooks(&self, notebook_id: &str) -> StoreResult<Vec<NotebookId>> {
        (**self).descendant_notebooks(notebook_id)
    }

    fn apply(&self, op: &MutationOp) -> StoreResult<()> {
        (**self).apply(op)
    }

    fn apply_all(&self, ops: &[MutationOp]) -> StoreResult<()> {
        (**self).apply_all(ops)
    }
}

//! Compiled board: classification and move diffs.
//!
//! # Responsibility
//! - Compile a validated `Config` into base rules and ordered columns.
//! - Classify notes into at most one column.
//! - Turn a move action into an ordered list of store mutations.
//!
//! # Invariants
//! - Base rules are conjunctive; rules inside one column are disjunctive.
//! - The first declared matching column wins; the backlog column catches
//!   notes that pass the base rules but match no regular column.
//! - A board is immutable once compiled; config changes rebuild it.

pub mod order;

use crate::config::{Config, RuleValue, SortSpec};
use crate::model::mutation::MutationOp;
use crate::model::note::{normalize_notebook_path, ConfigNote, NoteId, NoteRecord};
use crate::rules::{exclude_note, Rule, RuleError, RuleKind};
use crate::store::{BoardStore, SearchQuery, StoreError};
use log::{debug, info};
use order::{compute_order_updates, sort_for_display};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type BoardResult<T> = Result<T, BoardError>;

/// Root path value meaning "the notebook holding the config note".
pub const CONFIG_NOTE_NOTEBOOK: &str = ".";

/// Errors from board compilation and diffing.
#[derive(Debug)]
pub enum BoardError {
    /// A rule failed to compile.
    Rule(RuleError),
    /// A move names a column the board does not have (stale board).
    UnknownColumn(String),
}

impl Display for BoardError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rule(err) => write!(f, "{err}"),
            Self::UnknownColumn(name) => write!(f, "column not on board: \"{name}\""),
        }
    }
}

impl Error for BoardError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Rule(err) => Some(err),
            Self::UnknownColumn(_) => None,
        }
    }
}

impl From<RuleError> for BoardError {
    fn from(value: RuleError) -> Self {
        Self::Rule(value)
    }
}

impl From<StoreError> for BoardError {
    fn from(value: StoreError) -> Self {
        Self::Rule(RuleError::Store(value))
    }
}

/// Inputs a board needs besides its config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardContext {
    /// Note holding the configuration; always kept off the board.
    pub config_note_id: NoteId,
    pub board_name: String,
    /// Notebook path that scopes the board; `""` is the universal root.
    pub root_notebook_path: String,
}

impl BoardContext {
    pub fn new(
        config_note_id: impl Into<NoteId>,
        board_name: impl Into<String>,
        root_notebook_path: impl Into<String>,
    ) -> Self {
        Self {
            config_note_id: config_note_id.into(),
            board_name: board_name.into(),
            root_notebook_path: root_notebook_path.into(),
        }
    }

    /// Context for a board defined in `note`.
    ///
    /// The root is `filters.rootNotebookPath` when configured, otherwise the
    /// notebook that contains the config note. `"."` names that notebook too.
    pub fn for_config_note<S: BoardStore + ?Sized>(
        note: &ConfigNote,
        config: &Config,
        store: &S,
    ) -> Result<Self, StoreError> {
        let root_notebook_path = match config.root_notebook_path.as_deref().map(str::trim) {
            Some(path) if path != CONFIG_NOTE_NOTEBOOK => path.to_string(),
            _ => store
                .notebook_path(&note.notebook_id)?
                .ok_or_else(|| StoreError::NotebookNotFound(note.notebook_id.clone()))?,
        };
        Ok(Self::new(
            note.id.clone(),
            note.title.clone(),
            root_notebook_path,
        ))
    }
}

/// One compiled column.
#[derive(Debug, Clone)]
pub struct Column {
    name: String,
    rules: Vec<Rule>,
}

impl Column {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    fn matches(&self, note: &NoteRecord) -> bool {
        self.rules.iter().any(|rule| rule.filter_note(note))
    }
}

/// Move of one note into a column, optionally at a position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveNote {
    pub note_id: NoteId,
    pub old_column: String,
    pub new_column: String,
    /// Target index in the destination column; `None` leaves order alone.
    pub new_index: Option<usize>,
}

/// Notes of one column in display order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SortedColumn {
    pub name: String,
    pub notes: Vec<NoteRecord>,
}

/// Snapshot of a board's columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardState {
    pub board_name: String,
    pub columns: Vec<SortedColumn>,
}

impl BoardState {
    pub fn column(&self, name: &str) -> Option<&SortedColumn> {
        self.columns.iter().find(|column| column.name == name)
    }
}

/// Compiled board.
#[derive(Debug, Clone)]
pub struct Board {
    board_name: String,
    config_note_id: NoteId,
    base_rules: Vec<Rule>,
    regular_columns: Vec<Column>,
    backlog_column: Option<Column>,
    column_names: Vec<String>,
    hidden_tags: BTreeSet<String>,
    sort: Option<SortSpec>,
}

impl Board {
    /// Compiles `config` into a board.
    ///
    /// # Side effects
    /// - Rule factories may create missing tags and notebooks in `store`.
    ///
    /// # Errors
    /// - Propagates rule compilation and store failures.
    pub fn compile<S: BoardStore + ?Sized>(
        config: &Config,
        context: &BoardContext,
        store: &S,
    ) -> BoardResult<Self> {
        let root_path = normalize_notebook_path(&context.root_notebook_path);
        let mut hidden_tags = BTreeSet::new();

        let mut base_rules = vec![exclude_note(&context.config_note_id)];
        if !root_path.is_empty() {
            base_rules.push(RuleKind::NotebookPath.compile(
                &RuleValue::Text(String::new()),
                &root_path,
                store,
            )?);
        }
        for entry in &config.filters {
            let rule = entry.kind.compile(&entry.value, &root_path, store)?;
            hidden_tags.extend(rule.tag_names().into_iter().map(str::to_string));
            base_rules.push(rule);
        }

        let mut regular_columns = Vec::new();
        let mut backlog_column = None;
        let mut column_names = Vec::with_capacity(config.columns.len());
        for column in &config.columns {
            column_names.push(column.name.clone());
            if column.backlog {
                backlog_column = Some(Column {
                    name: column.name.clone(),
                    rules: Vec::new(),
                });
                continue;
            }

            let mut rules = Vec::with_capacity(column.rules.len());
            for entry in &column.rules {
                let rule = entry.kind.compile(&entry.value, &root_path, store)?;
                hidden_tags.extend(rule.tag_names().into_iter().map(str::to_string));
                rules.push(rule);
            }
            regular_columns.push(Column {
                name: column.name.clone(),
                rules,
            });
        }

        info!(
            "event=board_compile module=board status=ok base_rules={} columns={} backlog={}",
            base_rules.len(),
            column_names.len(),
            backlog_column.is_some()
        );

        Ok(Self {
            board_name: context.board_name.clone(),
            config_note_id: context.config_note_id.clone(),
            base_rules,
            regular_columns,
            backlog_column,
            column_names,
            hidden_tags,
            sort: config.sort,
        })
    }

    pub fn board_name(&self) -> &str {
        &self.board_name
    }

    pub fn config_note_id(&self) -> &str {
        &self.config_note_id
    }

    pub fn base_rules(&self) -> &[Rule] {
        &self.base_rules
    }

    pub fn regular_columns(&self) -> &[Column] {
        &self.regular_columns
    }

    pub fn backlog_column(&self) -> Option<&Column> {
        self.backlog_column.as_ref()
    }

    /// Column names in declaration order, backlog included.
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Tag names implied by the board's rules, redundant on cards.
    pub fn hidden_tags(&self) -> &BTreeSet<String> {
        &self.hidden_tags
    }

    pub fn sort(&self) -> Option<&SortSpec> {
        self.sort.as_ref()
    }

    /// Looks up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.regular_columns
            .iter()
            .chain(self.backlog_column.iter())
            .find(|column| column.name == name)
    }

    /// Returns the column `note` belongs to, or `None` when it is off the board.
    pub fn classify(&self, note: &NoteRecord) -> Option<&str> {
        if !self.base_rules.iter().all(|rule| rule.filter_note(note)) {
            return None;
        }
        self.regular_columns
            .iter()
            .find(|column| column.matches(note))
            .or(self.backlog_column.as_ref())
            .map(|column| column.name.as_str())
    }

    /// Store pre-filter derived from the base rules' search hints.
    pub fn search_query(&self) -> SearchQuery {
        let mut query = SearchQuery::default();
        for rule in &self.base_rules {
            query.require_any(rule.search_filters().to_vec());
        }
        query
    }

    /// Computes the mutations for `action`.
    ///
    /// `dest_notes` is the current content of the destination column; the
    /// moved note is ignored if present. Emits source `unset` ops, then
    /// destination `set` ops, then order updates.
    ///
    /// # Errors
    /// - `BoardError::UnknownColumn` when either column is not on the board.
    pub fn diff(&self, action: &MoveNote, dest_notes: &[NoteRecord]) -> BoardResult<Vec<MutationOp>> {
        let old_column = self
            .column(&action.old_column)
            .ok_or_else(|| BoardError::UnknownColumn(action.old_column.clone()))?;
        let new_column = self
            .column(&action.new_column)
            .ok_or_else(|| BoardError::UnknownColumn(action.new_column.clone()))?;

        let mut ops: Vec<MutationOp> = old_column
            .rules
            .iter()
            .flat_map(|rule| rule.unset(&action.note_id))
            .collect();
        ops.extend(
            new_column
                .rules
                .iter()
                .flat_map(|rule| rule.set(&action.note_id)),
        );

        if let (Some(index), None) = (action.new_index, self.sort.as_ref()) {
            let mut siblings: Vec<NoteRecord> = dest_notes
                .iter()
                .filter(|note| note.id != action.note_id)
                .cloned()
                .collect();
            sort_for_display(&mut siblings, None);
            ops.extend(compute_order_updates(&siblings, &action.note_id, index));
        }

        debug!(
            "event=board_diff module=board status=ok from={} to={} ops={}",
            action.old_column,
            action.new_column,
            ops.len()
        );
        Ok(ops)
    }

    /// Classifies `notes` and returns every column in declaration order.
    pub fn sort_into_columns(&self, notes: Vec<NoteRecord>) -> BoardState {
        let mut buckets: BTreeMap<&str, Vec<NoteRecord>> = self
            .column_names
            .iter()
            .map(|name| (name.as_str(), Vec::new()))
            .collect();
        for note in notes {
            if let Some(name) = self.classify(&note) {
                if let Some(bucket) = buckets.get_mut(name) {
                    bucket.push(note);
                }
            }
        }

        let columns = self
            .column_names
            .iter()
            .map(|name| {
                let mut notes = buckets.remove(name.as_str()).unwrap_or_default();
                sort_for_display(&mut notes, self.sort.as_ref());
                SortedColumn {
                    name: name.clone(),
                    notes,
                }
            })
            .collect();

        BoardState {
            board_name: self.board_name.clone(),
            columns,
        }
    }
}

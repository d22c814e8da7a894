//! Rule factory registry and compiled rules.
//!
//! # Responsibility
//! - Enumerate every supported rule type as a closed `RuleKind`.
//! - Compile one config value into a `Rule`: a membership predicate, a search
//!   hint, and symmetric `set`/`unset` mutation generators.
//!
//! # Invariants
//! - Compilation resolves backing tags/notebooks before creating them, so
//!   compiling the same value twice never creates a duplicate entity.
//! - `unset` is the structural inverse of `set` for the same note.
//! - Composite rules (`tags`) match if any constituent matches, and their
//!   mutations/search hints are the union of the constituents'.

use crate::config::RuleValue;
use crate::model::mutation::MutationOp;
use crate::model::note::{
    join_notebook_path, normalize_notebook_path, normalize_tag, NoteId, NoteRecord, NotebookId,
    TagId,
};
use crate::store::{BoardStore, SearchFilter, StoreError};
use log::debug;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

pub type RuleResult<T> = Result<T, RuleError>;

/// Errors from rule compilation.
#[derive(Debug)]
pub enum RuleError {
    /// Value shape or content is unusable for the rule kind.
    InvalidValue { rule: &'static str, reason: String },
    /// The configured root notebook does not exist.
    RootNotFound(String),
    /// Store collaborator failure.
    Store(StoreError),
}

impl Display for RuleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { rule, reason } => {
                write!(f, "invalid value for rule `{rule}`: {reason}")
            }
            Self::RootNotFound(path) => write!(f, "root notebook not found: `{path}`"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RuleError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for RuleError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Every rule type a configuration may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RuleKind {
    /// One tag.
    Tag,
    /// Any of several tags.
    Tags,
    /// Notebook (and descendants) relative to the board root.
    NotebookPath,
    /// Todo completion state.
    Completed,
    /// Everything except one note.
    ExcludeNoteId,
}

impl RuleKind {
    pub const ALL: [RuleKind; 5] = [
        RuleKind::Tag,
        RuleKind::Tags,
        RuleKind::NotebookPath,
        RuleKind::Completed,
        RuleKind::ExcludeNoteId,
    ];

    /// Looks up a rule kind by its configuration key.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Configuration key of this rule kind.
    pub fn name(self) -> &'static str {
        match self {
            Self::Tag => "tag",
            Self::Tags => "tags",
            Self::NotebookPath => "notebookPath",
            Self::Completed => "completed",
            Self::ExcludeNoteId => "excludeNoteId",
        }
    }

    /// Whether a value shape can be compiled by this kind.
    pub fn accepts(self, value: &RuleValue) -> bool {
        match self {
            Self::Tag => value.first_text().and_then(normalize_tag).is_some(),
            Self::Tags => {
                let names = value.texts();
                !names.is_empty() && names.into_iter().all(|name| normalize_tag(name).is_some())
            }
            Self::NotebookPath | Self::ExcludeNoteId => value.first_text().is_some(),
            Self::Completed => value.as_flag().is_some(),
        }
    }

    /// Editor hint for config UIs.
    pub fn editor_type(self) -> EditorType {
        match self {
            Self::Tag | Self::Tags | Self::NotebookPath => EditorType::Text,
            Self::Completed => EditorType::Checkbox,
            Self::ExcludeNoteId => EditorType::Hidden,
        }
    }

    /// Compiles `value` into a rule.
    ///
    /// `root_path` is the board root; `notebookPath` values are relative to it.
    ///
    /// # Side effects
    /// - May create missing tags and notebooks in `store`.
    pub fn compile<S: BoardStore + ?Sized>(
        self,
        value: &RuleValue,
        root_path: &str,
        store: &S,
    ) -> RuleResult<Rule> {
        let rule = match self {
            Self::Tag => {
                let name = value.first_text().ok_or_else(|| missing_text(self))?;
                compile_tag(name, store)?
            }
            Self::Tags => compile_tags(&value.texts(), store)?,
            Self::NotebookPath => {
                let path = value.first_text().ok_or_else(|| missing_text(self))?;
                compile_notebook_path(path, root_path, store)?
            }
            Self::Completed => {
                let flag = value.as_flag().ok_or_else(|| RuleError::InvalidValue {
                    rule: self.name(),
                    reason: "expected true or false".to_string(),
                })?;
                compile_completed(flag)
            }
            Self::ExcludeNoteId => {
                let id = value.first_text().ok_or_else(|| missing_text(self))?;
                exclude_note(id)
            }
        };
        debug!(
            "event=rule_compile module=rules status=ok rule={} search_filters={}",
            self.name(),
            rule.search_filters.len()
        );
        Ok(rule)
    }
}

/// UI hint describing how a rule value is edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorType {
    Text,
    Tags,
    Notebook,
    Checkbox,
    /// Not user-editable.
    Hidden,
}

/// Config section a rule editor targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditTarget {
    Filters,
    Columns,
}

const FILTER_EDITORS: &[(&str, EditorType)] = &[
    ("tags", EditorType::Tags),
    ("rootNotebookPath", EditorType::Notebook),
    ("completed", EditorType::Checkbox),
];

const COLUMN_EDITORS: &[(&str, EditorType)] = &[
    ("tags", EditorType::Tags),
    ("notebookPath", EditorType::Notebook),
    ("completed", EditorType::Checkbox),
    ("backlog", EditorType::Checkbox),
];

/// Editable keys and their editors for one config section.
pub fn editor_types(target: EditTarget) -> &'static [(&'static str, EditorType)] {
    match target {
        EditTarget::Filters => FILTER_EDITORS,
        EditTarget::Columns => COLUMN_EDITORS,
    }
}

#[derive(Debug, Clone)]
enum Matcher {
    Tag {
        name: String,
        tag_id: TagId,
    },
    AnyOf(Vec<Rule>),
    Notebook {
        target_id: NotebookId,
        root_id: NotebookId,
        notebook_ids: BTreeSet<NotebookId>,
    },
    Completed(bool),
    ExcludeNote(NoteId),
}

/// Compiled rule: predicate plus mutation generators for one condition.
#[derive(Debug, Clone)]
pub struct Rule {
    kind: RuleKind,
    matcher: Matcher,
    search_filters: Vec<SearchFilter>,
}

impl Rule {
    pub fn kind(&self) -> RuleKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn editor_type(&self) -> EditorType {
        self.kind.editor_type()
    }

    /// Candidate-narrowing hints; alternatives (any may hold).
    pub fn search_filters(&self) -> &[SearchFilter] {
        &self.search_filters
    }

    /// Membership predicate.
    pub fn filter_note(&self, note: &NoteRecord) -> bool {
        match &self.matcher {
            Matcher::Tag { name, .. } => note.has_tag(name),
            Matcher::AnyOf(rules) => rules.iter().any(|rule| rule.filter_note(note)),
            Matcher::Notebook { notebook_ids, .. } => notebook_ids.contains(&note.notebook_id),
            Matcher::Completed(flag) => note.is_todo && note.is_completed == *flag,
            Matcher::ExcludeNote(id) => note.id != *id,
        }
    }

    /// Mutations that make the predicate hold for `note_id`.
    pub fn set(&self, note_id: &str) -> Vec<MutationOp> {
        match &self.matcher {
            Matcher::Tag { tag_id, .. } => vec![MutationOp::attach_tag(tag_id, note_id)],
            Matcher::AnyOf(rules) => rules.iter().flat_map(|rule| rule.set(note_id)).collect(),
            Matcher::Notebook { target_id, .. } => {
                vec![MutationOp::set_notebook(note_id, target_id)]
            }
            Matcher::Completed(flag) => {
                let stamp = if *flag { current_epoch_ms() } else { 0 };
                vec![MutationOp::set_todo_completed(note_id, stamp)]
            }
            Matcher::ExcludeNote(_) => Vec::new(),
        }
    }

    /// Mutations that make the predicate fail for `note_id`.
    pub fn unset(&self, note_id: &str) -> Vec<MutationOp> {
        match &self.matcher {
            Matcher::Tag { tag_id, .. } => vec![MutationOp::detach_tag(tag_id, note_id)],
            Matcher::AnyOf(rules) => rules.iter().flat_map(|rule| rule.unset(note_id)).collect(),
            Matcher::Notebook { root_id, .. } => vec![MutationOp::set_notebook(note_id, root_id)],
            Matcher::Completed(_) => vec![MutationOp::set_todo_completed(note_id, 0)],
            Matcher::ExcludeNote(_) => Vec::new(),
        }
    }

    /// Tag names this rule implies for matching notes.
    pub fn tag_names(&self) -> Vec<&str> {
        match &self.matcher {
            Matcher::Tag { name, .. } => vec![name.as_str()],
            Matcher::AnyOf(rules) => rules.iter().flat_map(Rule::tag_names).collect(),
            _ => Vec::new(),
        }
    }
}

fn missing_text(kind: RuleKind) -> RuleError {
    RuleError::InvalidValue {
        rule: kind.name(),
        reason: "expected a text value".to_string(),
    }
}

fn compile_tag<S: BoardStore + ?Sized>(raw_name: &str, store: &S) -> RuleResult<Rule> {
    let name = normalize_tag(raw_name).ok_or_else(|| RuleError::InvalidValue {
        rule: RuleKind::Tag.name(),
        reason: "tag name must not be blank".to_string(),
    })?;
    let tag_id = match store.tag_id(&name)? {
        Some(tag_id) => tag_id,
        None => {
            let tag_id = store.create_tag(&name)?;
            debug!("event=tag_create module=rules status=ok tag_id={tag_id}");
            tag_id
        }
    };
    Ok(Rule {
        kind: RuleKind::Tag,
        search_filters: vec![SearchFilter::Tag(name.clone())],
        matcher: Matcher::Tag { name, tag_id },
    })
}

fn compile_tags<S: BoardStore + ?Sized>(names: &[&str], store: &S) -> RuleResult<Rule> {
    let mut rules = Vec::with_capacity(names.len());
    for name in names {
        rules.push(compile_tag(name, store)?);
    }
    let search_filters = rules
        .iter()
        .flat_map(|rule| rule.search_filters.iter().cloned())
        .collect();
    Ok(Rule {
        kind: RuleKind::Tags,
        matcher: Matcher::AnyOf(rules),
        search_filters,
    })
}

fn compile_notebook_path<S: BoardStore + ?Sized>(
    relative: &str,
    root_path: &str,
    store: &S,
) -> RuleResult<Rule> {
    let root = normalize_notebook_path(root_path);
    let path = join_notebook_path(&root, relative);

    let root_id = store
        .resolve_notebook_path(&root)?
        .ok_or_else(|| RuleError::RootNotFound(root.clone()))?;
    let target_id = match store.resolve_notebook_path(&path)? {
        Some(notebook_id) => notebook_id,
        None => {
            let notebook_id = store.create_notebook_path(&path)?;
            debug!("event=notebook_create module=rules status=ok notebook_id={notebook_id}");
            notebook_id
        }
    };

    let mut notebook_ids = BTreeSet::new();
    notebook_ids.insert(target_id.clone());
    notebook_ids.extend(store.descendant_notebooks(&target_id)?);

    Ok(Rule {
        kind: RuleKind::NotebookPath,
        search_filters: vec![SearchFilter::Notebooks(
            notebook_ids.iter().cloned().collect(),
        )],
        matcher: Matcher::Notebook {
            target_id,
            root_id,
            notebook_ids,
        },
    })
}

fn compile_completed(flag: bool) -> Rule {
    Rule {
        kind: RuleKind::Completed,
        matcher: Matcher::Completed(flag),
        search_filters: vec![SearchFilter::Completed(flag)],
    }
}

/// Builds the rule that keeps one note (the board note) off the board.
pub fn exclude_note(note_id: &str) -> Rule {
    Rule {
        kind: RuleKind::ExcludeNoteId,
        matcher: Matcher::ExcludeNote(note_id.to_string()),
        search_filters: vec![SearchFilter::ExcludeNote(note_id.to_string())],
    }
}

fn current_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::{editor_types, exclude_note, EditTarget, EditorType, RuleKind};
    use crate::config::RuleValue;
    use crate::model::mutation::MutationOp;
    use crate::model::note::NoteRecord;

    #[test]
    fn registry_round_trips_every_kind_name() {
        for kind in RuleKind::ALL {
            assert_eq!(RuleKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(RuleKind::from_name("backlog"), None);
        assert_eq!(RuleKind::from_name("rootNotebookPath"), None);
    }

    #[test]
    fn accepted_value_shapes_follow_rule_kind() {
        let text = RuleValue::Text("a".to_string());
        let list = RuleValue::List(vec!["a".to_string(), "b".to_string()]);
        let flag = RuleValue::Flag(true);

        assert!(RuleKind::Tag.accepts(&text));
        assert!(RuleKind::Tag.accepts(&list));
        assert!(!RuleKind::Tag.accepts(&flag));
        assert!(RuleKind::Tags.accepts(&list));
        assert!(!RuleKind::Tags.accepts(&RuleValue::List(Vec::new())));
        assert!(RuleKind::Completed.accepts(&flag));
        assert!(RuleKind::Completed.accepts(&RuleValue::Text("FALSE".to_string())));
        assert!(!RuleKind::Completed.accepts(&text));
    }

    #[test]
    fn blank_tag_names_are_not_accepted() {
        let blank = RuleValue::Text("  ".to_string());
        let mixed = RuleValue::List(vec!["a".to_string(), String::new()]);

        assert!(!RuleKind::Tag.accepts(&blank));
        assert!(!RuleKind::Tags.accepts(&blank));
        assert!(!RuleKind::Tags.accepts(&mixed));
        assert!(RuleKind::NotebookPath.accepts(&RuleValue::Text(String::new())));
    }

    #[test]
    fn exclude_note_rule_filters_one_id_and_never_mutates() {
        let rule = exclude_note("board");
        assert!(!rule.filter_note(&NoteRecord::new("board", "")));
        assert!(rule.filter_note(&NoteRecord::new("other", "")));
        assert_eq!(rule.set("other"), Vec::<MutationOp>::new());
        assert_eq!(rule.unset("other"), Vec::<MutationOp>::new());
        assert_eq!(rule.editor_type(), EditorType::Hidden);
    }

    #[test]
    fn editor_tables_differ_per_target() {
        let filters = editor_types(EditTarget::Filters);
        let columns = editor_types(EditTarget::Columns);
        assert!(filters.iter().any(|(key, _)| *key == "rootNotebookPath"));
        assert!(columns.contains(&("backlog", EditorType::Checkbox)));
        assert!(!filters.iter().any(|(key, _)| *key == "backlog"));
    }
}

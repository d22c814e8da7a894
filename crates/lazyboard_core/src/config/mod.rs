//! Board configuration model and structural validation.
//!
//! # Responsibility
//! - Turn an untyped YAML value into a typed, validated `Config`.
//! - Report the first structural problem as a user-facing `Message`.
//!
//! # Invariants
//! - Validation is pure: it reads only its input and the rule registry.
//! - At most one column is a backlog column, and it carries no rule keys.
//! - Every rule key in `filters` and `columns` names a `RuleKind`.

use crate::rules::RuleKind;
use serde::Serialize;
use serde_yaml_ng::{Mapping, Value};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod edit;
pub mod source;

pub use edit::ConfigEditError;
pub use source::{extract_config_block, parse_config_block, replace_config_block};

/// Reserved filter key naming the notebook that scopes the board.
pub const ROOT_NOTEBOOK_PATH_KEY: &str = "rootNotebookPath";
pub(crate) const FILTERS_KEY: &str = "filters";
pub(crate) const COLUMNS_KEY: &str = "columns";
pub(crate) const SORT_KEY: &str = "sort";
pub(crate) const SORT_BY_KEY: &str = "by";
pub(crate) const NAME_KEY: &str = "name";
pub(crate) const BACKLOG_KEY: &str = "backlog";

/// Value shapes a rule entry may carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleValue {
    Text(String),
    List(Vec<String>),
    Flag(bool),
}

impl RuleValue {
    /// Converts a YAML value. `Ok(None)` for `null`, `Err(())` for maps and
    /// nested lists.
    fn from_yaml(value: &Value) -> Result<Option<Self>, ()> {
        match value {
            Value::Null => Ok(None),
            Value::Bool(flag) => Ok(Some(Self::Flag(*flag))),
            Value::String(text) => Ok(Some(Self::Text(text.clone()))),
            Value::Number(number) => Ok(Some(Self::Text(number.to_string()))),
            Value::Sequence(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(text) => Ok(text.clone()),
                    Value::Number(number) => Ok(number.to_string()),
                    _ => Err(()),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(|list| Some(Self::List(list))),
            _ => Err(()),
        }
    }

    pub(crate) fn to_yaml(&self) -> Value {
        match self {
            Self::Text(text) => Value::String(text.clone()),
            Self::List(items) => {
                Value::Sequence(items.iter().cloned().map(Value::String).collect())
            }
            Self::Flag(flag) => Value::Bool(*flag),
        }
    }

    /// The text value, or the first list entry.
    pub fn first_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text.as_str()),
            Self::List(items) => items.first().map(String::as_str),
            Self::Flag(_) => None,
        }
    }

    /// Every text entry: one for `Text`, all for `List`.
    pub fn texts(&self) -> Vec<&str> {
        match self {
            Self::Text(text) => vec![text.as_str()],
            Self::List(items) => items.iter().map(String::as_str).collect(),
            Self::Flag(_) => Vec::new(),
        }
    }

    /// Boolean reading: flags directly, `"true"`/`"false"` text case-insensitively.
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Flag(flag) => Some(*flag),
            Self::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            Self::List(_) => None,
        }
    }
}

/// One `rule-name: value` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleEntry {
    pub kind: RuleKind,
    pub value: RuleValue,
}

impl RuleEntry {
    pub fn new(kind: RuleKind, value: RuleValue) -> Self {
        Self { kind, value }
    }
}

/// One declared column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnConfig {
    pub name: String,
    pub backlog: bool,
    /// Rule entries in declaration order. Empty for backlog columns.
    pub rules: Vec<RuleEntry>,
}

impl ColumnConfig {
    /// A regular column with the given rules.
    pub fn new(name: impl Into<String>, rules: Vec<RuleEntry>) -> Self {
        Self {
            name: name.into(),
            backlog: false,
            rules,
        }
    }

    /// The catch-all column.
    pub fn backlog(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            backlog: true,
            rules: Vec::new(),
        }
    }
}

/// Field used by a custom column sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CreatedTime,
    Title,
}

/// Custom column sort replacing manual ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub field: SortField,
    pub descending: bool,
}

impl SortSpec {
    /// Parses `createdTime`, `title`, optionally prefixed by `-`.
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        let (descending, name) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let field = match name {
            "createdTime" => SortField::CreatedTime,
            "title" => SortField::Title,
            _ => return None,
        };
        Some(Self { field, descending })
    }

    pub fn as_config_str(&self) -> String {
        let name = match self.field {
            SortField::CreatedTime => "createdTime",
            SortField::Title => "title",
        };
        if self.descending {
            format!("-{name}")
        } else {
            name.to_string()
        }
    }
}

/// Validated board configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Base rule entries, in declaration order.
    pub filters: Vec<RuleEntry>,
    /// `filters.rootNotebookPath`, when declared.
    pub root_notebook_path: Option<String>,
    pub columns: Vec<ColumnConfig>,
    pub sort: Option<SortSpec>,
}

impl Config {
    /// The backlog column, if one is declared.
    pub fn backlog_column(&self) -> Option<&ColumnConfig> {
        self.columns.iter().find(|column| column.backlog)
    }
}

/// Message severity shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// User-facing diagnostic with a stable identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub id: &'static str,
    pub severity: Severity,
    pub title: String,
    pub details: Option<String>,
}

/// Structural configuration failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// YAML text could not be parsed.
    Parse(String),
    /// Input is not a mapping.
    EmptyConfig,
    MissingColumns,
    NotAList,
    NoColumns,
    FiltersNotAMap,
    UnknownFilterRule(String),
    InvalidSort,
    /// 1-based column position.
    ColumnNotAMap(usize),
    /// 1-based column position.
    MissingColumnName(usize),
    DuplicateColumnName(String),
    UnknownColumnRule {
        column: String,
        key: String,
    },
    BacklogConflict {
        column: String,
        key: String,
    },
    InvalidRuleValue {
        scope: String,
        rule: String,
    },
}

impl ConfigError {
    /// Stable identifier used by message consumers.
    pub fn id(&self) -> &'static str {
        match self {
            Self::Parse(_) => "parseError",
            _ => "configError",
        }
    }

    /// Renders the user-facing message.
    pub fn message(&self) -> Message {
        let details = match self {
            Self::Parse(details) => Some(details.clone()),
            _ => None,
        };
        Message {
            id: self.id(),
            severity: Severity::Error,
            title: self.to_string(),
            details,
        }
    }
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(_) => write!(f, "YAML Parse error"),
            Self::EmptyConfig => write!(f, "Configuration is empty"),
            Self::MissingColumns => write!(f, "There are no columns defined!"),
            Self::NotAList => write!(f, "Columns has to be a list"),
            Self::NoColumns => write!(f, "You have to define at least one column"),
            Self::FiltersNotAMap => write!(f, "Filters has to contain a dictionary of rules"),
            Self::UnknownFilterRule(key) => write!(f, "Invalid rule type \"{key}\" in filters"),
            Self::InvalidSort => write!(
                f,
                "Sort must be one of 'createdTime', 'title'; optionally prefix by '-' for descending order"
            ),
            Self::ColumnNotAMap(index) => write!(f, "Column #{index} is not a dictionary"),
            Self::MissingColumnName(index) => write!(f, "Column #{index} has no name!"),
            Self::DuplicateColumnName(name) => {
                write!(f, "Column name \"{name}\" is used more than once")
            }
            Self::UnknownColumnRule { column, key } => {
                write!(f, "Invalid rule type \"{key}\" in column \"{column}\"")
            }
            Self::BacklogConflict { column, key } if key == BACKLOG_KEY => write!(
                f,
                "Only one column can be marked as backlog, but \"{column}\" is a second one!"
            ),
            Self::BacklogConflict { column, key } => write!(
                f,
                "If a column is marked as backlog, it cannot have any other rules specified. Remove {key} rule from {column}!"
            ),
            Self::InvalidRuleValue { scope, rule } => {
                write!(f, "Invalid value for rule \"{rule}\" in {scope}")
            }
        }
    }
}

impl Error for ConfigError {}

/// Validates a parsed YAML document and converts it into a `Config`.
///
/// # Errors
/// - Returns the first structural violation found, in document order.
pub fn validate(raw: &Value) -> Result<Config, ConfigError> {
    let root = match raw {
        Value::Mapping(map) => map,
        _ => return Err(ConfigError::EmptyConfig),
    };

    let columns_value = root
        .get(COLUMNS_KEY)
        .ok_or(ConfigError::MissingColumns)?;
    let raw_columns = match columns_value {
        Value::Sequence(items) => items,
        _ => return Err(ConfigError::NotAList),
    };
    if raw_columns.is_empty() {
        return Err(ConfigError::NoColumns);
    }

    let (filters, root_notebook_path) = match root.get(FILTERS_KEY) {
        None | Some(Value::Null) => (Vec::new(), None),
        Some(Value::Mapping(map)) => validate_filters(map)?,
        Some(_) => return Err(ConfigError::FiltersNotAMap),
    };

    let sort = match root.get(SORT_KEY) {
        None => None,
        Some(value) => Some(validate_sort(value)?),
    };

    let mut columns = Vec::with_capacity(raw_columns.len());
    let mut seen_names = BTreeSet::new();
    let mut has_backlog = false;
    for (offset, raw_column) in raw_columns.iter().enumerate() {
        let column = validate_column(offset + 1, raw_column)?;
        if !seen_names.insert(column.name.clone()) {
            return Err(ConfigError::DuplicateColumnName(column.name));
        }
        if column.backlog {
            if has_backlog {
                return Err(ConfigError::BacklogConflict {
                    column: column.name,
                    key: BACKLOG_KEY.to_string(),
                });
            }
            has_backlog = true;
        }
        columns.push(column);
    }

    Ok(Config {
        filters,
        root_notebook_path,
        columns,
        sort,
    })
}

fn validate_filters(map: &Mapping) -> Result<(Vec<RuleEntry>, Option<String>), ConfigError> {
    let mut filters = Vec::new();
    let mut root_notebook_path = None;
    for (key, value) in map {
        let key = key_to_string(key);
        if key == ROOT_NOTEBOOK_PATH_KEY {
            root_notebook_path = match value {
                Value::String(path) => Some(path.clone()),
                Value::Null => None,
                _ => {
                    return Err(ConfigError::InvalidRuleValue {
                        scope: FILTERS_KEY.to_string(),
                        rule: key,
                    })
                }
            };
            continue;
        }

        let kind =
            RuleKind::from_name(&key).ok_or_else(|| ConfigError::UnknownFilterRule(key.clone()))?;
        if let Some(value) = rule_value(kind, value, FILTERS_KEY)? {
            filters.push(RuleEntry::new(kind, value));
        }
    }
    Ok((filters, root_notebook_path))
}

fn validate_sort(value: &Value) -> Result<SortSpec, ConfigError> {
    let by = match value {
        Value::Mapping(map) => map.get(SORT_BY_KEY),
        _ => None,
    };
    match by {
        Some(Value::String(text)) => SortSpec::parse(text).ok_or(ConfigError::InvalidSort),
        _ => Err(ConfigError::InvalidSort),
    }
}

fn validate_column(index: usize, raw: &Value) -> Result<ColumnConfig, ConfigError> {
    let map = match raw {
        Value::Mapping(map) => map,
        _ => return Err(ConfigError::ColumnNotAMap(index)),
    };

    let name = match map.get(NAME_KEY) {
        Some(Value::String(name)) if !name.is_empty() => name.clone(),
        _ => return Err(ConfigError::MissingColumnName(index)),
    };

    let backlog = match map.get(BACKLOG_KEY) {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(_) => {
            return Err(ConfigError::InvalidRuleValue {
                scope: format!("column \"{name}\""),
                rule: BACKLOG_KEY.to_string(),
            })
        }
    };

    let scope = format!("column \"{name}\"");
    let mut rules = Vec::new();
    for (key, value) in map {
        let key = key_to_string(key);
        if key == NAME_KEY || key == BACKLOG_KEY {
            continue;
        }
        let kind = RuleKind::from_name(&key).ok_or_else(|| ConfigError::UnknownColumnRule {
            column: name.clone(),
            key: key.clone(),
        })?;
        if backlog {
            return Err(ConfigError::BacklogConflict {
                column: name.clone(),
                key,
            });
        }
        if let Some(value) = rule_value(kind, value, &scope)? {
            rules.push(RuleEntry::new(kind, value));
        }
    }

    Ok(ColumnConfig {
        name,
        backlog,
        rules,
    })
}

fn rule_value(kind: RuleKind, raw: &Value, scope: &str) -> Result<Option<RuleValue>, ConfigError> {
    let invalid = || ConfigError::InvalidRuleValue {
        scope: scope.to_string(),
        rule: kind.name().to_string(),
    };
    match RuleValue::from_yaml(raw).map_err(|_| invalid())? {
        None => Ok(None),
        Some(value) if kind.accepts(&value) => Ok(Some(value)),
        Some(_) => Err(invalid()),
    }
}

fn key_to_string(key: &Value) -> String {
    match key {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Null => "null".to_string(),
        _ => "<complex key>".to_string(),
    }
}

//! Programmatic config edits and YAML serialization.
//!
//! # Responsibility
//! - Edit columns by name or by position as two distinct operations.
//! - Serialize a `Config` back to YAML for the note body.
//!
//! # Invariants
//! - An edit either leaves a config that passes `validate` or changes nothing.

use super::{
    validate, ColumnConfig, Config, ConfigError, RuleEntry, BACKLOG_KEY, COLUMNS_KEY, FILTERS_KEY,
    NAME_KEY, ROOT_NOTEBOOK_PATH_KEY, SORT_BY_KEY, SORT_KEY,
};
use serde_yaml_ng::{Mapping, Value};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from config edit operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigEditError {
    ColumnNotFound(String),
    ColumnIndexOutOfRange { index: usize, len: usize },
    /// The edited config would fail validation.
    Invalid(ConfigError),
    /// A rule kind appears twice in one column or in the filters.
    DuplicateRule { scope: String, rule: &'static str },
    /// YAML serialization failed.
    Serialize(String),
}

impl Display for ConfigEditError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ColumnNotFound(name) => write!(f, "column not found: \"{name}\""),
            Self::ColumnIndexOutOfRange { index, len } => {
                write!(f, "column index {index} out of range (0..{len})")
            }
            Self::Invalid(err) => write!(f, "edit rejected: {err}"),
            Self::DuplicateRule { scope, rule } => {
                write!(f, "rule \"{rule}\" is used more than once in {scope}")
            }
            Self::Serialize(details) => write!(f, "config serialization failed: {details}"),
        }
    }
}

impl Error for ConfigEditError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Invalid(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ConfigError> for ConfigEditError {
    fn from(value: ConfigError) -> Self {
        Self::Invalid(value)
    }
}

impl Config {
    /// Replaces the column currently named `name`.
    pub fn edit_column_by_name(
        &mut self,
        name: &str,
        column: ColumnConfig,
    ) -> Result<(), ConfigEditError> {
        let index = self
            .columns
            .iter()
            .position(|existing| existing.name == name)
            .ok_or_else(|| ConfigEditError::ColumnNotFound(name.to_string()))?;
        self.commit(|draft| draft.columns[index] = column)
    }

    /// Replaces the column at `index` (0-based).
    pub fn edit_column_by_index(
        &mut self,
        index: usize,
        column: ColumnConfig,
    ) -> Result<(), ConfigEditError> {
        let len = self.columns.len();
        if index >= len {
            return Err(ConfigEditError::ColumnIndexOutOfRange { index, len });
        }
        self.commit(|draft| draft.columns[index] = column)
    }

    /// Appends a column.
    pub fn add_column(&mut self, column: ColumnConfig) -> Result<(), ConfigEditError> {
        self.commit(|draft| draft.columns.push(column))
    }

    /// Removes the column named `name`.
    pub fn remove_column(&mut self, name: &str) -> Result<(), ConfigEditError> {
        let index = self
            .columns
            .iter()
            .position(|existing| existing.name == name)
            .ok_or_else(|| ConfigEditError::ColumnNotFound(name.to_string()))?;
        self.commit(|draft| {
            draft.columns.remove(index);
        })
    }

    /// Replaces the base rules and the root notebook path.
    pub fn edit_filters(
        &mut self,
        filters: Vec<RuleEntry>,
        root_notebook_path: Option<String>,
    ) -> Result<(), ConfigEditError> {
        self.commit(|draft| {
            draft.filters = filters;
            draft.root_notebook_path = root_notebook_path;
        })
    }

    /// Renders the config as a YAML document value.
    pub fn to_yaml_value(&self) -> Value {
        let mut root = Mapping::new();

        let mut filters = Mapping::new();
        if let Some(path) = &self.root_notebook_path {
            filters.insert(
                Value::String(ROOT_NOTEBOOK_PATH_KEY.to_string()),
                Value::String(path.clone()),
            );
        }
        for entry in &self.filters {
            filters.insert(Value::String(entry.kind.name().to_string()), entry.value.to_yaml());
        }
        if !filters.is_empty() {
            root.insert(Value::String(FILTERS_KEY.to_string()), Value::Mapping(filters));
        }

        if let Some(sort) = &self.sort {
            let mut by = Mapping::new();
            by.insert(
                Value::String(SORT_BY_KEY.to_string()),
                Value::String(sort.as_config_str()),
            );
            root.insert(Value::String(SORT_KEY.to_string()), Value::Mapping(by));
        }

        let columns = self
            .columns
            .iter()
            .map(|column| {
                let mut map = Mapping::new();
                map.insert(
                    Value::String(NAME_KEY.to_string()),
                    Value::String(column.name.clone()),
                );
                if column.backlog {
                    map.insert(Value::String(BACKLOG_KEY.to_string()), Value::Bool(true));
                }
                for entry in &column.rules {
                    map.insert(Value::String(entry.kind.name().to_string()), entry.value.to_yaml());
                }
                Value::Mapping(map)
            })
            .collect();
        root.insert(Value::String(COLUMNS_KEY.to_string()), Value::Sequence(columns));

        Value::Mapping(root)
    }

    /// Renders the config as YAML text for the fenced block.
    pub fn to_yaml_string(&self) -> Result<String, ConfigEditError> {
        serde_yaml_ng::to_string(&self.to_yaml_value())
            .map_err(|err| ConfigEditError::Serialize(err.to_string()))
    }

    fn commit(&mut self, edit: impl FnOnce(&mut Config)) -> Result<(), ConfigEditError> {
        let mut draft = self.clone();
        edit(&mut draft);
        ensure_unique_rules(FILTERS_KEY, &draft.filters)?;
        for column in &draft.columns {
            ensure_unique_rules(&format!("column \"{}\"", column.name), &column.rules)?;
        }
        *self = validate(&draft.to_yaml_value())?;
        Ok(())
    }
}

/// Rule entries are serialized as mapping keys, so each kind may appear once.
fn ensure_unique_rules(scope: &str, rules: &[RuleEntry]) -> Result<(), ConfigEditError> {
    let mut seen = BTreeSet::new();
    for entry in rules {
        if !seen.insert(entry.kind) {
            return Err(ConfigEditError::DuplicateRule {
                scope: scope.to_string(),
                rule: entry.kind.name(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::ConfigEditError;
    use crate::config::{parse_config_block, ColumnConfig, ConfigError, RuleEntry, RuleValue};
    use crate::rules::RuleKind;

    const YAML: &str = "filters:\n  rootNotebookPath: projects\n  tag: task\ncolumns:\n  - name: Backlog\n    backlog: true\n  - name: Ready\n    tag: ready\n";

    #[test]
    fn edit_by_name_and_by_index_target_distinct_columns() {
        let mut config = parse_config_block(YAML).unwrap();
        config
            .edit_column_by_name(
                "Ready",
                ColumnConfig::new(
                    "Review",
                    vec![RuleEntry::new(RuleKind::Tag, RuleValue::Text("review".to_string()))],
                ),
            )
            .unwrap();
        assert_eq!(config.columns[1].name, "Review");

        config
            .edit_column_by_index(0, ColumnConfig::backlog("Inbox"))
            .unwrap();
        assert_eq!(config.columns[0].name, "Inbox");

        let err = config
            .edit_column_by_index(5, ColumnConfig::backlog("X"))
            .unwrap_err();
        assert_eq!(err, ConfigEditError::ColumnIndexOutOfRange { index: 5, len: 2 });
        let err = config
            .edit_column_by_name("Missing", ColumnConfig::backlog("X"))
            .unwrap_err();
        assert_eq!(err, ConfigEditError::ColumnNotFound("Missing".to_string()));
    }

    #[test]
    fn rejected_edit_leaves_config_untouched() {
        let mut config = parse_config_block(YAML).unwrap();
        let before = config.clone();
        let err = config.add_column(ColumnConfig::backlog("Second")).unwrap_err();
        assert!(matches!(
            err,
            ConfigEditError::Invalid(ConfigError::BacklogConflict { .. })
        ));
        assert_eq!(config, before);

        let err = config.remove_column("Backlog").and_then(|_| config.remove_column("Ready"));
        assert_eq!(err, Err(ConfigEditError::Invalid(ConfigError::NoColumns)));
    }

    #[test]
    fn repeated_rule_kind_is_rejected_instead_of_dropped() {
        let mut config = parse_config_block(YAML).unwrap();
        let before = config.clone();
        let tag = |name: &str| RuleEntry::new(RuleKind::Tag, RuleValue::Text(name.to_string()));

        let err = config
            .add_column(ColumnConfig::new("B", vec![tag("x"), tag("y")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigEditError::DuplicateRule {
                scope: "column \"B\"".to_string(),
                rule: "tag",
            }
        );
        assert_eq!(config, before);

        let err = config
            .edit_filters(vec![tag("a"), tag("b")], None)
            .unwrap_err();
        assert!(matches!(err, ConfigEditError::DuplicateRule { rule: "tag", .. }));
        assert_eq!(config, before);

        config
            .add_column(ColumnConfig::new(
                "C",
                vec![
                    tag("x"),
                    RuleEntry::new(RuleKind::Completed, RuleValue::Flag(true)),
                ],
            ))
            .unwrap();
        assert_eq!(config.columns[2].rules.len(), 2);
    }

    #[test]
    fn yaml_output_parses_back_to_the_same_config() {
        let config = parse_config_block(YAML).unwrap();
        let text = config.to_yaml_string().unwrap();
        assert_eq!(parse_config_block(&text).unwrap(), config);
    }
}

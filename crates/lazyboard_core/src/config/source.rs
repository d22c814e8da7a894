//! Fenced configuration block embedded in a board note body.
//!
//! # Responsibility
//! - Locate the first ```` ```kanban ```` fenced block in markdown.
//! - Replace the block (and optionally the text after it) in place.
//! - Parse block YAML and hand it to the validator.
//!
//! # Invariants
//! - Text before the block is preserved verbatim on replacement.
//! - Tabs are normalized to two spaces before YAML parsing.

use super::{validate, Config, ConfigError};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static CONFIG_BLOCK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\A(.*?)```kanban(.*?)```(.*)\z").expect("valid config block regex")
});

const FENCE_OPEN: &str = "```kanban";
const FENCE_CLOSE: &str = "```";

/// Returns the YAML between the fences, without the fences themselves.
pub fn extract_config_block(body: &str) -> Option<&str> {
    CONFIG_BLOCK_RE
        .captures(body)
        .and_then(|caps| caps.get(2))
        .map(|m| m.as_str())
}

/// Rewrites the fenced block of `body`.
///
/// `config` replaces the YAML inside the fence (pass it without fences);
/// `after` replaces everything following the closing fence. `None` keeps the
/// current content. Bodies without a block are returned unchanged.
pub fn replace_config_block(body: &str, config: Option<&str>, after: Option<&str>) -> String {
    CONFIG_BLOCK_RE
        .replace(body, |caps: &Captures<'_>| {
            let mut out = String::with_capacity(body.len());
            out.push_str(&caps[1]);
            out.push_str(FENCE_OPEN);
            match config {
                Some(config) => {
                    out.push('\n');
                    out.push_str(config);
                }
                None => out.push_str(&caps[2]),
            }
            out.push_str(FENCE_CLOSE);
            match after {
                Some(after) => {
                    out.push('\n');
                    out.push_str(after);
                }
                None => out.push_str(&caps[3]),
            }
            out
        })
        .into_owned()
}

/// Parses block YAML and validates it.
///
/// # Errors
/// - `ConfigError::Parse` when the YAML is malformed.
/// - Any validation error from `validate`.
pub fn parse_config_block(yaml: &str) -> Result<Config, ConfigError> {
    let fixed = yaml.replace('\t', "  ");
    let raw: serde_yaml_ng::Value =
        serde_yaml_ng::from_str(&fixed).map_err(|err| ConfigError::Parse(err.to_string()))?;
    validate(&raw)
}

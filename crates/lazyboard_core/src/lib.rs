//! Kanban boards over tagged, foldered notes.
//!
//! A board note embeds a fenced YAML configuration; this crate validates it,
//! compiles it into rules and columns, classifies notes, and turns card moves
//! into store mutations.

pub mod board;
pub mod config;
pub mod db;
pub mod export;
pub mod logging;
pub mod model;
pub mod rules;
pub mod service;
pub mod store;

pub use board::{Board, BoardContext, BoardError, BoardState, MoveNote, SortedColumn};
pub use config::{validate, Config, ConfigError, Message};
pub use db::{open_db, open_db_in_memory, DbError};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::mutation::{MutationOp, MutationVerb};
pub use model::note::{ConfigNote, NoteRecord};
pub use rules::{Rule, RuleKind};
pub use service::{BoardService, BoardServiceError, OpenedBoard};
pub use store::{BoardStore, NoteDraft, SearchQuery, SqliteBoardStore, StoreError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

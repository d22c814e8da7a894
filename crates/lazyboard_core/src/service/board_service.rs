//! Board use-case service.
//!
//! # Responsibility
//! - Load a board note, parse its fenced config and compile a `Board`.
//! - Assemble board state from store candidates.
//! - Apply move actions and config edits back to the store.
//!
//! # Invariants
//! - A move that names a column missing from the board aborts before any
//!   mutation is applied.
//! - Config edits write a body that parses back to the edited config.

use crate::board::{Board, BoardContext, BoardError, BoardState, MoveNote};
use crate::config::{
    extract_config_block, parse_config_block, replace_config_block, Config, ConfigEditError,
    ConfigError, Message,
};
use crate::export::markdown_table;
use crate::model::mutation::MutationOp;
use crate::model::note::{ConfigNote, NoteId};
use crate::rules::RuleError;
use crate::store::{BoardStore, StoreError};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Errors from board service operations.
#[derive(Debug)]
pub enum BoardServiceError {
    /// Board note does not exist.
    ConfigNoteNotFound(NoteId),
    /// Note body has no fenced config block.
    MissingConfigBlock(NoteId),
    Config(ConfigError),
    Edit(ConfigEditError),
    Board(BoardError),
    Store(StoreError),
}

impl Display for BoardServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConfigNoteNotFound(id) => write!(f, "board note not found: {id}"),
            Self::MissingConfigBlock(id) => {
                write!(f, "note {id} has no ```kanban configuration block")
            }
            Self::Config(err) => write!(f, "{err}"),
            Self::Edit(err) => write!(f, "{err}"),
            Self::Board(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for BoardServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Edit(err) => Some(err),
            Self::Board(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::ConfigNoteNotFound(_) | Self::MissingConfigBlock(_) => None,
        }
    }
}

impl From<ConfigError> for BoardServiceError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<ConfigEditError> for BoardServiceError {
    fn from(value: ConfigEditError) -> Self {
        Self::Edit(value)
    }
}

impl From<BoardError> for BoardServiceError {
    fn from(value: BoardError) -> Self {
        match value {
            BoardError::Rule(RuleError::Store(err)) => Self::Store(err),
            other => Self::Board(other),
        }
    }
}

impl From<StoreError> for BoardServiceError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

pub type BoardServiceResult<T> = Result<T, BoardServiceError>;

/// Compiled board plus the config text it was built from.
#[derive(Debug, Clone)]
pub struct OpenedBoard {
    pub board: Board,
    /// Raw fenced block content; compare against the note to detect edits.
    pub config_text: String,
}

/// Board service facade.
pub struct BoardService<S: BoardStore> {
    store: S,
}

impl<S: BoardStore> BoardService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads the board note and its validated config.
    ///
    /// # Errors
    /// - `ConfigNoteNotFound`, `MissingConfigBlock`, or the parse/validation
    ///   error of the block.
    pub fn load_config(&self, note_id: &str) -> BoardServiceResult<(ConfigNote, Config, String)> {
        let note = self.config_note(note_id)?;
        let text = extract_config_block(&note.body)
            .ok_or_else(|| BoardServiceError::MissingConfigBlock(note_id.to_string()))?
            .to_string();
        let config = parse_config_block(&text)?;
        Ok((note, config, text))
    }

    /// Returns the diagnostic for the board note's config, `None` when valid.
    pub fn check_config(&self, note_id: &str) -> BoardServiceResult<Option<Message>> {
        match self.load_config(note_id) {
            Ok(_) => Ok(None),
            Err(BoardServiceError::Config(err)) => Ok(Some(err.message())),
            Err(err) => Err(err),
        }
    }

    /// Compiles the board defined in `note_id`.
    ///
    /// # Side effects
    /// - May create tags and notebooks named by the config.
    pub fn open_board(&self, note_id: &str) -> BoardServiceResult<OpenedBoard> {
        let started_at = Instant::now();
        let (note, config, config_text) = self.load_config(note_id)?;
        let context = BoardContext::for_config_note(&note, &config, &self.store)?;
        let board = Board::compile(&config, &context, &self.store)?;
        info!(
            "event=board_open module=service status=ok note_id={note_id} duration_ms={}",
            started_at.elapsed().as_millis()
        );
        Ok(OpenedBoard { board, config_text })
    }

    /// Whether the stored config differs from the one `opened` was built from.
    pub fn is_stale(&self, note_id: &str, opened: &OpenedBoard) -> BoardServiceResult<bool> {
        let note = self.config_note(note_id)?;
        Ok(extract_config_block(&note.body) != Some(opened.config_text.as_str()))
    }

    /// Loads candidates and sorts them into the board's columns.
    pub fn board_state(&self, board: &Board) -> BoardServiceResult<BoardState> {
        let notes = self.store.search_notes(&board.search_query())?;
        Ok(board.sort_into_columns(notes))
    }

    /// Name of the column `note_id` currently belongs to.
    pub fn note_column(&self, board: &Board, note_id: &str) -> BoardServiceResult<Option<String>> {
        let note = self
            .store
            .get_note(note_id)?
            .ok_or_else(|| StoreError::NoteNotFound(note_id.to_string()))?;
        Ok(board.classify(&note).map(str::to_string))
    }

    /// Applies a move and returns the mutations that were applied.
    ///
    /// The mutations are applied as one unit through `BoardStore::apply_all`.
    ///
    /// # Errors
    /// - `BoardServiceError::Board(BoardError::UnknownColumn)` when the board
    ///   is stale; nothing is applied in that case.
    pub fn move_note(&self, board: &Board, action: &MoveNote) -> BoardServiceResult<Vec<MutationOp>> {
        let state = self.board_state(board)?;
        let dest_notes = state
            .column(&action.new_column)
            .map(|column| column.notes.as_slice())
            .unwrap_or_default();

        let ops = match board.diff(action, dest_notes) {
            Ok(ops) => ops,
            Err(err) => {
                error!(
                    "event=board_move module=service status=error note_id={} error={err}",
                    action.note_id
                );
                return Err(err.into());
            }
        };

        if let Err(err) = self.store.apply_all(&ops) {
            error!(
                "event=board_move module=service status=error note_id={} error={err}",
                action.note_id
            );
            return Err(err.into());
        }
        info!(
            "event=board_move module=service status=ok note_id={} from={} to={} ops={}",
            action.note_id,
            action.old_column,
            action.new_column,
            ops.len()
        );
        Ok(ops)
    }

    /// Edits the board config and writes it back into the note body.
    ///
    /// The edit runs on the validated config; a rejected edit leaves the note
    /// untouched.
    pub fn edit_config<F>(&self, note_id: &str, edit: F) -> BoardServiceResult<Config>
    where
        F: FnOnce(&mut Config) -> Result<(), ConfigEditError>,
    {
        let (note, mut config, _) = self.load_config(note_id)?;
        edit(&mut config)?;
        let yaml = config.to_yaml_string()?;
        let body = replace_config_block(&note.body, Some(&yaml), None);
        self.store.update_note_body(note_id, &body)?;
        info!("event=board_config_edit module=service status=ok note_id={note_id}");
        Ok(config)
    }

    /// Writes the board as a markdown table after the config block.
    pub fn write_markdown(&self, note_id: &str, board: &Board) -> BoardServiceResult<()> {
        let note = self.config_note(note_id)?;
        if extract_config_block(&note.body).is_none() {
            return Err(BoardServiceError::MissingConfigBlock(note_id.to_string()));
        }
        let state = self.board_state(board)?;
        let table = markdown_table(&state);
        let body = replace_config_block(&note.body, None, Some(&table));
        if body == note.body {
            return Ok(());
        }
        self.store.update_note_body(note_id, &body)?;
        Ok(())
    }

    fn config_note(&self, note_id: &str) -> BoardServiceResult<ConfigNote> {
        match self.store.get_config_note(note_id)? {
            Some(note) => Ok(note),
            None => {
                warn!("event=board_open module=service status=error note_id={note_id} error_code=note_not_found");
                Err(BoardServiceError::ConfigNoteNotFound(note_id.to_string()))
            }
        }
    }
}

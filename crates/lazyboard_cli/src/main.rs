//! `lazyboard` command line entry point.
//!
//! Drives `lazyboard_core` against a SQLite board database: validate config
//! blocks, list and render boards, move cards, and export markdown.

use clap::{Parser, Subcommand, ValueEnum};
use lazyboard_core::config::{extract_config_block, parse_config_block};
use lazyboard_core::export::{markdown_list, markdown_table};
use lazyboard_core::store::BoardStore;
use lazyboard_core::{
    default_log_level, init_logging, open_db, BoardService, MoveNote, NoteDraft, SqliteBoardStore,
};
use log::info;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

type CliResult = Result<ExitCode, Box<dyn Error>>;

#[derive(Parser)]
#[command(name = "lazyboard", about = "Kanban boards over tagged, foldered notes")]
struct Cli {
    /// Board database file.
    #[arg(long, global = true, default_value = "lazyboard.db")]
    db: PathBuf,

    /// Absolute directory for rolling log files; logging is off when unset.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Log level (trace|debug|info|warn|error).
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a markdown or YAML file holding a board config.
    Validate {
        file: PathBuf,
    },

    #[command(flatten)]
    Store(StoreCommand),
}

/// Subcommands that work on the board database.
#[derive(Subcommand)]
enum StoreCommand {
    /// List notes that carry a board config.
    Boards,

    /// Print the columns of one board.
    Show {
        board_id: String,

        /// Print the board state as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Move a card to another column.
    Move {
        board_id: String,
        note_id: String,

        /// Destination column name.
        #[arg(long)]
        to: String,

        /// Position in the destination column (0 = top).
        #[arg(long)]
        index: Option<usize>,
    },

    /// Render a board as markdown.
    Export {
        board_id: String,

        #[arg(long, value_enum, default_value_t = ExportFormat::Table)]
        format: ExportFormat,

        /// Write the table below the config block of the board note.
        #[arg(long)]
        write: bool,
    },

    /// Create a note.
    Note {
        title: String,

        /// Notebook path, created when missing.
        #[arg(long, default_value = "")]
        notebook: String,

        /// Tag names; repeatable.
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Create the note as a todo.
        #[arg(long)]
        todo: bool,

        /// File whose content becomes the note body.
        #[arg(long)]
        body_file: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportFormat {
    Table,
    List,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(log_dir) = cli.log_dir.as_deref() {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        if let Err(err) = init_logging(level, log_dir) {
            eprintln!("Logging disabled: {err}");
        }
    }

    let result = match &cli.command {
        Command::Validate { file } => run_validate(file),
        Command::Store(command) => run(&cli.db, command),
    };
    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run_validate(file: &Path) -> CliResult {
    let text = std::fs::read_to_string(file)?;
    let yaml = extract_config_block(&text).unwrap_or(text.as_str());
    match parse_config_block(yaml) {
        Ok(config) => {
            println!("ok: {} column(s)", config.columns.len());
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            let message = err.message();
            println!("{}: {}", message.id, message.title);
            if let Some(details) = message.details {
                println!("{details}");
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

fn run(db: &Path, command: &StoreCommand) -> CliResult {
    let conn = open_db(db)?;
    let store = SqliteBoardStore::try_new(&conn)?;

    match command {
        StoreCommand::Boards => {
            for note in store.list_board_notes()? {
                println!("{}\t{}", note.id, note.title);
            }
            Ok(ExitCode::SUCCESS)
        }
        StoreCommand::Note {
            title,
            notebook,
            tags,
            todo,
            body_file,
        } => {
            let mut draft = NoteDraft::new(title.as_str());
            draft.notebook_id = store.create_notebook_path(notebook)?;
            draft.tags = tags.clone();
            draft.is_todo = *todo;
            if let Some(path) = body_file {
                draft.body = std::fs::read_to_string(path)?;
            }
            println!("{}", store.insert_note(&draft)?);
            Ok(ExitCode::SUCCESS)
        }
        StoreCommand::Show { board_id, json } => {
            let service = BoardService::new(store);
            let opened = service.open_board(board_id)?;
            let state = service.board_state(&opened.board)?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&state)?);
                return Ok(ExitCode::SUCCESS);
            }
            println!("# {}", state.board_name);
            for column in &state.columns {
                println!("\n## {} ({})", column.name, column.notes.len());
                for note in &column.notes {
                    let visible: Vec<&str> = note
                        .tags
                        .iter()
                        .filter(|tag| !opened.board.hidden_tags().contains(*tag))
                        .map(String::as_str)
                        .collect();
                    if visible.is_empty() {
                        println!("- {}  {}", note.id, note.title);
                    } else {
                        println!("- {}  {}  [{}]", note.id, note.title, visible.join(", "));
                    }
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        StoreCommand::Move {
            board_id,
            note_id,
            to,
            index,
        } => {
            let service = BoardService::new(store);
            let opened = service.open_board(board_id)?;
            let Some(from) = service.note_column(&opened.board, note_id)? else {
                eprintln!("Note {note_id} is not on board {board_id}");
                return Ok(ExitCode::FAILURE);
            };
            let action = MoveNote {
                note_id: note_id.clone(),
                old_column: from,
                new_column: to.clone(),
                new_index: *index,
            };
            let ops = service.move_note(&opened.board, &action)?;
            info!("event=cli_move module=cli status=ok ops={}", ops.len());
            println!("moved {note_id} to {to} ({} change(s))", ops.len());
            Ok(ExitCode::SUCCESS)
        }
        StoreCommand::Export {
            board_id,
            format,
            write,
        } => {
            let service = BoardService::new(store);
            let opened = service.open_board(board_id)?;
            if *write {
                service.write_markdown(board_id, &opened.board)?;
                return Ok(ExitCode::SUCCESS);
            }
            let state = service.board_state(&opened.board)?;
            let rendered = match format {
                ExportFormat::Table => markdown_table(&state),
                ExportFormat::List => markdown_list(&state),
            };
            println!("{rendered}");
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command, StoreCommand};
    use clap::{CommandFactory, Parser};

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn validate_and_store_commands_parse_separately() {
        let cli = Cli::try_parse_from(["lazyboard", "validate", "board.md"]).unwrap();
        assert!(matches!(cli.command, Command::Validate { .. }));

        let cli = Cli::try_parse_from(["lazyboard", "--db", "x.db", "move", "b", "n", "--to", "Done"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Command::Store(StoreCommand::Move { index: None, .. })
        ));
    }
}

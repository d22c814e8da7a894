//! Markdown renderings of a board state.
//!
//! Cards are rendered as note links (`[title](:/id)`) so the output can be
//! pasted into any note and stay clickable.

use crate::board::BoardState;
use crate::model::note::NoteRecord;

const SEPARATOR: &str = "---";

/// Renders the board as a table with one column per board column.
///
/// Returns an empty string for a board without columns.
pub fn markdown_table(state: &BoardState) -> String {
    if state.columns.is_empty() {
        return String::new();
    }

    let names: Vec<String> = state
        .columns
        .iter()
        .map(|column| escape_cell(&column.name))
        .collect();
    let mut out = names.join(" | ");
    out.push('\n');
    out.push_str(&vec![SEPARATOR; names.len()].join(" | "));
    out.push('\n');

    let rows = state
        .columns
        .iter()
        .map(|column| column.notes.len())
        .max()
        .unwrap_or(0);
    for index in 0..rows {
        let cells: Vec<String> = state
            .columns
            .iter()
            .map(|column| {
                column
                    .notes
                    .get(index)
                    .map(|note| escape_cell(&md_link(note)))
                    .unwrap_or_default()
            })
            .collect();
        out.push_str("| ");
        out.push_str(&cells.join(" | "));
        out.push_str(" |\n");
    }
    out
}

/// Renders the board as one `##` section per column with a bullet per card.
pub fn markdown_list(state: &BoardState) -> String {
    state
        .columns
        .iter()
        .map(|column| {
            let mut section = format!("## {}", column.name);
            for note in &column.notes {
                section.push_str("\n- ");
                section.push_str(&md_link(note));
            }
            section
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Markdown link to one note.
pub fn md_link(note: &NoteRecord) -> String {
    format!("[{}](:/{})", note.title, note.id)
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

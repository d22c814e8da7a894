//! SQLite-backed board store.
//!
//! # Responsibility
//! - Read note projections, notebooks and tags from a migrated connection.
//! - Interpret `MutationOp` paths as SQL writes.
//!
//! # Invariants
//! - Notebook `parent_id` and note `parent_id` use `""` for the universal root.
//! - Candidate listing order is `sort_order DESC, created_at DESC, id ASC`.
//! - Tag names are stored normalized and compared case-insensitively.

use super::{BoardStore, SearchFilter, SearchQuery, StoreError, StoreResult};
use crate::model::mutation::{MutationOp, MutationVerb};
use crate::model::note::{
    normalize_notebook_path, normalize_tag, ConfigNote, NoteId, NoteRecord, NotebookId, TagId,
    ROOT_NOTEBOOK_ID,
};
use log::debug;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use serde_json::Map;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

const NOTE_COLUMNS: &str = "n.id, n.title, n.parent_id, n.is_todo, n.todo_completed, \
     n.todo_due, n.sort_order, n.created_at";

/// Upper bound on notebook nesting when walking parent links.
const MAX_NOTEBOOK_DEPTH: i64 = 256;

/// Insert payload for one note.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoteDraft {
    pub title: String,
    pub body: String,
    /// Containing notebook; empty for the universal root.
    pub notebook_id: NotebookId,
    pub is_todo: bool,
    /// Completion timestamp in epoch ms; `0` means open.
    pub completed_ms: i64,
    pub due_ms: Option<i64>,
    pub order: f64,
    /// Creation time in epoch ms; `None` stamps the current time.
    pub created_ms: Option<i64>,
    /// Tag names; missing tags are created.
    pub tags: Vec<String>,
}

impl NoteDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Board store over a borrowed SQLite connection.
pub struct SqliteBoardStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteBoardStore<'conn> {
    /// Creates a store from a migrated connection.
    ///
    /// # Errors
    /// - `StoreError::MissingRequiredTable` when the schema is not in place.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        for table in ["notebooks", "notes", "tags", "note_tags"] {
            if !table_exists(conn, table)? {
                return Err(StoreError::MissingRequiredTable(table));
            }
        }
        Ok(Self { conn })
    }

    /// Inserts one note with its tags and returns the new id.
    pub fn insert_note(&self, draft: &NoteDraft) -> StoreResult<NoteId> {
        let note_id = new_id();
        let created_ms = draft.created_ms.unwrap_or_else(current_epoch_ms);
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO notes (
                id,
                title,
                body,
                parent_id,
                is_todo,
                todo_completed,
                todo_due,
                sort_order,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9);",
            params![
                note_id,
                draft.title,
                draft.body,
                draft.notebook_id,
                i64::from(draft.is_todo),
                draft.completed_ms,
                draft.due_ms,
                draft.order,
                created_ms,
            ],
        )?;
        for tag in &draft.tags {
            let tag_id = ensure_tag(&tx, tag)?;
            tx.execute(
                "INSERT OR IGNORE INTO note_tags (note_id, tag_id) VALUES (?1, ?2);",
                params![note_id, tag_id],
            )?;
        }
        tx.commit()?;
        debug!("event=note_insert module=store status=ok note_id={note_id}");
        Ok(note_id)
    }

    /// Lists notes whose body holds a fenced board configuration.
    pub fn list_board_notes(&self) -> StoreResult<Vec<ConfigNote>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, body, parent_id
             FROM notes
             WHERE instr(body, '```kanban') > 0
             ORDER BY title COLLATE NOCASE ASC, id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut notes = Vec::new();
        while let Some(row) = rows.next()? {
            notes.push(parse_config_note_row(row)?);
        }
        Ok(notes)
    }
}

impl BoardStore for SqliteBoardStore<'_> {
    fn get_note(&self, note_id: &str) -> StoreResult<Option<NoteRecord>> {
        let sql = format!("SELECT {NOTE_COLUMNS} FROM notes n WHERE n.id = ?1;");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([note_id])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_note_row(self.conn, row)?)),
            None => Ok(None),
        }
    }

    fn get_config_note(&self, note_id: &str) -> StoreResult<Option<ConfigNote>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, title, body, parent_id FROM notes WHERE id = ?1;")?;
        let mut rows = stmt.query([note_id])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_config_note_row(row)?)),
            None => Ok(None),
        }
    }

    fn search_notes(&self, query: &SearchQuery) -> StoreResult<Vec<NoteRecord>> {
        let mut sql = format!("SELECT {NOTE_COLUMNS} FROM notes n WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        for group in &query.groups {
            let clauses: Vec<String> = group
                .iter()
                .map(|filter| filter_clause(filter, &mut bind_values))
                .collect();
            sql.push_str(" AND (");
            sql.push_str(&clauses.join(" OR "));
            sql.push(')');
        }
        sql.push_str(" ORDER BY n.sort_order DESC, n.created_at DESC, n.id ASC;");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut notes = Vec::new();
        while let Some(row) = rows.next()? {
            notes.push(parse_note_row(self.conn, row)?);
        }
        debug!(
            "event=store_search module=store status=ok groups={} results={}",
            query.groups.len(),
            notes.len()
        );
        Ok(notes)
    }

    fn update_note_body(&self, note_id: &str, body: &str) -> StoreResult<()> {
        let changed = self.conn.execute(
            "UPDATE notes
             SET body = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![note_id, body],
        )?;
        if changed == 0 {
            return Err(StoreError::NoteNotFound(note_id.to_string()));
        }
        Ok(())
    }

    fn tag_id(&self, name: &str) -> StoreResult<Option<TagId>> {
        let Some(name) = normalize_tag(name) else {
            return Ok(None);
        };
        find_tag(self.conn, &name)
    }

    fn create_tag(&self, name: &str) -> StoreResult<TagId> {
        ensure_tag(self.conn, name)
    }

    fn list_tags(&self) -> StoreResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM tags ORDER BY name COLLATE NOCASE ASC;")?;
        let mut rows = stmt.query([])?;
        let mut tags = Vec::new();
        while let Some(row) = rows.next()? {
            let value: String = row.get(0)?;
            tags.push(value);
        }
        Ok(tags)
    }

    fn resolve_notebook_path(&self, path: &str) -> StoreResult<Option<NotebookId>> {
        let path = normalize_notebook_path(path);
        let mut current = ROOT_NOTEBOOK_ID.to_string();
        if path.is_empty() {
            return Ok(Some(current));
        }
        for segment in path.split('/') {
            match find_child_notebook(self.conn, &current, segment)? {
                Some(child) => current = child,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    fn create_notebook_path(&self, path: &str) -> StoreResult<NotebookId> {
        let path = normalize_notebook_path(path);
        let mut current = ROOT_NOTEBOOK_ID.to_string();
        if path.is_empty() {
            return Ok(current);
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        for segment in path.split('/') {
            current = match find_child_notebook(&tx, &current, segment)? {
                Some(child) => child,
                None => {
                    let child = new_id();
                    tx.execute(
                        "INSERT INTO notebooks (id, title, parent_id, created_at)
                         VALUES (?1, ?2, ?3, (strftime('%s', 'now') * 1000));",
                        params![child, segment, current],
                    )?;
                    child
                }
            };
        }
        tx.commit()?;
        debug!("event=notebook_path_ensure module=store status=ok path={path}");
        Ok(current)
    }

    fn notebook_path(&self, notebook_id: &str) -> StoreResult<Option<String>> {
        if notebook_id == ROOT_NOTEBOOK_ID {
            return Ok(Some(String::new()));
        }
        let mut stmt = self.conn.prepare(
            "WITH RECURSIVE chain(id, title, parent_id, depth) AS (
                SELECT id, title, parent_id, 0
                FROM notebooks
                WHERE id = ?1
                UNION ALL
                SELECT parent.id, parent.title, parent.parent_id, chain.depth + 1
                FROM notebooks parent
                INNER JOIN chain ON parent.id = chain.parent_id
                WHERE chain.depth < ?2
            )
            SELECT title FROM chain ORDER BY depth DESC;",
        )?;
        let mut rows = stmt.query(params![notebook_id, MAX_NOTEBOOK_DEPTH])?;
        let mut segments = Vec::new();
        while let Some(row) = rows.next()? {
            let title: String = row.get(0)?;
            segments.push(title);
        }
        if segments.is_empty() {
            return Ok(None);
        }
        Ok(Some(segments.join("/")))
    }

    fn descendant_notebooks(&self, notebook_id: &str) -> StoreResult<Vec<NotebookId>> {
        let mut stmt = self.conn.prepare(
            "WITH RECURSIVE subtree(id) AS (
                SELECT id
                FROM notebooks
                WHERE parent_id = ?1
                UNION
                SELECT child.id
                FROM notebooks child
                INNER JOIN subtree parent ON child.parent_id = parent.id
            )
            SELECT id FROM subtree ORDER BY id ASC;",
        )?;
        let mut rows = stmt.query([notebook_id])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            ids.push(row.get(0)?);
        }
        Ok(ids)
    }

    fn apply(&self, op: &MutationOp) -> StoreResult<()> {
        apply_op(self.conn, op)
    }

    fn apply_all(&self, ops: &[MutationOp]) -> StoreResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        for op in ops {
            apply_op(&tx, op)?;
        }
        tx.commit()?;
        Ok(())
    }
}

fn apply_op(conn: &Connection, op: &MutationOp) -> StoreResult<()> {
    let path: Vec<&str> = op.path.iter().map(String::as_str).collect();
    match (op.verb, path.as_slice()) {
        (MutationVerb::Create, ["tags", tag_id, "notes"]) => {
            let note_id = op
                .body
                .as_ref()
                .and_then(|body| body.get("id"))
                .and_then(|id| id.as_str())
                .ok_or_else(|| unsupported(op, "missing note id in body"))?;
            attach_tag(conn, tag_id, note_id)?;
        }
        (MutationVerb::Delete, ["tags", tag_id, "notes", note_id]) => {
            conn.execute(
                "DELETE FROM note_tags WHERE note_id = ?1 AND tag_id = ?2;",
                params![note_id, tag_id],
            )?;
        }
        (MutationVerb::Update, ["notes", note_id]) => {
            let fields = op
                .body
                .as_ref()
                .and_then(|body| body.as_object())
                .ok_or_else(|| unsupported(op, "update body must be an object"))?;
            update_note_fields(conn, op, note_id, fields)?;
        }
        _ => return Err(unsupported(op, "unknown path")),
    }
    debug!(
        "event=store_apply module=store status=ok verb={:?} path={}",
        op.verb,
        op.path.join("/")
    );
    Ok(())
}

fn filter_clause(filter: &SearchFilter, bind_values: &mut Vec<Value>) -> String {
    match filter {
        SearchFilter::Tag(name) => {
            bind_values.push(Value::Text(name.clone()));
            "EXISTS (
                SELECT 1
                FROM note_tags nt
                INNER JOIN tags t ON t.id = nt.tag_id
                WHERE nt.note_id = n.id
                  AND t.name = ? COLLATE NOCASE
            )"
            .to_string()
        }
        SearchFilter::Notebooks(ids) if ids.is_empty() => "0".to_string(),
        SearchFilter::Notebooks(ids) => {
            bind_values.extend(ids.iter().cloned().map(Value::Text));
            let placeholders = vec!["?"; ids.len()].join(", ");
            format!("n.parent_id IN ({placeholders})")
        }
        SearchFilter::Completed(flag) => {
            bind_values.push(Value::Integer(i64::from(*flag)));
            "(n.is_todo = 1 AND (n.todo_completed > 0) = ?)".to_string()
        }
        SearchFilter::ExcludeNote(note_id) => {
            bind_values.push(Value::Text(note_id.clone()));
            "n.id <> ?".to_string()
        }
    }
}

fn update_note_fields(
    conn: &Connection,
    op: &MutationOp,
    note_id: &str,
    fields: &Map<String, serde_json::Value>,
) -> StoreResult<()> {
    let mut assignments = Vec::with_capacity(fields.len() + 1);
    let mut bind_values: Vec<Value> = Vec::with_capacity(fields.len() + 1);

    for (key, value) in fields {
        let (column, bound) = match key.as_str() {
            "parent_id" => ("parent_id", value.as_str().map(|v| Value::Text(v.to_string()))),
            "title" => ("title", value.as_str().map(|v| Value::Text(v.to_string()))),
            "body" => ("body", value.as_str().map(|v| Value::Text(v.to_string()))),
            "todo_completed" => ("todo_completed", value.as_i64().map(Value::Integer)),
            "is_todo" => (
                "is_todo",
                value.as_bool().map(|flag| Value::Integer(i64::from(flag))),
            ),
            "order" => ("sort_order", value.as_f64().map(Value::Real)),
            other => return Err(unsupported(op, &format!("unknown note field `{other}`"))),
        };
        let bound = bound.ok_or_else(|| unsupported(op, &format!("bad value for `{key}`")))?;
        bind_values.push(bound);
        assignments.push(format!("{column} = ?{}", bind_values.len()));
    }
    if assignments.is_empty() {
        return Err(unsupported(op, "empty update"));
    }

    bind_values.push(Value::Text(note_id.to_string()));
    let sql = format!(
        "UPDATE notes SET {}, updated_at = (strftime('%s', 'now') * 1000) WHERE id = ?{};",
        assignments.join(", "),
        bind_values.len()
    );
    let changed = conn.execute(&sql, params_from_iter(bind_values))?;
    if changed == 0 {
        return Err(StoreError::NoteNotFound(note_id.to_string()));
    }
    Ok(())
}

fn attach_tag(conn: &Connection, tag_id: &str, note_id: &str) -> StoreResult<()> {
    if !row_exists(conn, "SELECT EXISTS(SELECT 1 FROM tags WHERE id = ?1);", tag_id)? {
        return Err(StoreError::TagNotFound(tag_id.to_string()));
    }
    if !row_exists(conn, "SELECT EXISTS(SELECT 1 FROM notes WHERE id = ?1);", note_id)? {
        return Err(StoreError::NoteNotFound(note_id.to_string()));
    }
    conn.execute(
        "INSERT OR IGNORE INTO note_tags (note_id, tag_id) VALUES (?1, ?2);",
        params![note_id, tag_id],
    )?;
    Ok(())
}

fn ensure_tag(conn: &Connection, raw_name: &str) -> StoreResult<TagId> {
    let name = normalize_tag(raw_name)
        .ok_or_else(|| StoreError::InvalidData("tag name must not be blank".to_string()))?;
    if let Some(tag_id) = find_tag(conn, &name)? {
        return Ok(tag_id);
    }
    let tag_id = new_id();
    conn.execute(
        "INSERT INTO tags (id, name) VALUES (?1, ?2);",
        params![tag_id, name],
    )?;
    Ok(tag_id)
}

fn find_tag(conn: &Connection, name: &str) -> StoreResult<Option<TagId>> {
    let tag_id = conn
        .query_row(
            "SELECT id FROM tags WHERE name = ?1 COLLATE NOCASE;",
            [name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(tag_id)
}

fn find_child_notebook(
    conn: &Connection,
    parent_id: &str,
    title: &str,
) -> StoreResult<Option<NotebookId>> {
    let notebook_id = conn
        .query_row(
            "SELECT id FROM notebooks WHERE parent_id = ?1 AND title = ?2;",
            params![parent_id, title],
            |row| row.get(0),
        )
        .optional()?;
    Ok(notebook_id)
}

fn parse_note_row(conn: &Connection, row: &Row<'_>) -> StoreResult<NoteRecord> {
    let id: String = row.get(0)?;
    let is_todo: i64 = row.get(3)?;
    let completed: i64 = row.get(4)?;
    let is_todo = match is_todo {
        0 => false,
        1 => true,
        other => {
            return Err(StoreError::InvalidData(format!(
                "invalid is_todo value `{other}` for note {id}"
            )))
        }
    };
    let tags = load_tags_for_note(conn, &id)?;
    Ok(NoteRecord {
        title: row.get(1)?,
        notebook_id: row.get(2)?,
        is_todo,
        is_completed: completed > 0,
        due_ms: row.get(5)?,
        order: row.get(6)?,
        created_ms: row.get(7)?,
        tags,
        id,
    })
}

fn parse_config_note_row(row: &Row<'_>) -> StoreResult<ConfigNote> {
    Ok(ConfigNote {
        id: row.get(0)?,
        title: row.get(1)?,
        body: row.get(2)?,
        notebook_id: row.get(3)?,
    })
}

fn load_tags_for_note(conn: &Connection, note_id: &str) -> StoreResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT t.name
         FROM note_tags nt
         INNER JOIN tags t ON t.id = nt.tag_id
         WHERE nt.note_id = ?1
         ORDER BY t.name COLLATE NOCASE ASC;",
    )?;
    let mut rows = stmt.query([note_id])?;
    let mut tags = Vec::new();
    while let Some(row) = rows.next()? {
        let value: String = row.get(0)?;
        tags.push(value.to_lowercase());
    }
    Ok(tags)
}

fn row_exists(conn: &Connection, sql: &str, id: &str) -> StoreResult<bool> {
    let exists: i64 = conn.query_row(sql, [id], |row| row.get(0))?;
    Ok(exists == 1)
}

fn table_exists(conn: &Connection, table: &str) -> StoreResult<bool> {
    row_exists(
        conn,
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1);",
        table,
    )
}

fn unsupported(op: &MutationOp, reason: &str) -> StoreError {
    StoreError::UnsupportedMutation(format!(
        "{:?} {}: {reason}",
        op.verb,
        op.path.join("/")
    ))
}

fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn current_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::{NoteDraft, SqliteBoardStore};
    use crate::db::open_db_in_memory;
    use crate::model::mutation::MutationOp;
    use crate::store::{BoardStore, SearchFilter, SearchQuery, StoreError};
    use rusqlite::Connection;

    #[test]
    fn try_new_rejects_unmigrated_connection() {
        let conn = Connection::open_in_memory().unwrap();
        let err = SqliteBoardStore::try_new(&conn).err().unwrap();
        assert!(matches!(err, StoreError::MissingRequiredTable("notebooks")));
    }

    #[test]
    fn notebook_paths_resolve_create_and_render() {
        let conn = open_db_in_memory().unwrap();
        let store = SqliteBoardStore::try_new(&conn).unwrap();

        assert_eq!(store.resolve_notebook_path("/").unwrap(), Some(String::new()));
        assert_eq!(store.resolve_notebook_path("a/b").unwrap(), None);

        let b = store.create_notebook_path("/a/b/").unwrap();
        assert_eq!(store.create_notebook_path("a/b").unwrap(), b);
        assert_eq!(store.resolve_notebook_path("a/b").unwrap(), Some(b.clone()));
        assert_eq!(store.notebook_path(&b).unwrap(), Some("a/b".to_string()));

        let a = store.resolve_notebook_path("a").unwrap().unwrap();
        assert_eq!(store.descendant_notebooks(&a).unwrap(), vec![b]);
    }

    #[test]
    fn unknown_mutation_path_is_rejected() {
        let conn = open_db_in_memory().unwrap();
        let store = SqliteBoardStore::try_new(&conn).unwrap();
        let id = store.insert_note(&NoteDraft::new("n")).unwrap();
        let mut op = MutationOp::set_order(&id, 1.0);
        op.path = vec!["folders".to_string(), id];
        assert!(matches!(
            store.apply(&op),
            Err(StoreError::UnsupportedMutation(_))
        ));
    }

    #[test]
    fn empty_notebook_group_matches_nothing() {
        let conn = open_db_in_memory().unwrap();
        let store = SqliteBoardStore::try_new(&conn).unwrap();
        store.insert_note(&NoteDraft::new("n")).unwrap();
        let mut query = SearchQuery::default();
        query.require_any(vec![SearchFilter::Notebooks(Vec::new())]);
        assert!(store.search_notes(&query).unwrap().is_empty());
        assert_eq!(store.search_notes(&SearchQuery::default()).unwrap().len(), 1);
    }
}

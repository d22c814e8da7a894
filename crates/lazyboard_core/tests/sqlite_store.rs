use lazyboard_core::db::open_db_in_memory;
use lazyboard_core::model::mutation::MutationOp;
use lazyboard_core::store::{BoardStore, SearchFilter, SearchQuery, StoreError};
use lazyboard_core::{NoteDraft, SqliteBoardStore};
use serde_json::json;

fn todo(store: &SqliteBoardStore<'_>, title: &str, notebook: &str, tags: &[&str]) -> String {
    let mut draft = NoteDraft::new(title);
    draft.notebook_id = store.create_notebook_path(notebook).unwrap();
    draft.tags = tags.iter().map(|tag| tag.to_string()).collect();
    draft.is_todo = true;
    store.insert_note(&draft).unwrap()
}

fn ids(notes: &[lazyboard_core::NoteRecord]) -> Vec<&str> {
    notes.iter().map(|note| note.id.as_str()).collect()
}

#[test]
fn tags_are_normalized_and_created_once() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteBoardStore::try_new(&conn).unwrap();

    let first = store.create_tag("  Ready ").unwrap();
    let second = store.create_tag("ready").unwrap();
    assert_eq!(first, second);
    assert_eq!(store.tag_id("READY").unwrap(), Some(first));
    assert_eq!(store.tag_id("missing").unwrap(), None);
    assert_eq!(store.list_tags().unwrap(), vec!["ready"]);
    assert!(matches!(store.create_tag("   "), Err(StoreError::InvalidData(_))));

    let note = todo(&store, "n", "", &["Ready", "ready", "Other"]);
    assert_eq!(store.get_note(&note).unwrap().unwrap().tags, vec!["other", "ready"]);
}

#[test]
fn search_groups_are_anded_and_filters_ored() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteBoardStore::try_new(&conn).unwrap();
    let a = todo(&store, "a", "work", &["task"]);
    let b = todo(&store, "b", "work/sub", &["task", "ready"]);
    let c = todo(&store, "c", "home", &["task"]);
    let d = todo(&store, "d", "work", &[]);

    let work = store.resolve_notebook_path("work").unwrap().unwrap();
    let sub = store.resolve_notebook_path("work/sub").unwrap().unwrap();

    let mut query = SearchQuery::default();
    query.require_any(vec![SearchFilter::Tag("TASK".to_string())]);
    query.require_any(vec![SearchFilter::Notebooks(vec![work, sub])]);
    let mut found = ids(&store.search_notes(&query).unwrap())
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    found.sort();
    let mut expected = vec![a.clone(), b.clone()];
    expected.sort();
    assert_eq!(found, expected);

    let mut query = SearchQuery::default();
    query.require_any(vec![
        SearchFilter::Tag("ready".to_string()),
        SearchFilter::ExcludeNote(a.clone()),
    ]);
    query.require_any(vec![SearchFilter::ExcludeNote(d.clone())]);
    let mut found = ids(&store.search_notes(&query).unwrap())
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    found.sort();
    let mut expected = vec![b, c];
    expected.sort();
    assert_eq!(found, expected);
}

#[test]
fn search_orders_by_manual_order_then_newest() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteBoardStore::try_new(&conn).unwrap();
    let insert = |title: &str, order: f64, created_ms: i64| {
        let mut draft = NoteDraft::new(title);
        draft.order = order;
        draft.created_ms = Some(created_ms);
        store.insert_note(&draft).unwrap()
    };
    let old = insert("old", 1.0, 10);
    let new = insert("new", 1.0, 20);
    let top = insert("top", 2.0, 5);

    let notes = store.search_notes(&SearchQuery::default()).unwrap();
    assert_eq!(ids(&notes), vec![top.as_str(), new.as_str(), old.as_str()]);
}

#[test]
fn completed_filter_only_matches_todos() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteBoardStore::try_new(&conn).unwrap();
    let open = todo(&store, "open", "", &[]);
    let done = todo(&store, "done", "", &[]);
    let plain = store.insert_note(&NoteDraft::new("plain")).unwrap();
    store
        .apply(&MutationOp::set_todo_completed(&done, 1_700_000_000_000))
        .unwrap();

    let query = |flag: bool| {
        let mut query = SearchQuery::default();
        query.require_any(vec![SearchFilter::Completed(flag)]);
        query
    };
    assert_eq!(ids(&store.search_notes(&query(true)).unwrap()), vec![done.as_str()]);
    assert_eq!(ids(&store.search_notes(&query(false)).unwrap()), vec![open.as_str()]);
    assert!(!store.get_note(&plain).unwrap().unwrap().is_todo);
}

#[test]
fn mutations_update_links_and_fields() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteBoardStore::try_new(&conn).unwrap();
    let note = todo(&store, "n", "", &[]);
    let tag = store.create_tag("ready").unwrap();
    let target = store.create_notebook_path("projects/active").unwrap();

    store.apply(&MutationOp::attach_tag(&tag, &note)).unwrap();
    store.apply(&MutationOp::attach_tag(&tag, &note)).unwrap();
    store.apply(&MutationOp::set_notebook(&note, &target)).unwrap();
    store.apply(&MutationOp::set_order(&note, -2.5)).unwrap();
    store.apply(&MutationOp::set_todo_completed(&note, 99)).unwrap();

    let record = store.get_note(&note).unwrap().unwrap();
    assert_eq!(record.tags, vec!["ready"]);
    assert_eq!(record.notebook_id, target);
    assert_eq!(record.order, -2.5);
    assert!(record.is_completed);

    store.apply(&MutationOp::detach_tag(&tag, &note)).unwrap();
    store.apply(&MutationOp::set_todo_completed(&note, 0)).unwrap();
    let record = store.get_note(&note).unwrap().unwrap();
    assert!(record.tags.is_empty());
    assert!(!record.is_completed);
}

#[test]
fn invalid_mutations_are_rejected() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteBoardStore::try_new(&conn).unwrap();
    let note = todo(&store, "n", "", &[]);
    let tag = store.create_tag("ready").unwrap();

    assert!(matches!(
        store.apply(&MutationOp::attach_tag("no-such-tag", &note)),
        Err(StoreError::TagNotFound(_))
    ));
    assert!(matches!(
        store.apply(&MutationOp::attach_tag(&tag, "no-such-note")),
        Err(StoreError::NoteNotFound(_))
    ));
    assert!(matches!(
        store.apply(&MutationOp::set_order("no-such-note", 1.0)),
        Err(StoreError::NoteNotFound(_))
    ));
    assert!(matches!(
        store.apply(&MutationOp::update_note(&note, json!({ "color": "red" }))),
        Err(StoreError::UnsupportedMutation(_))
    ));
    assert!(matches!(
        store.apply(&MutationOp::update_note(&note, json!({ "order": "high" }))),
        Err(StoreError::UnsupportedMutation(_))
    ));
}

#[test]
fn board_notes_are_listed_and_bodies_updated() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteBoardStore::try_new(&conn).unwrap();
    let mut draft = NoteDraft::new("Board");
    draft.body = "```kanban\ncolumns:\n  - name: A\n```".to_string();
    let board = store.insert_note(&draft).unwrap();
    store.insert_note(&NoteDraft::new("plain")).unwrap();

    let boards = store.list_board_notes().unwrap();
    assert_eq!(boards.len(), 1);
    assert_eq!(boards[0].id, board);

    store.update_note_body(&board, "changed").unwrap();
    assert_eq!(store.get_config_note(&board).unwrap().unwrap().body, "changed");
    assert!(store.list_board_notes().unwrap().is_empty());
    assert!(matches!(
        store.update_note_body("missing", "x"),
        Err(StoreError::NoteNotFound(_))
    ));
}

#[test]
fn batch_apply_rolls_back_on_failure() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteBoardStore::try_new(&conn).unwrap();
    let note = todo(&store, "n", "", &[]);
    let tag = store.create_tag("ready").unwrap();
    let target = store.create_notebook_path("elsewhere").unwrap();

    let err = store
        .apply_all(&[
            MutationOp::attach_tag(&tag, &note),
            MutationOp::set_notebook(&note, &target),
            MutationOp::set_order("gone", 3.0),
        ])
        .unwrap_err();
    assert!(matches!(err, StoreError::NoteNotFound(id) if id == "gone"));

    let record = store.get_note(&note).unwrap().unwrap();
    assert!(record.tags.is_empty());
    assert_eq!(record.notebook_id, "");

    store
        .apply_all(&[
            MutationOp::attach_tag(&tag, &note),
            MutationOp::set_order(&note, 3.0),
        ])
        .unwrap();
    let record = store.get_note(&note).unwrap().unwrap();
    assert_eq!(record.tags, vec!["ready"]);
    assert_eq!(record.order, 3.0);
}

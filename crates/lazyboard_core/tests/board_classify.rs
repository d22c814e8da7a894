use lazyboard_core::board::{Board, BoardContext};
use lazyboard_core::config::{parse_config_block, ConfigError};
use lazyboard_core::db::open_db_in_memory;
use lazyboard_core::store::BoardStore;
use lazyboard_core::{BoardService, BoardServiceError, NoteDraft, NoteRecord, SqliteBoardStore};

const PARENT: &str = "test/nested test";
const CONFIG: &str = "
columns:
  -
    backlog: true
    name: Backlog
  -
    name: \"Ready for review\"
    tag: ready
  -
    name: Working
    notebookPath: working
  -
    completed: true
    tags:
       - done
       - completed
    name: Done
filters:
  rootNotebookPath: \"test/nested test\"
  tag: task
";

fn fenced(config: &str) -> String {
    format!("```kanban\n{config}\n```")
}

fn insert_board(store: &SqliteBoardStore<'_>, body: &str) -> String {
    let mut draft = NoteDraft::new("testname");
    draft.body = body.to_string();
    draft.notebook_id = store.create_notebook_path(PARENT).unwrap();
    store.insert_note(&draft).unwrap()
}

fn record(id: &str, notebook_id: &str, tags: &[&str]) -> NoteRecord {
    let mut note = NoteRecord::new(id, notebook_id);
    note.tags = tags.iter().map(|tag| tag.to_string()).collect();
    note
}

#[test]
fn missing_or_invalid_config_block_opens_no_board() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteBoardStore::try_new(&conn).unwrap();
    let service = BoardService::new(&store);

    let plain = insert_board(&store, "invalid config");
    assert!(matches!(
        service.open_board(&plain),
        Err(BoardServiceError::MissingConfigBlock(_))
    ));

    let invalid = insert_board(&store, &fenced("notakanbanboard: true"));
    assert!(matches!(
        service.open_board(&invalid),
        Err(BoardServiceError::Config(ConfigError::MissingColumns))
    ));
    let message = service.check_config(&invalid).unwrap().unwrap();
    assert_eq!(message.id, "configError");
    assert_eq!(message.title, "There are no columns defined!");
}

#[test]
fn opened_board_carries_note_identity_and_columns() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteBoardStore::try_new(&conn).unwrap();
    let board_id = insert_board(&store, &fenced(CONFIG));

    let opened = BoardService::new(&store).open_board(&board_id).unwrap();
    let board = &opened.board;
    assert_eq!(board.config_note_id(), board_id);
    assert_eq!(board.board_name(), "testname");
    assert_eq!(
        board.column_names(),
        ["Backlog", "Ready for review", "Working", "Done"]
    );
    assert_eq!(board.backlog_column().map(|c| c.name()), Some("Backlog"));
    let hidden: Vec<&str> = board.hidden_tags().iter().map(String::as_str).collect();
    assert_eq!(hidden, vec!["completed", "done", "ready", "task"]);
}

#[test]
fn classification_follows_base_rules_then_first_matching_column() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteBoardStore::try_new(&conn).unwrap();
    let board_id = insert_board(&store, &fenced(CONFIG));
    let board = BoardService::new(&store).open_board(&board_id).unwrap().board;

    let parent = store.resolve_notebook_path(PARENT).unwrap().unwrap();
    let working = store
        .resolve_notebook_path(&format!("{PARENT}/working"))
        .unwrap()
        .unwrap();
    let child1 = store
        .create_notebook_path(&format!("{PARENT}/child1"))
        .unwrap();
    let elsewhere = store.create_notebook_path("elsewhere").unwrap();

    assert_eq!(board.classify(&record("id", &elsewhere, &["task"])), None);
    assert_eq!(board.classify(&record("id", &parent, &[])), None);
    assert_eq!(board.classify(&record(&board_id, &parent, &["task"])), None);

    assert_eq!(board.classify(&record("id", &parent, &["task"])), Some("Backlog"));
    let mut todo = record("id", &child1, &["task", "sometag"]);
    todo.is_todo = true;
    assert_eq!(board.classify(&todo), Some("Backlog"));

    assert_eq!(
        board.classify(&record("id", &parent, &["task", "ready"])),
        Some("Ready for review")
    );
    assert_eq!(
        board.classify(&record("id", &parent, &["task", "done"])),
        Some("Done")
    );
    assert_eq!(
        board.classify(&record("id", &child1, &["task", "completed"])),
        Some("Done")
    );
    assert_eq!(
        board.classify(&record("id", &working, &["task"])),
        Some("Working")
    );

    let mut completed = record("id", &parent, &["task"]);
    completed.is_todo = true;
    completed.is_completed = true;
    assert_eq!(board.classify(&completed), Some("Done"));

    let both = record("id", &working, &["task", "ready", "done"]);
    assert_eq!(board.classify(&both), Some("Ready for review"));
    assert_eq!(board.classify(&both), board.classify(&both));
}

#[test]
fn notebook_rule_covers_nested_notebooks_created_before_compile() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteBoardStore::try_new(&conn).unwrap();
    let deep = store
        .create_notebook_path(&format!("{PARENT}/working/deep/deeper"))
        .unwrap();
    let board_id = insert_board(&store, &fenced(CONFIG));
    let board = BoardService::new(&store).open_board(&board_id).unwrap().board;

    assert_eq!(board.classify(&record("id", &deep, &["task"])), Some("Working"));
}

#[test]
fn recompiling_reuses_existing_tags_and_notebooks() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteBoardStore::try_new(&conn).unwrap();
    let board_id = insert_board(&store, &fenced(CONFIG));
    let service = BoardService::new(&store);

    service.open_board(&board_id).unwrap();
    let tags = store.list_tags().unwrap();
    let working = store.resolve_notebook_path(&format!("{PARENT}/working")).unwrap();
    service.open_board(&board_id).unwrap();

    assert_eq!(tags, vec!["completed", "done", "ready", "task"]);
    assert_eq!(store.list_tags().unwrap(), tags);
    assert_eq!(
        store.resolve_notebook_path(&format!("{PARENT}/working")).unwrap(),
        working
    );
}

#[test]
fn missing_root_notebook_fails_compile() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteBoardStore::try_new(&conn).unwrap();
    let config = parse_config_block("columns:\n  - name: Todo\n    tag: todo\n").unwrap();
    let context = BoardContext::new("board", "Board", "no/such/notebook");

    assert!(Board::compile(&config, &context, &store).is_err());
}

#[test]
fn board_without_root_uses_config_note_notebook() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteBoardStore::try_new(&conn).unwrap();
    let board_id = insert_board(&store, &fenced("columns:\n  - name: Todo\n    tag: todo\n"));
    let board = BoardService::new(&store).open_board(&board_id).unwrap().board;

    let parent = store.resolve_notebook_path(PARENT).unwrap().unwrap();
    let outside = store.create_notebook_path("outside").unwrap();
    assert_eq!(board.classify(&record("n", &parent, &["todo"])), Some("Todo"));
    assert_eq!(board.classify(&record("n", &outside, &["todo"])), None);
    assert_eq!(board.classify(&record("n", &parent, &[])), None);
}

#[test]
fn universal_root_board_spans_every_notebook() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteBoardStore::try_new(&conn).unwrap();
    let board_id = insert_board(
        &store,
        &fenced("filters:\n  rootNotebookPath: /\ncolumns:\n  - name: Todo\n    tag: todo\n"),
    );
    let board = BoardService::new(&store).open_board(&board_id).unwrap().board;

    let anywhere = store.create_notebook_path("a/b/c").unwrap();
    assert_eq!(board.classify(&record("n", &anywhere, &["todo"])), Some("Todo"));
    assert_eq!(board.classify(&record("n", "", &["todo"])), Some("Todo"));
    assert_eq!(board.base_rules().len(), 1);
}

#[test]
fn board_state_lists_every_column_in_display_order() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteBoardStore::try_new(&conn).unwrap();
    let board_id = insert_board(&store, &fenced(CONFIG));
    let service = BoardService::new(&store);
    let board = service.open_board(&board_id).unwrap().board;
    let parent = store.resolve_notebook_path(PARENT).unwrap().unwrap();

    let insert = |title: &str, tags: &[&str], order: f64, created_ms: i64| {
        let mut draft = NoteDraft::new(title);
        draft.notebook_id = parent.clone();
        draft.tags = tags.iter().map(|tag| tag.to_string()).collect();
        draft.order = order;
        draft.created_ms = Some(created_ms);
        store.insert_note(&draft).unwrap()
    };
    let low = insert("low", &["task"], 0.0, 100);
    let high = insert("high", &["task"], 5.0, 50);
    let newer = insert("newer", &["task"], 0.0, 200);
    let ready = insert("ready", &["task", "ready"], 0.0, 10);
    insert("untagged", &[], 0.0, 10);

    let state = service.board_state(&board).unwrap();
    assert_eq!(state.board_name, "testname");
    let names: Vec<&str> = state.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Backlog", "Ready for review", "Working", "Done"]);

    let backlog: Vec<&str> = state.columns[0].notes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(backlog, vec![high.as_str(), newer.as_str(), low.as_str()]);
    assert_eq!(state.columns[1].notes[0].id, ready);
    assert!(state.columns[2].notes.is_empty());
    assert!(state.columns[3].notes.is_empty());
}

#[test]
fn dot_root_means_the_config_note_notebook() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteBoardStore::try_new(&conn).unwrap();
    let board_id = insert_board(
        &store,
        &fenced("filters:\n  rootNotebookPath: \".\"\ncolumns:\n  - name: Todo\n    tag: todo\n"),
    );
    let board = BoardService::new(&store).open_board(&board_id).unwrap().board;

    let parent = store.resolve_notebook_path(PARENT).unwrap().unwrap();
    let nested = store.create_notebook_path(&format!("{PARENT}/inner")).unwrap();
    let outside = store.create_notebook_path("outside").unwrap();
    assert_eq!(board.classify(&record("n", &parent, &["todo"])), Some("Todo"));
    assert_eq!(board.classify(&record("n", &nested, &["todo"])), Some("Todo"));
    assert_eq!(board.classify(&record("n", &outside, &["todo"])), None);
}

#[test]
fn tag_rules_ignore_tag_case_on_records() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteBoardStore::try_new(&conn).unwrap();
    let board_id = insert_board(&store, &fenced(CONFIG));
    let board = BoardService::new(&store).open_board(&board_id).unwrap().board;
    let parent = store.resolve_notebook_path(PARENT).unwrap().unwrap();

    let note = record("id", &parent, &["Task", " READY "]);
    assert!(note.has_tag("ready"));
    assert_eq!(board.classify(&note), Some("Ready for review"));
}

use crossterm::event::{KeyCode, KeyModifiers};
use sheetstack::config::AppConfig;
use sheetstack::AppEvent;
use tempfile::TempDir;

mod common;
use common::*;

const ID_VAL: &str = "id,val\n1,a\n2,b\n3,c\n";

#[test]
fn test_select_row_and_move_to_top() {
    let data = TempDir::new().unwrap();
    let path = write_file(data.path(), "t.csv", ID_VAL);
    let (_dir, mut app) = test_app(AppConfig::default());
    app.open(&path, None).unwrap();
    assert_eq!(head_name(&app), "t");

    // select row 2; `s` also steps down, so step back up onto it
    press(&mut app, "js");
    assert_eq!(cursor_row(&app), 2);
    press(&mut app, "k");
    press(&mut app, "gK");

    let head = app.head().unwrap();
    assert_eq!(
        cells(&head),
        vec![vec!["2", "b"], vec!["1", "a"], vec!["3", "c"]]
    );
    let sheet = head.borrow();
    assert_eq!(sheet.cursor_row_index, 0);
    assert!(sheet.is_selected(&sheet.rows[0]));
    assert!(!sheet.is_selected(&sheet.rows[1]));
    assert_eq!(sheet.n_selected(), 1);
    drop(sheet);

    press(&mut app, "gu");
    assert_eq!(head.borrow().n_selected(), 0);
}

#[test]
fn test_global_quit_empties_stack_and_exits() {
    let (_dir, mut app) = test_app(AppConfig::default());
    app.push_sheet(fields_sheet("a", &["k"], &[&["1"]]));
    app.push_sheet(fields_sheet("b", &["k"], &[&["1"]]));
    assert!(press(&mut app, "g").is_none());
    assert_eq!(app.prefix(), "g");
    assert!(matches!(press(&mut app, "q"), Some(AppEvent::Exit)));
    assert!(app.stack().is_empty());
}

#[test]
fn test_pop_last_sheet_exits() {
    let (_dir, mut app) = test_app(AppConfig::default());
    app.push_sheet(fields_sheet("a", &["k"], &[&["1"]]));
    assert!(matches!(press(&mut app, "q"), Some(AppEvent::Exit)));
}

#[test]
fn test_unbound_key_reports_and_clears_prefix() {
    let (_dir, mut app) = test_app(AppConfig::default());
    app.push_sheet(fields_sheet("a", &["k"], &[&["1"]]));
    press(&mut app, "gz");
    assert_eq!(last_status(&app), "no command for key \"z\" with prefixes \"g\"");
    assert_eq!(app.prefix(), "");
    assert_eq!(app.stack().len(), 1);
}

#[test]
fn test_failed_command_is_contained() {
    let (_dir, mut app) = test_app(AppConfig::default());
    app.push_sheet(fields_sheet("a", &["k"], &[&["1"]]));
    // an invalid regex fails the search command
    assert!(prompt(&mut app, "/", "(").is_none());
    assert_eq!(app.status_log().errors().count(), 1);
    let record = app.status_log().last_error().unwrap();
    assert_eq!(record.keys, "/");
    assert!(last_status(&app).starts_with("search this column forward for regex: "));

    // the error sheet shows it
    press(&mut app, "E");
    assert_eq!(head_name(&app), "last_error");
    press(&mut app, "q");
    assert_eq!(head_name(&app), "a");
}

#[test]
fn test_last_error_sheet_reloads_latest_error() {
    let (_dir, mut app) = test_app(AppConfig::default());
    app.push_sheet(fields_sheet("a", &["k"], &[&["1"]]));
    prompt(&mut app, "/", "(");
    let first = app.status_log().last_error().unwrap().summary.clone();
    press(&mut app, "E");
    assert_eq!(head_cells(&app)[0][0], format!("/: {first}"));

    prompt(&mut app, "/", "[");
    let second = app.status_log().last_error().unwrap().summary.clone();
    assert_ne!(first, second);
    ctrl(&mut app, 'r');
    assert_eq!(head_name(&app), "last_error");
    let shown = head_cells(&app);
    assert_eq!(shown[0][0], format!("/: {second}"));
    assert!(shown.iter().all(|r| !r[0].contains(&first)));
}

#[test]
fn test_debug_mode_crashes_on_failure() {
    let mut config = AppConfig::default();
    config.debug.enabled = true;
    let (_dir, mut app) = test_app(config);
    app.push_sheet(fields_sheet("a", &["k"], &[&["1"]]));
    match prompt(&mut app, "/", "(") {
        Some(AppEvent::Crash(msg)) => assert!(msg.contains("invalid regex")),
        other => panic!("expected a crash, got {other:?}"),
    }
}

#[test]
fn test_toggle_debug_at_runtime() {
    let (_dir, mut app) = test_app(AppConfig::default());
    app.push_sheet(fields_sheet("a", &["k"], &[&["1"]]));
    ctrl(&mut app, 'd');
    assert!(app.config().debug.enabled);
    assert_eq!(last_status(&app), "debug ON");
    ctrl(&mut app, 'd');
    assert!(!app.config().debug.enabled);
}

#[test]
fn test_prompt_cancel_reports_key() {
    let (_dir, mut app) = test_app(AppConfig::default());
    app.push_sheet(fields_sheet("a", &["k"], &[&["1"]]));
    press(&mut app, "g/");
    assert!(app.prompt().is_some());
    send(&mut app, KeyCode::Esc, KeyModifiers::NONE);
    assert!(app.prompt().is_none());
    assert_eq!(last_status(&app), "cancelled by ESC");
    assert_eq!(app.status_log().errors().count(), 0);
}

#[test]
fn test_edit_cell_and_readonly() {
    let (_dir, mut app) = test_app(AppConfig::default());
    app.push_sheet(fields_sheet("a", &["k", "v"], &[&["1", "x"]]));
    press(&mut app, "l");
    press(&mut app, "e");
    assert_eq!(app.prompt().unwrap().value(), "x");
    send(&mut app, KeyCode::Backspace, KeyModifiers::NONE);
    press(&mut app, "yz");
    enter(&mut app);
    assert_eq!(head_cells(&app), vec![vec!["1", "yz"]]);

    let mut config = AppConfig::default();
    config.behavior.readonly = true;
    let (_dir, mut app) = test_app(config);
    app.push_sheet(fields_sheet("a", &["k", "v"], &[&["1", "x"]]));
    press(&mut app, "e");
    assert!(app.prompt().is_none());
    assert_eq!(last_status(&app), "readonly mode");
}

#[test]
fn test_help_sheet_is_cached_per_sheet() {
    let (_dir, mut app) = test_app(AppConfig::default());
    app.push_sheet(fields_sheet("a", &["k"], &[&["1"]]));
    send(&mut app, KeyCode::F(1), KeyModifiers::NONE);
    let first = app.head().unwrap();
    assert_eq!(first.borrow().name, "a_help");
    press(&mut app, "q");
    send(&mut app, KeyCode::F(1), KeyModifiers::NONE);
    assert!(std::rc::Rc::ptr_eq(&first, &app.head().unwrap()));
}

#[test]
fn test_sheets_sheet_jump_and_join() {
    let (_dir, mut app) = test_app(AppConfig::default());
    app.push_sheet(fields_sheet("left", &["k", "a"], &[&["1", "x"], &["2", "y"]]));
    app.push_sheet(fields_sheet("right", &["k", "b"], &[&["2", "z"], &["3", "w"]]));
    press(&mut app, "S");
    assert_eq!(head_name(&app), "sheets");
    assert_eq!(head_cells(&app).len(), 2);

    // select both listed sheets, then inner join
    press(&mut app, "gs");
    press(&mut app, "&");
    assert_eq!(head_name(&app), "right&left");
    assert_eq!(head_cells(&app), vec![vec!["2", "z", "y"]]);
    assert_eq!(app.stack().len(), 3);

    // jump back to `left` via the sheets sheet
    press(&mut app, "S");
    press(&mut app, "jj");
    enter(&mut app);
    assert_eq!(head_name(&app), "left");
    assert_eq!(app.stack().len(), 3);
}

#[test]
fn test_swap_and_cycle() {
    let (_dir, mut app) = test_app(AppConfig::default());
    for name in ["c", "b", "a"] {
        app.push_sheet(fields_sheet(name, &["k"], &[&["1"]]));
    }
    ctrl(&mut app, '^');
    assert_eq!(head_name(&app), "b");
    send(&mut app, KeyCode::Tab, KeyModifiers::NONE);
    assert_eq!(head_name(&app), "a");
    send(&mut app, KeyCode::BackTab, KeyModifiers::NONE);
    assert_eq!(head_name(&app), "b");
}

#[test]
fn test_status_history_and_previous_status() {
    let (_dir, mut app) = test_app(AppConfig::default());
    app.push_sheet(fields_sheet("a", &["k"], &[&["1"]]));
    ctrl(&mut app, 'p');
    assert_eq!(last_status(&app), "no previous status");
    ctrl(&mut app, 'v');
    ctrl(&mut app, 'g');
    ctrl(&mut app, 'p');
    assert!(last_status(&app).starts_with("a: 1 rows"));
    // repeated presses keep showing the same message
    ctrl(&mut app, 'p');
    assert!(last_status(&app).starts_with("a: 1 rows"));
    press(&mut app, "g");
    ctrl(&mut app, 'p');
    assert_eq!(head_name(&app), "statuses");
    let statuses = head_cells(&app);
    assert!(statuses[0][0].starts_with("a: 1 rows"));
    assert!(statuses[3][0].starts_with("sheetstack "));
}

#[test]
fn test_open_prompt_and_dive_into_directory() {
    let data = TempDir::new().unwrap();
    write_file(data.path(), "t.csv", ID_VAL);
    let (_dir, mut app) = test_app(AppConfig::default());
    app.open(data.path(), None).unwrap();
    let listing = head_cells(&app);
    let row = listing.iter().position(|r| r[0] == "t.csv").unwrap();
    press(&mut app, &"j".repeat(row));
    enter(&mut app);
    assert_eq!(head_name(&app), "t");
    assert_eq!(head_cells(&app).len(), 3);

    press(&mut app, "q");
    let other = write_file(data.path(), "u.tsv", "k\tv\nx\ty\n");
    prompt(&mut app, "o", other.to_str().unwrap());
    assert_eq!(head_name(&app), "u");
    assert_eq!(head_cells(&app), vec![vec!["x", "y"]]);
}

#[test]
fn test_remote_source_is_reported() {
    let (_dir, mut app) = test_app(AppConfig::default());
    app.push_sheet(fields_sheet("a", &["k"], &[&["1"]]));
    prompt(&mut app, "o", "http://example.com/data.csv");
    assert_eq!(head_name(&app), "a");
    assert!(last_status(&app).contains("remote sources are not supported"));
}

#[test]
fn test_mouse_click_moves_cursor() {
    use crossterm::event::{MouseButton, MouseEvent, MouseEventKind};
    let (_dir, mut app) = test_app(AppConfig::default());
    app.push_sheet(fields_sheet("a", &["k"], &[&["1"], &["2"], &["3"]]));
    let click = |row| {
        AppEvent::Mouse(MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column: 0,
            row,
            modifiers: KeyModifiers::NONE,
        })
    };
    app.event(&click(3));
    assert_eq!(cursor_row(&app), 2);
    // below the last row: recorded, cursor unchanged
    app.event(&click(10));
    assert_eq!(cursor_row(&app), 2);
    assert_eq!(app.status_log().errors().count(), 1);
}

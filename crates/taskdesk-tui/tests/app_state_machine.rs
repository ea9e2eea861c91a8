//! State machine tests for the TUI App.
//!
//! Each test spawns the mock store on a separate thread (the App owns its own
//! tokio Runtime, so the server must live in another thread's Runtime), builds
//! an App over an HttpService and simulates key events.

use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::backend::TestBackend;
use ratatui::Terminal;
use taskdesk_core::task::{ChecklistItem, Status, StatusFilter};
use taskdesk_service::test_helpers::{spawn_test_server, MockStore};
use taskdesk_service::HttpService;
use taskdesk_tui::app::{App, Mode};
use taskdesk_views::open::LinkOpener;
use taskdesk_views::Session;

fn spawn_server() -> (String, Arc<MockStore>) {
    let (tx, rx) = std::sync::mpsc::sync_channel(1);
    std::thread::spawn(move || {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let server = spawn_test_server().await;
            tx.send((server.base_url.clone(), server.store.clone()))
                .unwrap();
            std::future::pending::<()>().await;
        });
    });
    rx.recv().unwrap()
}

#[derive(Clone, Default)]
struct RecordingOpener {
    opened: Arc<Mutex<Vec<String>>>,
}

impl LinkOpener for RecordingOpener {
    fn open(&self, url: &str) -> io::Result<()> {
        self.opened.lock().unwrap().push(url.to_string());
        Ok(())
    }
}

fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
}

fn char_key(c: char) -> KeyEvent {
    key(KeyCode::Char(c))
}

fn make_app() -> (App, Arc<MockStore>) {
    let (url, store) = spawn_server();
    let svc = Arc::new(HttpService::new(&url));
    let app = App::new(svc, Session::new()).unwrap();
    (app, store)
}

fn screen_text(app: &App) -> String {
    let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
    terminal.draw(|f| app.render(f)).unwrap();
    terminal
        .backend()
        .buffer()
        .content()
        .iter()
        .map(|c| c.symbol())
        .collect()
}

// ---- Task list ----

#[test]
fn app_starts_on_all_tasks() {
    let (app, store) = make_app();
    assert_eq!(app.mode(), Mode::TaskList);
    assert!(app.is_top_level());
    assert_eq!(app.filter(), StatusFilter::All);
    assert_eq!(app.task_list().cards().len(), 3);
    assert_eq!(store.list_queries(), vec![Some(String::new())]);
}

#[test]
fn tab_cycles_status_filter() {
    let (mut app, store) = make_app();
    app.handle_key(key(KeyCode::Tab));
    assert_eq!(app.filter(), StatusFilter::Only(Status::Pending));
    assert_eq!(app.task_list().cards().len(), 1);
    assert_eq!(app.task_list().cards()[0].id, "t1");

    app.handle_key(key(KeyCode::BackTab));
    assert_eq!(app.filter(), StatusFilter::All);
    assert_eq!(
        store.list_queries(),
        vec![
            Some(String::new()),
            Some("Pending".to_string()),
            Some(String::new())
        ]
    );
}

#[test]
fn digit_jumps_to_tab() {
    let (mut app, _store) = make_app();
    app.handle_key(char_key('4'));
    assert_eq!(app.filter(), StatusFilter::Only(Status::Completed));
    assert_eq!(app.task_list().selected_card().unwrap().id, "t3");
}

#[test]
fn failed_refresh_keeps_cards_and_shows_notice() {
    let (mut app, store) = make_app();
    store.set_fail_reads(true);
    app.handle_key(char_key('r'));
    assert_eq!(app.task_list().cards().len(), 3);
    assert!(screen_text(&app).contains("Could not load tasks"));
}

#[test]
fn list_render_shows_tabs_with_counts() {
    let (app, _store) = make_app();
    let text = screen_text(&app);
    assert!(text.contains("All 3"));
    assert!(text.contains("In Progress 1"));
    assert!(text.contains("Task t1"));
}

// ---- Task detail ----

#[test]
fn enter_opens_selected_task() {
    let (mut app, _store) = make_app();
    app.handle_key(char_key('j'));
    app.handle_key(key(KeyCode::Enter));
    assert_eq!(app.mode(), Mode::TaskDetail);
    assert!(!app.is_top_level());
    let snap = app.detail_snapshot().unwrap();
    assert_eq!(snap.task.unwrap().id, "t2");
}

#[test]
fn space_toggles_item_under_cursor() {
    let (mut app, store) = make_app();
    app.handle_key(key(KeyCode::Enter));
    app.handle_key(char_key(' '));

    // local flip is visible before the write settles
    let snap = app.detail_snapshot().unwrap();
    assert!(snap.checklist()[0].completed);

    assert!(app.flush_writes(Duration::from_secs(5)));
    let stored = store.task("t1").unwrap();
    assert_eq!(
        stored.checklist,
        vec![ChecklistItem::new("A", true), ChecklistItem::new("B", true)]
    );
    assert_eq!(app.detail_snapshot().unwrap().task.unwrap(), stored);
}

#[test]
fn cursor_selects_which_item_flips() {
    let (mut app, store) = make_app();
    app.handle_key(key(KeyCode::Enter));
    app.handle_key(char_key('j'));
    app.handle_key(char_key('x'));
    assert!(app.flush_writes(Duration::from_secs(5)));
    assert_eq!(
        store.writes(),
        vec![(
            "t1".to_string(),
            vec![ChecklistItem::new("A", false), ChecklistItem::new("B", false)]
        )]
    );
}

#[test]
fn failed_write_rolls_back_and_shows_notice() {
    let (mut app, store) = make_app();
    store.set_fail_writes(true);
    app.handle_key(key(KeyCode::Enter));
    app.handle_key(char_key(' '));
    assert!(app.flush_writes(Duration::from_secs(5)));

    let snap = app.detail_snapshot().unwrap();
    assert!(!snap.checklist()[0].completed);
    assert!(snap.notice.unwrap().contains("Could not update checklist"));
    assert!(screen_text(&app).contains("Could not update checklist"));
}

#[test]
fn escape_returns_to_list_and_refreshes_cards() {
    let (mut app, _store) = make_app();
    app.handle_key(key(KeyCode::Enter));
    app.handle_key(char_key(' '));
    assert!(app.flush_writes(Duration::from_secs(5)));

    app.handle_key(key(KeyCode::Esc));
    assert_eq!(app.mode(), Mode::TaskList);
    assert!(app.detail_snapshot().is_none());
    let t1 = app
        .task_list()
        .cards()
        .iter()
        .find(|c| c.id == "t1")
        .cloned()
        .unwrap();
    assert_eq!(t1.completed_todo_count, 2);
}

#[test]
fn q_in_detail_steps_back() {
    let (mut app, _store) = make_app();
    app.handle_key(key(KeyCode::Enter));
    app.handle_key(char_key('q'));
    assert_eq!(app.mode(), Mode::TaskList);
}

#[test]
fn o_opens_normalized_attachment() {
    let (url, _store) = spawn_server();
    let opener = RecordingOpener::default();
    let mut app = App::new(Arc::new(HttpService::new(&url)), Session::new())
        .unwrap()
        .with_opener(Box::new(opener.clone()));

    app.handle_key(key(KeyCode::Enter));
    app.handle_key(key(KeyCode::Tab));
    app.handle_key(char_key('o'));
    app.handle_key(char_key('j'));
    app.handle_key(key(KeyCode::Enter));

    assert_eq!(
        *opener.opened.lock().unwrap(),
        vec!["https://example.com/doc", "http://already.com"]
    );
    assert_eq!(app.status_message(), Some("Opened http://already.com"));
}

#[test]
fn help_overlay_returns_to_previous_screen() {
    let (mut app, _store) = make_app();
    app.handle_key(key(KeyCode::Enter));
    app.handle_key(char_key('?'));
    assert_eq!(app.mode(), Mode::Help);
    assert!(screen_text(&app).contains("toggle checklist item"));
    app.handle_key(char_key('x'));
    assert_eq!(app.mode(), Mode::TaskDetail);
}

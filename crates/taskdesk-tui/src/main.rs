use std::fs::{self, OpenOptions};
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use taskdesk_core::attachment::normalize_link;
use taskdesk_core::task::StatusFilter;
use taskdesk_core::user::{CreateUser, LoginRequest, RegisterUser, Role};
use taskdesk_service::{AuthService, HttpService};
use taskdesk_views::open::{LinkOpener, SystemOpener};
use taskdesk_views::{auth, Session, TaskDetailView, TaskListView};
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

use taskdesk_tui::app::App;
use taskdesk_tui::config::ClientConfig;

#[derive(Parser)]
#[command(name = "taskdesk", version, about = "Terminal client for the task manager")]
struct Cli {
    #[command(flatten)]
    config: ClientConfig,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Log in and save the session
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "TASKDESK_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the saved session
    Logout,
    /// Show the logged-in user
    Whoami,
    /// Create an account
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "TASKDESK_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long, default_value = "")]
        bio: String,
        #[arg(long, default_value = "")]
        profile_image_url: String,
        #[arg(long)]
        admin_invite_token: Option<String>,
    },
    /// Create a user (admin only)
    AddUser {
        #[arg(long)]
        name: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "TASKDESK_NEW_USER_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        admin: bool,
    },
    /// List tasks
    Tasks {
        /// All, Pending, "In Progress" or Completed
        #[arg(long, default_value = "All")]
        status: String,
    },
    /// Show one task with its checklist
    Show { id: String },
    /// Flip one checklist item and wait for the store
    Toggle { id: String, index: usize },
    /// Open an attachment link in the browser
    Open { link: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.config;

    let session = Session::restore(&config.credentials_path()).with_context(|| {
        format!(
            "failed to read credentials from {}",
            config.credentials_path().display()
        )
    })?;
    let service = Arc::new(config.build_service(&session));

    let Some(command) = cli.command else {
        init_file_logging(&config)?;
        return run_tui(service, session);
    };
    init_stderr_logging();

    let rt = Runtime::new()?;
    match command {
        Command::Login { email, password } => {
            let user = rt.block_on(auth::login(
                service.as_ref(),
                &session,
                &LoginRequest { email, password },
            ))?;
            println!("Logged in as {} ({})", user.name, user.role);
        }
        Command::Logout => {
            auth::logout(&session)?;
            println!("Logged out");
        }
        Command::Whoami => {
            let user = rt
                .block_on(service.get_profile())
                .context("not logged in or session expired")?;
            println!("{} <{}> {}", user.name, user.email, user.role);
        }
        Command::Register {
            name,
            username,
            email,
            password,
            bio,
            profile_image_url,
            admin_invite_token,
        } => {
            let input = RegisterUser {
                name,
                username,
                email,
                password,
                bio,
                profile_image_url,
                admin_invite_token,
            };
            let msg = rt.block_on(auth::register(service.as_ref(), &input))?;
            println!("{msg}");
        }
        Command::AddUser {
            name,
            username,
            email,
            password,
            admin,
        } => {
            if !session.is_admin() && config.token.is_none() {
                bail!("only admins can add users");
            }
            let input = CreateUser {
                name,
                username,
                email,
                password,
                role: if admin { Role::Admin } else { Role::Member },
            };
            let user = rt.block_on(service.create_user(&input))?;
            println!("Created {} ({})", user.email, user.role);
        }
        Command::Tasks { status } => {
            let filter = StatusFilter::parse_str(&status)?;
            rt.block_on(list_tasks(service, filter))?;
        }
        Command::Show { id } => rt.block_on(show_task(service, &id))?,
        Command::Toggle { id, index } => rt.block_on(toggle_item(service, &id, index))?,
        Command::Open { link } => {
            let url = normalize_link(&link);
            SystemOpener
                .open(&url)
                .with_context(|| format!("failed to open {url}"))?;
            println!("Opened {url}");
        }
    }
    Ok(())
}

fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();
}

fn init_file_logging(config: &ClientConfig) -> Result<()> {
    let path = config.log_path();
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create log directory {}", dir.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

async fn list_tasks(service: Arc<HttpService>, filter: StatusFilter) -> Result<()> {
    let view = TaskListView::new(service);
    view.load(filter).await?;
    let snap = view.snapshot();

    let tabs: Vec<String> = snap
        .tabs
        .iter()
        .map(|t| format!("{} {}", t.label(), t.count))
        .collect();
    println!("{}", tabs.join(" | "));
    for card in snap.cards() {
        println!(
            "{:<26} {:<12} {:<7} {:>3}/{:<3} {:<13} {}",
            card.id,
            card.status.as_str(),
            card.priority.as_str(),
            card.completed_todo_count,
            card.checklist_len,
            card.due_date,
            card.title,
        );
    }
    Ok(())
}

async fn show_task(service: Arc<HttpService>, id: &str) -> Result<()> {
    let view = TaskDetailView::new(service, id);
    view.load().await?;
    let Some(task) = view.snapshot().task else {
        bail!("task {id} not found");
    };
    println!("{} [{}] {}", task.title, task.status, task.priority);
    println!("Due: {}  Progress: {:.0}%", task.due_date_label(), task.progress);
    if !task.description.is_empty() {
        println!("\n{}\n", task.description);
    }
    for (i, item) in task.checklist.iter().enumerate() {
        let mark = if item.completed { "x" } else { " " };
        println!("{i:>3} [{mark}] {}", item.text);
    }
    for link in &task.attachments {
        println!("    {}", normalize_link(link));
    }
    Ok(())
}

async fn toggle_item(service: Arc<HttpService>, id: &str, index: usize) -> Result<()> {
    let view = TaskDetailView::new(service, id);
    view.load().await?;
    let Some(handle) = view.toggle_checklist_item(index) else {
        bail!("task {id} has no checklist item {index}");
    };
    handle
        .settled()
        .await
        .into_result()
        .context("checklist update failed")?;
    let snap = view.snapshot();
    if let Some(item) = snap.checklist().get(index) {
        let state = if item.completed { "done" } else { "open" };
        println!("{}: {state}", item.text);
    }
    Ok(())
}

fn run_tui(service: Arc<HttpService>, session: Session) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut terminal, service, session);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(ref e) = result {
        eprintln!("Error: {e}");
    }

    result
}

fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    service: Arc<HttpService>,
    session: Session,
) -> Result<()> {
    let mut app = App::new(service, session)?;

    loop {
        terminal.draw(|frame| app.render(frame))?;

        // Redraw on a short tick while checklist writes are in flight
        if app.needs_polling() && !event::poll(Duration::from_millis(250))? {
            continue;
        }
        if let Event::Key(key) = event::read()? {
            if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                break;
            }
            if key.code == KeyCode::Char('q') && app.is_top_level() {
                break;
            }
            app.handle_key(key);
        }
    }

    if !app.flush_writes(Duration::from_secs(5)) {
        tracing::warn!("exiting with checklist writes still in flight");
    }
    Ok(())
}

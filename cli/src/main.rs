//! `taskdesk`: terminal front end for the task service.
//!
//! Each invocation boots a session from the credential file, consults the
//! route gate for the command's view, runs the command, and re-checks the
//! gate if the session changed underneath it.

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use taskdesk::{
    ClientConfig, FileCredentialStore, Gate, GatewayError, HttpGateway, ImageUpload, LOGIN_PATH, NavLink, RestoreOutcome, Route,
    SessionController, SessionError, TaskDraft, TaskQuery, TaskSort, can_enter, can_enter_path, nav_links,
};
use tracing_subscriber::filter::LevelFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{}", .0.user_message())]
    Session(#[from] SessionError),
    #[error("client setup failed: {0}")]
    Gateway(#[from] GatewayError),
    #[error("not signed in; run `taskdesk login` first")]
    LoginRequired,
    #[error("{route} is not available to this session (redirected to {to})")]
    Redirected { route: &'static str, to: &'static str },
    #[error("failed to read {}: {source}", path.display())]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "taskdesk", about = "Task service client")]
struct Cli {
    #[arg(long, env = "TASKDESK_API_URL")]
    api_url: Option<String>,

    #[arg(long, env = "TASKDESK_CREDENTIALS")]
    credentials: Option<PathBuf>,

    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show session state and available navigation.
    Status,
    /// Check whether the current session may open a path.
    Open { path: String },
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "TASKDESK_PASSWORD")]
        password: String,
    },
    Signup {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "TASKDESK_PASSWORD")]
        password: String,
        /// Sign in right after the account is created.
        #[arg(long, default_value_t = false)]
        login: bool,
    },
    Logout,
    Profile,
    Task(TaskCommand),
    Admin(AdminCommand),
}

#[derive(Args, Debug)]
struct TaskCommand {
    #[command(subcommand)]
    command: TaskSubcommand,
}

#[derive(Subcommand, Debug)]
enum TaskSubcommand {
    List {
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long, default_value = "newest", value_parser = parse_sort)]
        sort: TaskSort,
    },
    Create {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        image: Option<PathBuf>,
    },
    Update {
        task_id: String,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        image: Option<PathBuf>,
        /// The task already has an image; keep it when `--image` is omitted.
        #[arg(long, default_value_t = false)]
        has_image: bool,
    },
    Delete {
        task_id: String,
    },
}

#[derive(Args, Debug)]
struct AdminCommand {
    #[command(subcommand)]
    command: AdminSubcommand,
}

#[derive(Subcommand, Debug)]
enum AdminSubcommand {
    Users,
    Block { user_id: String },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let level = if cli.verbose { LevelFilter::DEBUG } else { LevelFilter::WARN };
    tracing_subscriber::fmt().with_writer(std::io::stderr).with_max_level(level).init();

    let mut config = ClientConfig::from_env();
    if let Some(api_url) = &cli.api_url {
        config = config.with_api_url(api_url);
    }
    let credentials = cli.credentials.clone().unwrap_or_else(default_credentials_path);
    tracing::debug!(api_url = %config.api_url, credentials = %credentials.display(), "starting");

    let gateway = Arc::new(HttpGateway::new(&config)?);
    let store = Arc::new(FileCredentialStore::new(credentials));
    let controller = SessionController::new(store, gateway, &config);

    if let RestoreOutcome::Expired(err) = controller.restore_session().await {
        eprintln!("{}", err.user_message());
    }

    let route = required_route(&cli.command);
    if let Some(route) = route {
        check_gate(route, &controller)?;
    }

    let mut session_rx = controller.subscribe();
    let result = run(&controller, &config, cli.command).await;

    if let Some(route) = route {
        if session_rx.has_changed().unwrap_or(false) {
            let session = session_rx.borrow_and_update();
            if let (false, Gate::RedirectTo(to)) = (session.is_authenticated(), can_enter(route, &session)) {
                eprintln!("signed out; {} now redirects to {to}", route.path());
            }
        }
    }
    result
}

async fn run(controller: &SessionController, config: &ClientConfig, command: Command) -> Result<(), CliError> {
    match command {
        Command::Status => {
            print_status(controller);
            Ok(())
        }
        Command::Open { path } => {
            match can_enter_path(&path, &controller.snapshot()) {
                Gate::Allow => println!("allow {path}"),
                Gate::RedirectTo(to) => println!("redirect {path} -> {to}"),
            }
            Ok(())
        }
        Command::Login { email, password } => {
            let identity = controller.login(&email, &password).await?;
            println!("signed in as {} ({})", identity.id, identity.role.as_str());
            Ok(())
        }
        Command::Signup { username, email, password, login } => {
            if login {
                let identity = controller.signup_and_login(&username, &email, &password).await?;
                println!("account created; signed in as {} ({})", identity.id, identity.role.as_str());
            } else {
                controller.signup(&username, &email, &password).await?;
                println!("account created; run `taskdesk login` to sign in");
            }
            Ok(())
        }
        Command::Logout => {
            if controller.logout() {
                println!("signed out");
            } else {
                println!("already signed out");
            }
            Ok(())
        }
        Command::Profile => print_json(&controller.profile().await?),
        Command::Task(task) => run_task(controller, config, task).await,
        Command::Admin(admin) => run_admin(controller, admin).await,
    }
}

async fn run_task(controller: &SessionController, config: &ClientConfig, task: TaskCommand) -> Result<(), CliError> {
    match task.command {
        TaskSubcommand::List { search, sort } => {
            let tasks = controller.list_tasks(&TaskQuery { search, sort }).await?;
            let is_admin = controller.snapshot().is_admin();
            for task in &tasks {
                let image = task.image_url(&config.api_url).unwrap_or_default();
                if is_admin {
                    println!("{}\t{}\t{}\t{}", task.id, task.title, task.creator_label(), image);
                } else {
                    println!("{}\t{}\t{}", task.id, task.title, image);
                }
            }
            Ok(())
        }
        TaskSubcommand::Create { title, description, image } => {
            let draft = TaskDraft { title, description, image: image.as_deref().map(read_image).transpose()? };
            controller.create_task(&draft).await?;
            println!("task created");
            Ok(())
        }
        TaskSubcommand::Update { task_id, title, description, image, has_image } => {
            let draft = TaskDraft { title, description, image: image.as_deref().map(read_image).transpose()? };
            controller.update_task(&task_id, &draft, has_image).await?;
            println!("task {task_id} updated");
            Ok(())
        }
        TaskSubcommand::Delete { task_id } => {
            controller.delete_task(&task_id).await?;
            println!("task {task_id} deleted");
            Ok(())
        }
    }
}

async fn run_admin(controller: &SessionController, admin: AdminCommand) -> Result<(), CliError> {
    match admin.command {
        AdminSubcommand::Users => {
            for user in controller.list_users().await? {
                let state = if user.is_blocked { "blocked" } else { "active" };
                println!("{}\t{}\t{}\t{}\t{state}", user.id, user.username, user.email, user.role.as_str());
            }
            Ok(())
        }
        AdminSubcommand::Block { user_id } => {
            controller.block_user(&user_id).await?;
            println!("user {user_id} block toggled");
            Ok(())
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// View a command belongs to; `None` for commands that are never gated.
fn required_route(command: &Command) -> Option<Route> {
    match command {
        Command::Status | Command::Open { .. } | Command::Logout => None,
        Command::Login { .. } => Some(Route::Login),
        Command::Signup { .. } => Some(Route::Signup),
        Command::Profile => Some(Route::Profile),
        Command::Task(_) => Some(Route::Home),
        Command::Admin(_) => Some(Route::Admin),
    }
}

fn check_gate(route: Route, controller: &SessionController) -> Result<(), CliError> {
    match can_enter(route, &controller.snapshot()) {
        Gate::Allow => Ok(()),
        Gate::RedirectTo(to) if to == LOGIN_PATH => Err(CliError::LoginRequired),
        Gate::RedirectTo(to) => Err(CliError::Redirected { route: route.path(), to }),
    }
}

fn print_status(controller: &SessionController) {
    let session = controller.snapshot();
    match session.identity().filter(|_| session.is_authenticated()) {
        Some(identity) => println!("signed in as {} ({})", identity.id, identity.role.as_str()),
        None => println!("signed out"),
    }
    let links: Vec<&str> = nav_links(&session).into_iter().map(NavLink::label).collect();
    println!("nav: {}", links.join(" | "));
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

fn parse_sort(raw: &str) -> Result<TaskSort, String> {
    TaskSort::parse(raw).ok_or_else(|| format!("unknown sort `{raw}` (expected newest, oldest, or title)"))
}

fn default_credentials_path() -> PathBuf {
    std::env::var_os("HOME").map_or_else(PathBuf::new, PathBuf::from).join(".taskdesk").join("credentials.json")
}

/// MIME type from the file extension. Unknown types are sent as
/// `application/octet-stream` and rejected by form validation.
fn mime_for(path: &Path) -> &'static str {
    let ext = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

fn read_image(path: &Path) -> Result<ImageUpload, CliError> {
    let bytes = std::fs::read(path).map_err(|source| CliError::ReadFile { path: path.to_path_buf(), source })?;
    let file_name = path.file_name().map_or_else(|| "upload".to_owned(), |n| n.to_string_lossy().into_owned());
    Ok(ImageUpload { file_name, mime_type: mime_for(path).to_owned(), bytes })
}

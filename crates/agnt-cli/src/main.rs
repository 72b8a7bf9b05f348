mod session;
mod tui;
mod typeahead;

use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use agnt_auth::AuthManager;
use agnt_core::approval::ApprovalMode;
use agnt_db::Store;
use agnt_llm_registry::{AuthMethod, OAuthPkceAuth, Registry};
use axum::extract::{Query, State};
use axum::http::{StatusCode, Uri};
use axum::response::{Html, IntoResponse};
use axum::{Router, routing::get};
use clap::{Parser, Subcommand};
use parking_lot::Mutex;
use session::SessionStore;
use tokio::sync::{mpsc, oneshot};
use tracing_subscriber::EnvFilter;
use tui::app::App;
use url::Url;

const DEFAULT_PROVIDER_ID: &str = "openai";
const DEFAULT_MODEL_ID: &str = "gpt-4.1-nano";
const OAUTH_CALLBACK_TIMEOUT: Duration = Duration::from_secs(180);
const OAUTH_SUCCESS_HTML: &str = "<!doctype html><html><head><meta charset=\"utf-8\" /><title>Authentication successful</title></head><body><p>Authentication successful. Return to your terminal.</p></body></html>";

#[derive(Parser)]
#[command(name = "agnt")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Resume a given session id instead of the most recent one.
    #[arg(long)]
    session: Option<String>,

    /// Approval mode for tool calls: suggest, auto-edit, full-auto, or
    /// dangerous (no sandboxing).
    #[arg(long, value_enum, default_value = "suggest")]
    approval: ApprovalModeArg,

    // Backward-compatible alias for `agnt providers`.
    #[arg(long, hide = true)]
    providers: bool,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum ApprovalModeArg {
    Suggest,
    AutoEdit,
    FullAuto,
    Dangerous,
}

impl From<ApprovalModeArg> for ApprovalMode {
    fn from(value: ApprovalModeArg) -> Self {
        match value {
            ApprovalModeArg::Suggest => ApprovalMode::Suggest,
            ApprovalModeArg::AutoEdit => ApprovalMode::AutoEdit,
            ApprovalModeArg::FullAuto => ApprovalMode::FullAuto,
            ApprovalModeArg::Dangerous => ApprovalMode::Dangerous,
        }
    }
}

#[derive(Clone, Copy, Subcommand)]
enum Command {
    /// Start the terminal UI (default).
    Tui,
    /// List known providers and their models.
    Providers,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Tui,
    Providers,
}

impl Cli {
    fn mode(&self) -> Mode {
        if self.providers {
            return Mode::Providers;
        }

        match self.command.unwrap_or(Command::Tui) {
            Command::Tui => Mode::Tui,
            Command::Providers => Mode::Providers,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mode = cli.mode();

    let _ = dotenvy::dotenv();
    init_logging()?;

    // Install a panic hook that restores the terminal before printing the
    // panic message, so the user isn't left with a broken terminal.
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tui::restore_terminal();
        default_hook(info);
    }));

    // Set up auth + registry.
    let auth_manager = Arc::new(AuthManager::new("agnt"));
    let mut registry = Registry::new();
    registry.set_auth_resolver(auth_manager.resolver());
    agnt_llm_openai::register(&mut registry);
    registry.fetch_spec().await?;

    if mode == Mode::Providers {
        print_providers(&registry);
        return Ok(());
    }

    run_tui(&mut registry, &auth_manager, &cli).await
}

fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let log_path = agnt_app::log_file_path()?;
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;

    tracing_subscriber::fmt()
        .with_writer(file)
        .with_ansi(false)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    Ok(())
}

fn print_providers(registry: &Registry) {
    for provider in registry.known_providers() {
        let status = if provider.configured {
            "configured"
        } else {
            "needs login"
        };
        let compat = if provider.compatible {
            "compatible"
        } else {
            "no-factory"
        };
        println!(
            "{} ({}) [{} | {} | {}]",
            provider.id, provider.name, provider.auth_method, status, compat
        );

        let mut models = registry.list_models(&provider.id);
        models.sort_by(|a, b| a.id.cmp(&b.id));
        for model in &models {
            let name = model.name.as_deref().unwrap_or("");
            println!("  {:<30} {}", model.id, name);
        }
    }
}

async fn run_tui(
    registry: &mut Registry,
    auth_manager: &Arc<AuthManager>,
    cli: &Cli,
) -> Result<(), Box<dyn std::error::Error>> {
    ensure_provider_credentials(registry, auth_manager, DEFAULT_PROVIDER_ID).await?;

    let cwd = std::env::current_dir()?;
    let agent = build_default_agent(registry, cwd.clone(), cli.approval.into())?;

    let db_path = agnt_app::session_db_path()?;
    let store = Arc::new(Mutex::new(Store::open(&db_path)?));
    let session_store = Arc::new(Mutex::new(SessionStore::open_for_project_root(
        store, &cwd,
    )?));

    let restored = {
        let mut guard = session_store.lock();
        match &cli.session {
            Some(session_id) => guard.activate_session(session_id)?,
            None => guard.resume_most_recent_session()?,
        }
    };
    if let Some(state) = restored {
        agent.restore_conversation_state(state);
    }
    session_store.lock().ensure_active_session()?;

    let mut app = App::new(agent, session_store);
    tui::launch(&mut app).await
}

fn build_default_agent(
    registry: &mut Registry,
    cwd: PathBuf,
    approval_mode: ApprovalMode,
) -> Result<agnt_core::Agent, Box<dyn std::error::Error>> {
    let model = registry.model(DEFAULT_PROVIDER_ID, DEFAULT_MODEL_ID)?;
    Ok(agnt_core::Agent::with_defaults(model, cwd, approval_mode))
}

async fn ensure_provider_credentials(
    registry: &Registry,
    auth: &Arc<AuthManager>,
    provider_id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(request) = registry.auth_request(provider_id) else {
        return Ok(());
    };

    match request.auth_method {
        AuthMethod::ApiKey(_) => {
            if auth.resolve_cached(&request)?.is_some() {
                return Ok(());
            }

            let prompt = format!("Enter API key for {}: ", request.provider_name);
            let value = rpassword::prompt_password(prompt)?;
            if value.trim().is_empty() {
                return Err(format!("no API key provided for {}", request.provider_name).into());
            }
            auth.store_api_key(provider_id, value)?;
        }
        AuthMethod::OAuthPkce(ref config) => {
            match auth.refresh_oauth_if_needed(provider_id, config).await {
                Ok(Some(_)) => return Ok(()),
                Ok(None) => {}
                Err(err) => {
                    eprintln!(
                        "stored OAuth session for {} is not usable ({}); starting sign-in flow",
                        request.provider_name, err
                    );
                }
            }

            let pending = auth.begin_oauth(provider_id, config)?;
            println!(
                "Sign in for {}:\n{}",
                request.provider_name, pending.authorize_url
            );
            if let Err(err) = webbrowser::open(&pending.authorize_url) {
                eprintln!("failed to open browser: {err}");
            }

            let authorization_input = match wait_for_oauth_callback(config, &pending.state).await? {
                Some(code) => code,
                None => prompt_line("Paste authorization code (or redirect URL): ")?,
            };
            auth.complete_oauth(provider_id, config, &pending, &authorization_input)
                .await?;
        }
    }

    Ok(())
}

#[derive(Clone)]
struct CallbackState {
    expected_path: String,
    expected_state: String,
    tx: mpsc::UnboundedSender<Result<String, String>>,
}

async fn wait_for_oauth_callback(
    config: &OAuthPkceAuth,
    expected_state: &str,
) -> Result<Option<String>, Box<dyn std::error::Error>> {
    let redirect = Url::parse(&config.redirect_url)?;
    if redirect.scheme() != "http" {
        return Ok(None);
    }

    let host = redirect.host_str().unwrap_or("127.0.0.1");
    if host != "127.0.0.1" && host != "localhost" {
        return Ok(None);
    }
    let port = redirect.port_or_known_default().unwrap_or(80);
    let bind_host = if host == "localhost" {
        "127.0.0.1"
    } else {
        host
    };
    let expected_path = redirect.path().to_string();

    let listener = match tokio::net::TcpListener::bind((bind_host, port)).await {
        Ok(listener) => listener,
        Err(_) => return Ok(None),
    };

    let (tx, mut rx) = mpsc::unbounded_channel::<Result<String, String>>();
    let state = CallbackState {
        expected_path,
        expected_state: expected_state.to_string(),
        tx,
    };

    let app = Router::new()
        .route("/", get(oauth_callback))
        .route("/{*path}", get(oauth_callback))
        .with_state(state);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = shutdown_rx.await;
    });
    let server_task = tokio::spawn(async move {
        let _ = server.await;
    });

    let result = tokio::time::timeout(OAUTH_CALLBACK_TIMEOUT, rx.recv()).await;
    let _ = shutdown_tx.send(());
    let _ = tokio::time::timeout(Duration::from_secs(2), server_task).await;

    match result {
        Ok(Some(Ok(code))) => Ok(Some(code)),
        Ok(Some(Err(message))) => Err(message.into()),
        Ok(None) => Ok(None),
        Err(_) => Ok(None),
    }
}

async fn oauth_callback(
    State(state): State<CallbackState>,
    Query(query): Query<HashMap<String, String>>,
    uri: Uri,
) -> impl IntoResponse {
    if uri.path() != state.expected_path {
        return (StatusCode::NOT_FOUND, Html("Not found".to_string())).into_response();
    }

    if query.get("state").map(String::as_str) != Some(state.expected_state.as_str()) {
        let _ = state
            .tx
            .send(Err("oauth callback state mismatch".to_string()));
        return (StatusCode::BAD_REQUEST, Html("State mismatch".to_string())).into_response();
    }

    let Some(code) = query.get("code").cloned() else {
        let _ = state
            .tx
            .send(Err("missing authorization code in callback".to_string()));
        return (
            StatusCode::BAD_REQUEST,
            Html("Missing authorization code".to_string()),
        )
            .into_response();
    };

    let _ = state.tx.send(Ok(code));
    (StatusCode::OK, Html(OAUTH_SUCCESS_HTML.to_string())).into_response()
}

fn prompt_line(prompt: &str) -> Result<String, io::Error> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

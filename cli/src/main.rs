use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use report_client::config::ConfigError;
use report_client::report::categories::{SchoolLevel, default_categories};
use report_client::report::form::{FormDraft, FormError, ReportForm};
use report_client::report::response::ReportEntry;
use report_client::report::service::{ReportGenerator, ReportService};
use report_client::report::templates::TemplateId;
use report_client::routes::{self, GuardDecision, Navigation};
use report_client::storage::StorageError;
use report_client::theme::{self, Theme};
use report_client::{ApiClient, ApiError, AuthManager, ClientConfig, ClientStorage};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("config: {0}")]
    Config(#[from] ConfigError),
    #[error("storage: {0}")]
    Storage(#[from] StorageError),
    #[error("{0}")]
    Api(#[from] ApiError),
    #[error("form: {0}")]
    Form(#[from] FormError),
    #[error("failed to read {path}: {source}")]
    Input { path: String, source: io::Error },
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("missing password; pass --password or set REPORT_PASSWORD")]
    MissingPassword,
    #[error("unknown theme `{0}`; expected light or dark")]
    UnknownTheme(String),
    #[error("{0}")]
    Rejected(String),
}

#[derive(Parser, Debug)]
#[command(name = "report-cli", about = "AI school report generator client")]
struct Cli {
    /// API base URL.
    #[arg(long, env = "REPORT_API_BASE_URL")]
    base_url: Option<String>,

    /// Per-request timeout in milliseconds.
    #[arg(long, env = "REPORT_API_TIMEOUT_MS")]
    timeout_ms: Option<u64>,

    /// Where tokens, cookies and the theme are persisted.
    #[arg(long, env = "REPORT_STATE_PATH")]
    state_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and print where to go next.
    Login {
        identifier: String,
        #[arg(long, env = "REPORT_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// Post-login target, as carried by the login page's `next` parameter.
        #[arg(long)]
        next: Option<String>,
    },
    Register {
        username: String,
        #[arg(long, env = "REPORT_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    Logout,
    /// Print the signed-in user.
    Whoami,
    /// Resolve what a location renders for the current session.
    Guard { path: String },
    /// Generate reports for a form draft.
    Generate(FormInput),
    /// Generate reports through the bulk endpoint.
    GenerateBulk(FormInput),
    /// Print the default categories for a school level.
    Categories {
        #[arg(long, default_value = "primary")]
        level: SchoolLevel,
    },
    Template(TemplateCommand),
    Theme(ThemeCommand),
}

#[derive(Args, Debug)]
struct FormInput {
    #[arg(long, default_value = "-", help = "Form draft path, or - for stdin")]
    input: String,
}

#[derive(Args, Debug)]
struct TemplateCommand {
    #[command(subcommand)]
    command: TemplateSubcommand,
}

#[derive(Subcommand, Debug)]
enum TemplateSubcommand {
    List {
        #[arg(long, default_value = "primary")]
        level: SchoolLevel,
    },
    /// Save one student's categories from a form draft as a template.
    Create {
        #[arg(long)]
        name: String,
        #[command(flatten)]
        form: FormInput,
        #[arg(long, default_value_t = 0)]
        student: usize,
    },
    Update {
        id: TemplateId,
        #[arg(long)]
        name: String,
        #[command(flatten)]
        form: FormInput,
        #[arg(long, default_value_t = 0)]
        student: usize,
    },
    Delete {
        id: TemplateId,
    },
}

#[derive(Args, Debug)]
struct ThemeCommand {
    #[command(subcommand)]
    command: ThemeSubcommand,
}

#[derive(Subcommand, Debug)]
enum ThemeSubcommand {
    Show,
    Toggle,
    Set { theme: String },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let storage = ClientStorage::open_file(&config.state_path)?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted, cancelling in-flight requests");
            on_interrupt.cancel();
        }
    });

    match cli.command {
        Command::Categories { level } => print_json(&default_categories(level)),
        Command::Theme(cmd) => run_theme(&storage, cmd),
        command => {
            let client = ApiClient::from_config(&config, storage)?;
            let auth = AuthManager::new(client.clone());
            let result = run_remote(&config, &auth, client, command, &cancel).await;
            if let Some(navigation) = auth.drain_session_events() {
                print_navigation(&navigation)?;
            }
            result
        }
    }
}

fn load_config(cli: &Cli) -> Result<ClientConfig, CliError> {
    let mut config = ClientConfig::from_env()?;
    if let Some(base_url) = &cli.base_url {
        config.base_url.clone_from(base_url);
    }
    if let Some(ms) = cli.timeout_ms {
        config.timeouts.request = Duration::from_millis(ms);
    }
    if let Some(path) = &cli.state_path {
        config.state_path.clone_from(path);
    }
    Ok(config.validated()?)
}

async fn run_remote(
    config: &ClientConfig,
    auth: &AuthManager,
    client: ApiClient,
    command: Command,
    cancel: &CancellationToken,
) -> Result<(), CliError> {
    match command {
        Command::Login { identifier, password, next } => {
            let password = password.ok_or(CliError::MissingPassword)?;
            let location = match next {
                Some(next) => routes::login_redirect(&next).to,
                None => routes::LOGIN_PATH.to_owned(),
            };
            match auth.login(&identifier, &password, &location, cancel).await {
                Ok(navigation) => print_navigation(&navigation),
                Err(e) => Err(rejected(auth, e)),
            }
        }
        Command::Register { username, password } => {
            let password = password.ok_or(CliError::MissingPassword)?;
            let message = auth.register(&username, &password, cancel).await?;
            print_json(&json!({ "message": message }))
        }
        Command::Logout => print_navigation(&auth.logout(cancel).await),
        Command::Whoami => {
            if let Some(navigation) = auth.check_auth_status(true, cancel).await {
                return print_navigation(&navigation);
            }
            match auth.state().user {
                Some(user) => print_json(&user),
                None => Err(rejected_state(auth)),
            }
        }
        Command::Guard { path } => {
            let route = routes::resolve(&path);
            let storage = client.storage();
            let has_session = storage.access_token().is_some() || storage.refresh_token().is_some();
            // Resolve the user before the route flag strips the bearer.
            auth.check_auth_status(!route.access.is_public() || has_session, cancel).await;
            auth.navigate(&path);
            match routes::guard(&path, &auth.state()) {
                GuardDecision::Loading => print_json(&json!({ "loading": true })),
                GuardDecision::Render(page) => print_json(&json!({ "render": format!("{page:?}") })),
                GuardDecision::Redirect(navigation) => print_navigation(&navigation),
            }
        }
        Command::Generate(input) => {
            let generator = generator_for(config, client, &input)?;
            let reports = generator.generate(cancel).await.map_err(CliError::Rejected)?;
            print_reports(&reports)
        }
        Command::GenerateBulk(input) => {
            let generator = generator_for(config, client, &input)?;
            let reports = generator.generate_bulk(cancel).await.map_err(CliError::Rejected)?;
            print_reports(&reports)
        }
        Command::Template(cmd) => run_template(config, client, cmd, cancel).await,
        Command::Categories { .. } | Command::Theme(_) => Ok(()),
    }
}

async fn run_template(
    config: &ClientConfig,
    client: ApiClient,
    cmd: TemplateCommand,
    cancel: &CancellationToken,
) -> Result<(), CliError> {
    match cmd.command {
        TemplateSubcommand::List { level } => {
            let generator = ReportGenerator::new(ReportService::new(client, config), ReportForm::new(level));
            generator.load_templates(cancel).await;
            print_json(generator.state().templates.templates())
        }
        TemplateSubcommand::Create { name, form, student } => {
            let generator = generator_for(config, client, &form)?;
            let draft = generator.draft_from_student(&name, student)?;
            print_json(&generator.create_template(&draft, cancel).await?)
        }
        TemplateSubcommand::Update { id, name, form, student } => {
            let generator = generator_for(config, client, &form)?;
            let draft = generator.draft_from_student(&name, student)?;
            print_json(&generator.update_template(id, &draft, cancel).await?)
        }
        TemplateSubcommand::Delete { id } => {
            let generator = ReportGenerator::new(ReportService::new(client, config), ReportForm::default());
            generator.delete_template(id, cancel).await?;
            print_json(&json!({ "deleted": id }))
        }
    }
}

fn run_theme(storage: &ClientStorage, cmd: ThemeCommand) -> Result<(), CliError> {
    let current = match cmd.command {
        ThemeSubcommand::Show => theme::load(storage),
        ThemeSubcommand::Toggle => theme::toggle(storage)?,
        ThemeSubcommand::Set { theme: value } => {
            let chosen = Theme::parse(&value).ok_or(CliError::UnknownTheme(value))?;
            theme::store(storage, chosen)?;
            chosen
        }
    };
    print_json(&json!({ "theme": current }))
}

fn generator_for(config: &ClientConfig, client: ApiClient, input: &FormInput) -> Result<ReportGenerator, CliError> {
    let draft: FormDraft = serde_json::from_str(&read_input(&input.input)?)?;
    let form = ReportForm::from_draft(draft);
    Ok(ReportGenerator::new(ReportService::new(client, config), form))
}

fn read_input(path: &str) -> Result<String, CliError> {
    let read = if path == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf).map(|_| buf)
    } else {
        fs::read_to_string(path)
    };
    read.map_err(|source| CliError::Input { path: path.to_owned(), source })
}

fn rejected(auth: &AuthManager, fallback: ApiError) -> CliError {
    match auth.state().error {
        Some(message) => CliError::Rejected(message),
        None => CliError::Api(fallback),
    }
}

fn rejected_state(auth: &AuthManager) -> CliError {
    CliError::Rejected(auth.state().error.unwrap_or_else(|| "not signed in".to_owned()))
}

fn print_reports(reports: &[ReportEntry]) -> Result<(), CliError> {
    let rendered: Vec<Value> =
        reports.iter().map(|r| json!({ "name": r.name(), "report": r.report() })).collect();
    print_json(&rendered)
}

fn print_navigation(navigation: &Navigation) -> Result<(), CliError> {
    print_json(&json!({ "navigate": navigation.to }))
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;

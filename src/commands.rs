//! Command-line host for the client: one subcommand per API operation plus
//! the polling dashboard.

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Subcommand};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Notify;

use crate::api::OpportunityFilter;
use crate::auth::SessionStore;
use crate::client::ApiClient;
use crate::config::Config;
use crate::dashboard::{DashboardController, DashboardSnapshot, DashboardState, Phase};
use crate::models::{LoginRequest, OpportunityPayload, ProfilePatch, RegisterRequest};

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Poll metrics and recent opportunities until interrupted
    Dashboard {
        /// Print the first snapshot and exit
        #[arg(long)]
        once: bool,
    },
    /// Log in and store the session token
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "UNIFOCUS_PASSWORD")]
        password: String,
    },
    /// Create an account and store the session token
    Register(RegisterArgs),
    /// Forget the stored session
    Logout,
    /// Exchange the stored token for a fresh one
    Refresh,
    /// Show system metrics
    Metrics,
    /// Browse and manage opportunities
    #[command(subcommand)]
    Opportunities(OpportunityCommand),
    /// Show or edit your profile
    #[command(subcommand)]
    Profile(ProfileCommand),
}

#[derive(Args, Debug)]
pub struct RegisterArgs {
    #[arg(long)]
    pub username: String,
    #[arg(long)]
    pub email: String,
    #[arg(long, env = "UNIFOCUS_PASSWORD")]
    pub password: String,
    #[arg(long)]
    pub school: String,
    #[arg(long)]
    pub major: String,
    #[arg(long)]
    pub grade: i32,
}

#[derive(Subcommand, Debug)]
pub enum OpportunityCommand {
    List(ListArgs),
    Get {
        id: i64,
    },
    /// Create from a JSON payload file
    Create {
        #[arg(long)]
        file: PathBuf,
    },
    /// Replace from a JSON payload file
    Update {
        id: i64,
        #[arg(long)]
        file: PathBuf,
    },
    Delete {
        id: i64,
    },
}

#[derive(Args, Debug, Default)]
pub struct ListArgs {
    #[arg(long = "type")]
    pub kind: Option<String>,
    #[arg(long)]
    pub level: Option<String>,
    #[arg(long)]
    pub major: Option<String>,
    #[arg(long)]
    pub deadline_after: Option<NaiveDate>,
    #[arg(long)]
    pub deadline_before: Option<NaiveDate>,
    #[arg(long)]
    pub active: Option<bool>,
    #[arg(long = "tag")]
    pub tags: Vec<String>,
    #[arg(long)]
    pub limit: Option<u32>,
    #[arg(long)]
    pub offset: Option<u32>,
}

impl From<ListArgs> for OpportunityFilter {
    fn from(args: ListArgs) -> Self {
        OpportunityFilter {
            kind: args.kind,
            competition_level: args.level,
            major: args.major,
            deadline_after: args.deadline_after,
            deadline_before: args.deadline_before,
            is_active: args.active,
            tags: args.tags,
            limit: args.limit,
            offset: args.offset,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum ProfileCommand {
    Show,
    /// Apply a JSON patch file (only the fields present are changed)
    Update {
        #[arg(long)]
        file: PathBuf,
    },
    /// Upload a PDF, DOC or DOCX resume
    UploadResume {
        path: PathBuf,
    },
}

/// Build the client for this invocation and run `command`.
pub async fn run(command: Command, config: &Config) -> anyhow::Result<()> {
    let session = SessionStore::persistent(config.session_path());
    let expired = Arc::new(Notify::new());
    let hook = expired.clone();
    let client = ApiClient::builder(config.client_config()?)
        .session(session.clone())
        .on_session_expired(move || {
            eprintln!("Session expired. Run `unifocus login` to sign in again.");
            hook.notify_one();
        })
        .build()?;

    match command {
        Command::Dashboard { once } => dashboard(client, config, expired, once).await,
        Command::Login { email, password } => {
            let auth = client
                .auth()
                .login(&LoginRequest { email, password })
                .await?;
            println!("Logged in as {} ({})", auth.user.username, auth.user.email);
            session.set_session(auth.token, auth.user);
            Ok(())
        }
        Command::Register(args) => {
            let request = RegisterRequest {
                username: args.username,
                email: args.email,
                password: args.password,
                school: args.school,
                major: args.major,
                grade: args.grade,
            };
            let auth = client.auth().register(&request).await?;
            println!("Registered {} ({})", auth.user.username, auth.user.email);
            session.set_session(auth.token, auth.user);
            Ok(())
        }
        Command::Logout => {
            if session.clear() {
                println!("Logged out");
            } else {
                println!("No active session");
            }
            Ok(())
        }
        Command::Refresh => {
            anyhow::ensure!(session.is_authenticated(), "not logged in");
            let refreshed = client.auth().refresh_token().await?;
            session.replace_token(refreshed.token);
            println!("Token refreshed");
            Ok(())
        }
        Command::Metrics => print_json(&client.metrics().get().await?),
        Command::Opportunities(cmd) => opportunities(&client, cmd).await,
        Command::Profile(cmd) => profile(&client, cmd).await,
    }
}

async fn opportunities(client: &ApiClient, command: OpportunityCommand) -> anyhow::Result<()> {
    let api = client.opportunities();
    match command {
        OpportunityCommand::List(args) => {
            let filter = OpportunityFilter::from(args);
            print_json(&api.list(Some(&filter)).await?)
        }
        OpportunityCommand::Get { id } => print_json(&api.get(id).await?),
        OpportunityCommand::Create { file } => {
            let payload: OpportunityPayload = read_json(&file)?;
            print_json(&api.create(&payload).await?)
        }
        OpportunityCommand::Update { id, file } => {
            let payload: OpportunityPayload = read_json(&file)?;
            print_json(&api.update(id, &payload).await?)
        }
        OpportunityCommand::Delete { id } => {
            api.delete(id).await?;
            println!("Deleted opportunity {id}");
            Ok(())
        }
    }
}

async fn profile(client: &ApiClient, command: ProfileCommand) -> anyhow::Result<()> {
    let api = client.profile();
    match command {
        ProfileCommand::Show => print_json(&api.get().await?),
        ProfileCommand::Update { file } => {
            let patch: ProfilePatch = read_json(&file)?;
            anyhow::ensure!(!patch.is_empty(), "patch file sets no fields");
            print_json(&api.update(&patch).await?)
        }
        ProfileCommand::UploadResume { path } => print_json(&api.upload_resume(&path).await?),
    }
}

async fn dashboard(
    client: ApiClient,
    config: &Config,
    expired: Arc<Notify>,
    once: bool,
) -> anyhow::Result<()> {
    let mut controller = DashboardController::start(Arc::new(client), config.dashboard_config());
    let mut updates = controller.subscribe();

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = updates.borrow_and_update().clone();
                if state.phase == Phase::Loading {
                    continue;
                }
                render(&state);
                if once {
                    break;
                }
            }
            _ = expired.notified() => break,
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    controller.stop().await;
    Ok(())
}

fn render(state: &DashboardState) {
    match &state.snapshot {
        Some(snapshot) => print_snapshot(snapshot),
        None => println!("No dashboard data yet"),
    }
    if let Some(report) = &state.last_cycle {
        for (resource, error) in &report.errors {
            println!("  ! {resource}: {error}");
        }
    }
}

fn print_snapshot(snapshot: &DashboardSnapshot) {
    println!("== Dashboard @ {}", snapshot.loaded_at.to_rfc3339());
    match &snapshot.metrics {
        Some(m) => println!("status: {}  uptime: {}", m.status, m.system.uptime),
        None => println!("status: unknown"),
    }
    println!("recent opportunities: {}", snapshot.opportunities.len());
    for opp in &snapshot.opportunities {
        println!(
            "  #{:<5} {:<14} {:<12} views={} saves={}  {}",
            opp.id,
            opp.kind,
            opp.competition_level.as_deref().unwrap_or("-"),
            opp.view_count,
            opp.save_count,
            opp.title
        );
    }
    if !snapshot.partial_failures.is_empty() {
        let stale: Vec<String> = snapshot
            .partial_failures
            .iter()
            .map(|r| r.to_string())
            .collect();
        println!("stale: {}", stale.join(", "));
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

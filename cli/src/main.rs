use std::io::{self, Write};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use smartreach::config::{ClientConfig, ConfigError};
use smartreach::net::api::{ApiError, CampaignApi, DASHBOARD_FAILED};
use smartreach::net::http::HttpCampaignApi;
use smartreach::net::types::{CampaignStatus, Lead};
use smartreach::state::history::{HistoryError, HistoryFilter, HistoryState};
use smartreach::state::profile::{ProfileError, ProfileState};
use smartreach::state::score::ScoreTier;
use smartreach::state::workflow::{CampaignInputs, CampaignWorkflow, WorkflowError, parse_max_leads};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(test)]
#[path = "main_test.rs"]
mod main_test;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Api(#[from] ApiError),
    #[error("{0}")]
    Workflow(#[from] WorkflowError),
    #[error("{0}")]
    Profile(#[from] ProfileError),
    #[error("{0}")]
    History(#[from] HistoryError),
    #[error("lead #{index} does not exist; research returned {available}")]
    NoSuchLead { index: usize, available: usize },
    #[error("unknown campaign status: {0}")]
    InvalidStatus(String),
    #[error("{0}")]
    Dashboard(String),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "smartreach-cli", about = "SmartReach outreach campaign CLI")]
struct Cli {
    /// Backend base URL; overrides the config default.
    #[arg(long, env = "SMARTREACH_API_URL")]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Research leads, generate messages, optionally approve.
    Run(RunArgs),
    /// Resume a saved campaign at lead review.
    Resume {
        campaign_id: String,
        #[command(flatten)]
        selection: SelectionArgs,
    },
    History(HistoryCommand),
    Profile(ProfileCommand),
    Dashboard,
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Self::Run(_) => "run",
            Self::Resume { .. } => "resume",
            Self::History(_) => "history",
            Self::Profile(_) => "profile",
            Self::Dashboard => "dashboard",
        }
    }
}

#[derive(Args, Debug)]
struct RunArgs {
    #[arg(long)]
    product: String,

    #[arg(long)]
    area: String,

    #[arg(long)]
    context: Option<String>,

    /// How you can help the prospect.
    #[arg(long)]
    angle: Option<String>,

    #[arg(long, default_value = "10")]
    max_leads: String,

    #[command(flatten)]
    selection: SelectionArgs,
}

#[derive(Args, Debug)]
struct SelectionArgs {
    /// 1-based lead numbers to generate messages for.
    #[arg(long, value_delimiter = ',')]
    select: Vec<usize>,

    /// Generate for every lead.
    #[arg(long, default_value_t = false, conflicts_with = "select")]
    all: bool,

    /// Regenerate once before approving.
    #[arg(long, default_value_t = false)]
    regenerate: bool,

    /// Save the campaign after generation.
    #[arg(long, default_value_t = false)]
    approve: bool,
}

#[derive(Args, Debug)]
struct HistoryCommand {
    #[command(subcommand)]
    command: HistorySubcommand,
}

#[derive(Subcommand, Debug)]
enum HistorySubcommand {
    List {
        #[arg(long)]
        query: Option<String>,
        /// e.g. `research-complete`, `completed`.
        #[arg(long)]
        status: Option<String>,
        #[arg(long, default_value_t = false)]
        resumable: bool,
    },
    Show {
        campaign_id: String,
    },
    Delete {
        campaign_id: String,
    },
}

#[derive(Args, Debug)]
struct ProfileCommand {
    #[command(subcommand)]
    command: ProfileSubcommand,
}

#[derive(Subcommand, Debug)]
enum ProfileSubcommand {
    Show,
    SetName { name: String },
    AddService { service: String },
    RemoveService { service: String },
    Reset,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = ClientConfig::from_env()?;
    if let Some(base_url) = cli.base_url.as_deref() {
        config = config.with_api_url(base_url);
    }
    let api: Arc<dyn CampaignApi> = Arc::new(HttpCampaignApi::new(&config)?);
    info!(command = cli.command.name(), base_url = %config.api_url, "smartreach-cli starting");

    match cli.command {
        Command::Run(args) => run_campaign(api, &config, args).await,
        Command::Resume { campaign_id, selection } => resume_campaign(api, &config, &campaign_id, selection).await,
        Command::History(history) => run_history(api.as_ref(), history).await,
        Command::Profile(profile) => run_profile(api.as_ref(), profile).await,
        Command::Dashboard => run_dashboard(api.as_ref()).await,
    }
}

async fn run_campaign(api: Arc<dyn CampaignApi>, config: &ClientConfig, args: RunArgs) -> Result<(), CliError> {
    let mut inputs = CampaignInputs::new(args.product, args.area);
    inputs.context = args.context;
    inputs.angle = args.angle;
    inputs.max_leads = parse_max_leads(&args.max_leads);

    let mut workflow = CampaignWorkflow::new(api, config.progress);
    let mut progress = workflow.subscribe_progress();
    let printer = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let value = *progress.borrow_and_update();
            eprint!("\rresearching... {value:>3}%");
            let _ = io::stderr().flush();
        }
    });
    let researched = workflow.start_research(inputs).await;
    printer.abort();
    eprintln!();
    researched?;

    finish_campaign(&mut workflow, args.selection).await
}

async fn resume_campaign(
    api: Arc<dyn CampaignApi>,
    config: &ClientConfig,
    campaign_id: &str,
    selection: SelectionArgs,
) -> Result<(), CliError> {
    let mut workflow = CampaignWorkflow::new(api, config.progress);
    workflow.restore_campaign(campaign_id).await?;
    finish_campaign(&mut workflow, selection).await
}

/// Review → generate → (regenerate) → approve, then print the final state.
async fn finish_campaign(workflow: &mut CampaignWorkflow, selection: SelectionArgs) -> Result<(), CliError> {
    print_leads(workflow);

    if selection.all {
        workflow.toggle_select_all()?;
    } else {
        let ids = resolve_selection(&workflow.state().leads, &selection.select)?;
        for id in ids {
            workflow.toggle_lead(&id)?;
        }
    }
    if workflow.state().selected_count() == 0 {
        warn!(leads = workflow.state().leads.len(), "no leads selected; pass --select 1,2 or --all to generate messages");
        return print_json(&serde_json::to_value(workflow.snapshot())?);
    }

    workflow.generate_for_selected().await?;
    if selection.regenerate {
        workflow.regenerate_all().await?;
    }
    print_messages(workflow);

    if selection.approve {
        workflow.approve().await?;
        info!(campaign_id = ?workflow.state().campaign_id, "campaign approved");
        eprintln!("campaign saved");
    }
    print_json(&serde_json::to_value(workflow.snapshot())?)
}

/// Map 1-based lead numbers to lead ids, dropping repeats.
fn resolve_selection(leads: &[Lead], positions: &[usize]) -> Result<Vec<String>, CliError> {
    let mut ids: Vec<String> = Vec::with_capacity(positions.len());
    for &index in positions {
        let lead = index
            .checked_sub(1)
            .and_then(|i| leads.get(i))
            .ok_or(CliError::NoSuchLead { index, available: leads.len() })?;
        if !ids.contains(&lead.id) {
            ids.push(lead.id.clone());
        }
    }
    Ok(ids)
}

fn print_leads(workflow: &CampaignWorkflow) {
    let state = workflow.state();
    eprintln!("{} leads for campaign {}", state.leads.len(), state.campaign_id.as_deref().unwrap_or("-"));
    for (n, lead) in state.leads.iter().enumerate() {
        eprintln!("{:>3}. {} ({}, {})", n + 1, lead.company_name, lead.industry, lead.location);
    }
}

fn print_messages(workflow: &CampaignWorkflow) {
    let state = workflow.state();
    if let Some(average) = state.average_quality_score {
        eprintln!("average quality score: {average:.2}");
    }
    for message in &state.messages {
        let tier = ScoreTier::from_score(message.quality_score);
        eprintln!("[{:>3} {}] {}", message.quality_score, tier.label(), message.company_name);
    }
}

async fn run_history(api: &dyn CampaignApi, history: HistoryCommand) -> Result<(), CliError> {
    match history.command {
        HistorySubcommand::List { query, status, resumable } => {
            let mut state = HistoryState::load(api).await?;
            state.filter = HistoryFilter { query, status: status.as_deref().map(parse_status).transpose()? };
            let rows: Vec<_> = state
                .filtered()
                .filter(|c| !resumable || c.status.is_resumable())
                .collect();
            print_json(&serde_json::to_value(rows)?)
        }
        HistorySubcommand::Show { campaign_id } => {
            let detail = api.campaign_detail(&campaign_id).await?;
            print_json(&serde_json::to_value(detail)?)
        }
        HistorySubcommand::Delete { campaign_id } => {
            let mut state = HistoryState::default();
            state.delete(api, &campaign_id).await?;
            println!("deleted {campaign_id}");
            Ok(())
        }
    }
}

fn parse_status(raw: &str) -> Result<CampaignStatus, CliError> {
    serde_json::from_value(Value::String(raw.trim().to_owned())).map_err(|_| CliError::InvalidStatus(raw.to_owned()))
}

async fn run_profile(api: &dyn CampaignApi, profile: ProfileCommand) -> Result<(), CliError> {
    let mut state = ProfileState::load(api).await?;
    match profile.command {
        ProfileSubcommand::Show => {}
        ProfileSubcommand::SetName { name } => {
            state.set_company_name(&name);
            state.save(api).await?;
        }
        ProfileSubcommand::AddService { service } => {
            state.add_service(&service)?;
            state.save(api).await?;
        }
        ProfileSubcommand::RemoveService { service } => {
            if !state.remove_service(&service) {
                eprintln!("service not listed: {service}");
            }
            state.save(api).await?;
        }
        ProfileSubcommand::Reset => {
            state.reset();
            state.save(api).await?;
        }
    }
    print_json(&serde_json::to_value(&state)?)
}

async fn run_dashboard(api: &dyn CampaignApi) -> Result<(), CliError> {
    let dashboard = api
        .dashboard()
        .await
        .map_err(|err| CliError::Dashboard(err.user_message(DASHBOARD_FAILED)))?;
    print_json(&serde_json::to_value(dashboard)?)
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

// civicfeed entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file, stdout stays clean for results)
// 2. Load config
// 3. Open database
// 4. Build the LegiScan client and feed service
// 5. Run the requested subcommand and print its result as JSON

use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

use civic_app::app;
use civic_app::contact;
use civic_app::feed::{FeedService, LegiScanSource};
use civic_app::protocol::{DisplayValue, UiUpdate, UserCommand, VoteState};
use civic_app::reconciler::Reconciler;
use civic_app::remote::{RepositoryRemote, RetryPolicy};
use civic_app::session::{StaticIdentity, User};
use civic_app::share;
use civic_core::config::{self, Config};
use civic_core::db::Database;
use civic_core::model::VoteType;
use civic_core::repository::Repository;
use civic_legiscan::LegiScan;

const USER_ENV: &str = "CIVICFEED_USER";
const DEFAULT_ORIGIN: &str = "http://localhost:3000";

#[derive(Parser)]
#[command(name = "civicfeed")]
#[command(about = "Browse, rank and act on legislation", long_about = None)]
struct Cli {
    /// Acting user id (falls back to $CIVICFEED_USER)
    #[arg(long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ranked feed of current-session bills
    Feed {
        /// Jurisdictions to include; defaults to US plus the configured state
        #[arg(long = "state")]
        states: Vec<String>,
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// One bill with score and engagement
    Bill { bill_id: String },
    /// Legislative sessions for a state
    Sessions {
        #[arg(long)]
        state: Option<String>,
    },
    /// Masterlist for a specific session
    Session {
        session_id: i64,
        /// State the session belongs to, used to label bills
        #[arg(long)]
        state: Option<String>,
    },
    /// Full-text bill search
    Search {
        query: String,
        #[arg(long)]
        state: Option<String>,
    },
    /// Toggle a vote (same vote again removes it)
    Vote { bill_id: String, vote_type: String },
    Save { bill_id: String },
    Unsave { bill_id: String },
    /// Saved bills, optionally filtered by title or number
    Saved {
        #[arg(short, long)]
        query: Option<String>,
    },
    Comment { bill_id: String, content: String },
    /// Delete one of your own comments
    DeleteComment { comment_id: i64 },
    /// Comments on a bill, newest first
    Comments { bill_id: String },
    /// Sponsors of a bill with contact links
    Contact { bill_id: String },
    /// Share links for a bill
    Share {
        bill_id: String,
        #[arg(long, default_value = DEFAULT_ORIGIN)]
        origin: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 1. Initialize tracing
    init_tracing()?;
    info!("civicfeed starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: default state {}, LegiScan at {}",
        config.legiscan.default_state, config.legiscan.base_url
    );

    // 3. Open database
    let db = Arc::new(Database::open(&config.db_path).context("failed to open database")?);
    info!("Database opened at {}", config.db_path);

    // 4. LegiScan client
    let legiscan = Arc::new(LegiScan::from_config(&config).context("failed to build LegiScan client")?);
    match legiscan.as_ref() {
        LegiScan::Active(_) => info!("LegiScan client initialized (API key configured)"),
        LegiScan::Disabled => info!("LegiScan client disabled (no API key)"),
    }

    let identity = StaticIdentity::from_user_id(cli.user.or_else(|| std::env::var(USER_ENV).ok()));
    let ctx = Ctx {
        config,
        db,
        legiscan,
        identity,
    };

    // 5. Run subcommand
    run_command(&ctx, cli.command).await
}

struct Ctx {
    config: Config,
    db: Arc<Database>,
    legiscan: Arc<LegiScan>,
    identity: StaticIdentity,
}

impl Ctx {
    fn viewer(&self) -> Option<User> {
        civic_app::session::signed_in_user(&self.identity, Utc::now())
    }

    fn require_user(&self) -> anyhow::Result<User> {
        match self.viewer() {
            Some(user) => Ok(user),
            None => bail!("sign in required: pass --user or set {USER_ENV}"),
        }
    }

    fn state_or_default(&self, state: Option<String>) -> String {
        state.unwrap_or_else(|| self.config.legiscan.default_state.clone())
    }

    fn feed_service(&self, states: Vec<String>) -> FeedService {
        FeedService::new(
            Arc::new(LegiScanSource::new(Arc::clone(&self.legiscan), states)),
            self.db.clone(),
            self.config.scoring.clone(),
        )
    }
}

async fn run_command(ctx: &Ctx, command: Commands) -> anyhow::Result<()> {
    let today = Utc::now().date_naive();
    let viewer = ctx.viewer();
    let viewer_id = viewer.as_ref().map(|u| u.id.as_str());

    match command {
        Commands::Feed { states, limit } => {
            let states = if states.is_empty() {
                vec![civic_core::status::FEDERAL_CODE.to_string(), ctx.config.legiscan.default_state.clone()]
            } else {
                states
            };
            let mut items = ctx.feed_service(states).feed(viewer_id, today).await?;
            if let Some(limit) = limit {
                items.truncate(limit);
            }
            print_json(&items)
        }
        Commands::Bill { bill_id } => {
            let item = ctx.feed_service(Vec::new()).bill(&bill_id, viewer_id, today).await?;
            print_json(&item)
        }
        Commands::Sessions { state } => {
            let sessions = ctx.legiscan.session_list(&ctx.state_or_default(state)).await?;
            print_json(&sessions)
        }
        Commands::Session { session_id, state } => {
            let list = ctx
                .legiscan
                .master_list_for_session(session_id, state.as_deref())
                .await?;
            print_json(&list)
        }
        Commands::Search { query, state } => {
            let hits = ctx.legiscan.search(&ctx.state_or_default(state), &query).await?;
            print_json(&hits)
        }
        Commands::Vote { bill_id, vote_type } => {
            let user = ctx.require_user()?;
            let Some(vote_type) = VoteType::from_str_vote(&vote_type) else {
                bail!("unknown vote type {vote_type:?}; expected up or down");
            };
            let engagement = ctx.db.engagement(&bill_id)?;
            let initial = DisplayValue::Vote(VoteState {
                user_vote: ctx.db.user_vote(&user.id, &bill_id)?,
                upvotes: engagement.upvotes,
                downvotes: engagement.downvotes,
            });
            let cmd = UserCommand::ToggleVote {
                bill_id: bill_id.clone(),
                vote_type,
            };
            let value = reconcile_once(ctx, user, &bill_id, initial, cmd).await?;
            print_json(&value)
        }
        Commands::Save { bill_id } => set_saved(ctx, &bill_id, true).await,
        Commands::Unsave { bill_id } => set_saved(ctx, &bill_id, false).await,
        Commands::Saved { query } => {
            let user = ctx.require_user()?;
            let feed = ctx.feed_service(Vec::new());
            let items = match query {
                Some(q) => feed.search_saved(&user.id, &q).await?,
                None => feed.saved(&user.id).await?,
            };
            print_json(&items)
        }
        Commands::Comment { bill_id, content } => {
            let user = ctx.require_user()?;
            let comment = ctx.db.post_comment(&user.id, &bill_id, &content)?;
            print_json(&comment)
        }
        Commands::DeleteComment { comment_id } => {
            let user = ctx.require_user()?;
            ctx.db.delete_comment(&user.id, comment_id)?;
            info!("Comment {comment_id} deleted by {}", user.id);
            print_json(&serde_json::json!({ "deleted": comment_id }))
        }
        Commands::Comments { bill_id } => print_json(&ctx.db.comments_for_bill(&bill_id)?),
        Commands::Contact { bill_id } => {
            let detail = ctx.legiscan.get_bill(&bill_id).await?;
            let sponsors = contact::sponsors_from_detail(&detail);
            if !sponsors.is_empty() {
                ctx.db
                    .import_sponsors(&bill_id, &sponsors)
                    .context("failed to store sponsors")?;
            }
            print_json(&contact::contact_cards(ctx.db.as_ref(), &detail.bill)?)
        }
        Commands::Share { bill_id, origin } => {
            let bill = ctx.legiscan.get_bill(&bill_id).await?.bill;
            print_json(&share::share_links(&origin, &bill)?)
        }
    }
}

async fn set_saved(ctx: &Ctx, bill_id: &str, target: bool) -> anyhow::Result<()> {
    let user = ctx.require_user()?;
    let current = ctx.db.is_saved(&user.id, bill_id)?;
    if current == target {
        info!("Bill {bill_id} already in requested saved state ({target})");
        return print_json(&DisplayValue::Saved(current));
    }
    let cmd = UserCommand::ToggleSave {
        bill_id: bill_id.to_string(),
    };
    let value = reconcile_once(ctx, user, bill_id, DisplayValue::Saved(current), cmd).await?;
    print_json(&value)
}

/// Drive one toggle through the reconciler event loop and wait for it to
/// settle. Returns the committed value, or the error it was rolled back with.
async fn reconcile_once(
    ctx: &Ctx,
    user: User,
    bill_id: &str,
    initial: DisplayValue,
    cmd: UserCommand,
) -> anyhow::Result<DisplayValue> {
    let (cmd_tx, cmd_rx) = mpsc::channel(8);
    let (ui_tx, mut ui_rx) = mpsc::channel(32);
    let handle = tokio::spawn(app::run(
        cmd_rx,
        ui_tx,
        Reconciler::new(user),
        Arc::new(RepositoryRemote::new(ctx.db.clone())),
        RetryPolicy::from(&ctx.config.reconciler),
    ));

    cmd_tx
        .send(UserCommand::Attach {
            bill_id: bill_id.to_string(),
            initial,
        })
        .await?;
    cmd_tx.send(cmd).await?;

    let mut displayed = initial;
    let outcome = loop {
        match ui_rx.recv().await {
            Some(UiUpdate::Display { value, .. }) => displayed = value,
            Some(UiUpdate::Invalidate(_)) => break Ok(displayed),
            Some(UiUpdate::Notify(n)) => break Err(anyhow::anyhow!(n.message)),
            Some(UiUpdate::Detached(_)) => {}
            None => break Err(anyhow::anyhow!("event loop stopped unexpectedly")),
        }
    };

    if cmd_tx.send(UserCommand::Quit).await.is_err() {
        warn!("Event loop already stopped");
    }
    handle.await.context("event loop task panicked")??;
    outcome
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Initialize tracing to log to a file (stdout carries command output).
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("civicfeed.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("civicfeed=info,civic_app=info,civic_legiscan=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}

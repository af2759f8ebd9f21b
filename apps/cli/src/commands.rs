//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use stargazer_core::checkpoint::CheckpointWriter;
use stargazer_core::enrich::{self, EnrichOptions};
use stargazer_core::extract::{self, ExtractOptions};
use stargazer_core::llm_pass::{self, LlmPassOptions};
use stargazer_core::merge::{self, MergeOptions};
use stargazer_core::progress::PassProgress;
use stargazer_core::search::{self, SearchOptions};
use stargazer_core::{snapshot, SharedBatch};
use stargazer_github::{fetch_stargazers, FetchOptions, FetchProgress, GithubClient, RepoRef};
use stargazer_linkedin::{BrowserOptions, BrowserSession, LlmConfig, LlmFinder, LoginMethod};
use stargazer_shared::{
    file_timestamp, init_config, load_config, resolve_credential, AppConfig, BatchLabel,
    NonInteractiveGate, OperatorGate, StarEvent,
};

use crate::gate::ConsoleGate;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// stargazer — collect and enrich a repository's stargazers.
#[derive(Parser)]
#[command(
    name = "stargazer",
    version,
    about = "Collect a GitHub repository's stargazers and enrich them with profile and LinkedIn data.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Fetch a repository's stargazers and enrich them with profile data.
    Fetch {
        /// Repository as `owner/name` or a github.com URL.
        repo: String,

        /// GitHub API token (falls back to the configured env var).
        #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// Output file prefix.
        #[arg(short, long, default_value = "stargazers")]
        output: String,

        /// Maximum number of stargazers to collect.
        #[arg(short, long)]
        limit: Option<usize>,

        /// Number of stargazers to skip from the start.
        #[arg(short, long, default_value_t = 0)]
        skip: usize,

        /// Batch size; combined with --batch-number it computes skip/limit.
        #[arg(long)]
        batch_size: Option<usize>,

        /// 1-based batch number; requires --batch-size.
        #[arg(long, requires = "batch_size")]
        batch_number: Option<usize>,

        /// Reuse a previously saved raw snapshot instead of the API.
        #[arg(long)]
        use_existing: Option<PathBuf>,

        /// Keep only the per-star data, skipping the per-user profile calls.
        #[arg(long)]
        skip_enrichment: bool,
    },

    /// Scan enriched records for LinkedIn URLs in their profile fields.
    Extract {
        /// Records file (JSON) produced by `fetch`.
        input: PathBuf,

        /// Output path; defaults to rewriting the input file.
        #[arg(long)]
        out: Option<PathBuf>,

        /// Also fetch each user's GitHub profile page and scan its HTML.
        #[arg(long)]
        deep: bool,
    },

    /// Search the web for LinkedIn profiles with a real browser session.
    Search {
        /// Records file (JSON) to enrich in place.
        input: PathBuf,

        /// Output file prefix.
        #[arg(short, long, default_value = "stargazers")]
        output: String,

        /// Run the browser without a visible window.
        #[arg(long)]
        headless: bool,

        /// Log in by hand in the browser window before searching.
        #[arg(long, conflicts_with_all = ["linkedin_username", "linkedin_password"])]
        manual_login: bool,

        /// LinkedIn username for automated login.
        #[arg(long, env = "LINKEDIN_USERNAME")]
        linkedin_username: Option<String>,

        /// LinkedIn password for automated login.
        #[arg(long, env = "LINKEDIN_PASSWORD", hide_env_values = true)]
        linkedin_password: Option<String>,

        /// Stop after this many lookups.
        #[arg(short, long)]
        limit: Option<usize>,

        /// Never prompt; skip manual verification steps and operator gates.
        #[arg(long)]
        no_interactive: bool,
    },

    /// Ask an LLM for profiles the cheaper passes could not find.
    Llm {
        /// Records file (JSON) to enrich in place.
        input: PathBuf,

        /// Output file prefix.
        #[arg(short, long, default_value = "stargazers")]
        output: String,

        /// Model override (defaults to the configured model).
        #[arg(long)]
        model: Option<String>,

        /// Stop after this many requests.
        #[arg(short, long)]
        limit: Option<usize>,

        /// Re-ask records a previous run already answered for.
        #[arg(long)]
        include_existing: bool,
    },

    /// Merge per-batch result files into one collection.
    Merge {
        /// Glob pattern selecting the batch files.
        #[arg(short, long)]
        pattern: Option<String>,

        /// Output file prefix.
        #[arg(short, long, default_value = "stargazers")]
        output: String,

        /// Concatenate without de-duplicating by username.
        #[arg(long)]
        concat: bool,
    },

    /// Convert a records file between JSON and CSV.
    Convert {
        /// Input file (.json or .csv).
        input: PathBuf,

        /// Output file; the extension picks the format.
        output: PathBuf,
    },

    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Fetch {
            repo,
            token,
            output,
            limit,
            skip,
            batch_size,
            batch_number,
            use_existing,
            skip_enrichment,
        } => {
            cmd_fetch(FetchArgs {
                repo,
                token,
                output,
                limit,
                skip,
                batch_size,
                batch_number,
                use_existing,
                skip_enrichment,
            })
            .await
        }
        Command::Extract { input, out, deep } => cmd_extract(&input, out.as_deref(), deep).await,
        Command::Search {
            input,
            output,
            headless,
            manual_login,
            linkedin_username,
            linkedin_password,
            limit,
            no_interactive,
        } => {
            cmd_search(SearchArgs {
                input,
                output,
                headless,
                manual_login,
                linkedin_username,
                linkedin_password,
                limit,
                no_interactive,
            })
            .await
        }
        Command::Llm {
            input,
            output,
            model,
            limit,
            include_existing,
        } => cmd_llm(&input, &output, model, limit, include_existing).await,
        Command::Merge {
            pattern,
            output,
            concat,
        } => cmd_merge(pattern, &output, concat),
        Command::Convert { input, output } => cmd_convert(&input, &output),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// fetch
// ---------------------------------------------------------------------------

struct FetchArgs {
    repo: String,
    token: Option<String>,
    output: String,
    limit: Option<usize>,
    skip: usize,
    batch_size: Option<usize>,
    batch_number: Option<usize>,
    use_existing: Option<PathBuf>,
    skip_enrichment: bool,
}

async fn cmd_fetch(args: FetchArgs) -> Result<()> {
    let config = load_config()?;

    // --batch-size/--batch-number computes its own skip/limit window.
    let (skip, limit) = match (args.batch_size, args.batch_number) {
        (Some(size), Some(n)) => ((n.max(1) - 1) * size, Some(size)),
        (Some(size), None) => (args.skip, Some(size)),
        _ => (args.skip, args.limit),
    };
    let label = BatchLabel::from_args(skip, limit, args.batch_number);
    let suffix = label.file_suffix();

    let token = match args.token {
        Some(t) => Some(t),
        None => {
            let resolved = resolve_credential(&config.github.token_env).ok();
            if resolved.is_none() {
                warn!(
                    var = %config.github.token_env,
                    "no API token; unauthenticated requests have very low rate limits"
                );
            }
            resolved
        }
    };

    let repo = RepoRef::parse(&args.repo)?;
    let client = GithubClient::new(&config.github.api_base, token)?;
    let reporter = CliProgress::new();

    if let Some(batch) = label.name() {
        info!(%repo, batch = %batch, skip, ?limit, "fetching stargazers");
    } else {
        info!(%repo, skip, ?limit, "fetching stargazers");
    }

    let fetch_opts = FetchOptions {
        skip,
        limit,
        use_existing: args.use_existing,
        politeness: Duration::from_millis(config.rates.politeness_ms),
    };

    let events = tokio::select! {
        fetched = fetch_stargazers(&client, &repo, &fetch_opts, &reporter) => fetched?,
        _ = tokio::signal::ctrl_c() => {
            reporter.finish();
            eprintln!("Interrupted before any records were collected.");
            std::process::exit(1);
        }
    };

    let raw_path = PathBuf::from(format!(
        "{}_raw{}_{}.json",
        args.output,
        suffix,
        file_timestamp()
    ));
    write_events(&raw_path, &events)?;

    let records = if args.skip_enrichment {
        enrich::records_from_events(&events)
    } else {
        let batch = stargazer_core::new_shared_batch();
        let checkpoint = CheckpointWriter::new(".", &args.output, &suffix, 10);
        let enrich_opts = EnrichOptions {
            politeness: Duration::from_millis(config.rates.politeness_ms),
            item_backoff: Duration::from_secs(config.rates.item_backoff_secs),
        };

        tokio::select! {
            outcome = enrich::enrich_profiles(
                &client, &events, &batch, &checkpoint, &reporter, &enrich_opts,
            ) => {
                if let Err(e) = outcome {
                    reporter.finish();
                    flush_interrupted(&batch, &args.output, &suffix);
                    return Err(e.into());
                }
            }
            _ = tokio::signal::ctrl_c() => {
                reporter.finish();
                flush_interrupted(&batch, &args.output, &suffix);
                std::process::exit(1);
            }
        }
        stargazer_core::drain_shared_batch(&batch)
    };

    let enriched_path = PathBuf::from(format!(
        "{}_enriched{}_{}.json",
        args.output,
        suffix,
        file_timestamp()
    ));
    snapshot::write_json(&enriched_path, &records)?;
    reporter.finish();

    println!();
    println!("  Stargazers collected!");
    println!("  Repository: {repo}");
    if let Some(batch) = label.name() {
        println!("  Batch:      {batch}");
    }
    println!("  Stars:      {}", events.len());
    println!("  Records:    {}", records.len());
    println!("  Raw:        {}", raw_path.display());
    println!("  Enriched:   {}", enriched_path.display());
    println!();

    Ok(())
}

/// Write whatever the accumulator holds so an interrupted run loses nothing.
fn flush_interrupted(batch: &SharedBatch, output: &str, suffix: &str) {
    let records = stargazer_core::drain_shared_batch(batch);
    if records.is_empty() {
        eprintln!("Interrupted before any records were collected.");
        return;
    }
    let path = PathBuf::from(format!(
        "{output}_interrupted{suffix}_{}.json",
        file_timestamp()
    ));
    match snapshot::write_json(&path, &records) {
        Ok(()) => eprintln!(
            "Interrupted: saved {} partial records to {}",
            records.len(),
            path.display()
        ),
        Err(e) => eprintln!("Interrupted, and saving partial records failed: {e}"),
    }
}

fn write_events(path: &Path, events: &[StarEvent]) -> Result<()> {
    let json = serde_json::to_string_pretty(events)?;
    std::fs::write(path, json).map_err(|e| eyre!("write {}: {e}", path.display()))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// extract
// ---------------------------------------------------------------------------

async fn cmd_extract(input: &Path, out: Option<&Path>, deep: bool) -> Result<()> {
    let mut records = snapshot::load_records(input)?;
    let http = reqwest_client()?;
    let reporter = CliProgress::new();

    let stats = extract::extract_urls(
        &mut records,
        &http,
        &ExtractOptions { deep },
        &reporter,
    )
    .await;
    reporter.finish();

    let out_path = out.unwrap_or(input);
    snapshot::write_json(out_path, &records)?;

    println!();
    println!("  LinkedIn URL extraction done!");
    println!("  Scanned:      {}", stats.scanned);
    println!("  Matched:      {}", stats.matched);
    if deep {
        println!("  Deep matches: {}", stats.deep_matched);
    }
    println!("  Output:       {}", out_path.display());
    println!();

    Ok(())
}

fn reqwest_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("stargazer/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(15))
        .build()
        .map_err(|e| eyre!("http client: {e}"))
}

// ---------------------------------------------------------------------------
// search
// ---------------------------------------------------------------------------

struct SearchArgs {
    input: PathBuf,
    output: String,
    headless: bool,
    manual_login: bool,
    linkedin_username: Option<String>,
    linkedin_password: Option<String>,
    limit: Option<usize>,
    no_interactive: bool,
}

async fn cmd_search(args: SearchArgs) -> Result<()> {
    let config = load_config()?;
    let mut records = snapshot::load_records(&args.input)?;

    let login = if args.manual_login {
        LoginMethod::Manual
    } else {
        match (args.linkedin_username, args.linkedin_password) {
            (Some(username), Some(password)) => LoginMethod::Credentials { username, password },
            (Some(_), None) | (None, Some(_)) => {
                return Err(eyre!(
                    "both --linkedin-username and --linkedin-password are required for automated login"
                ));
            }
            (None, None) => LoginMethod::None,
        }
    };

    if args.manual_login && args.headless {
        return Err(eyre!("--manual-login needs a visible browser window"));
    }

    let gate: Box<dyn OperatorGate> = if args.no_interactive {
        Box::new(NonInteractiveGate)
    } else {
        Box::new(ConsoleGate)
    };

    let browser_opts = BrowserOptions {
        headless: args.headless,
        interactive: !args.no_interactive,
    };
    let mut session = BrowserSession::launch(&browser_opts).await?;
    let logged_in = match session.login(&login, gate.as_ref()).await {
        Ok(logged_in) => logged_in,
        Err(e) => {
            session.shutdown().await;
            return Err(e.into());
        }
    };
    if !logged_in && !matches!(login, LoginMethod::None) {
        session.shutdown().await;
        return Err(eyre!("LinkedIn login did not complete"));
    }

    let checkpoint = CheckpointWriter::new(".", &args.output, "", 5);
    let search_opts = SearchOptions {
        max_consecutive_errors: config.rates.max_consecutive_errors,
        limit: args.limit,
        ..SearchOptions::default()
    };
    let reporter = CliProgress::new();

    let interrupted = tokio::select! {
        _ = search::search_profiles(
            &session, gate.as_ref(), &mut records, &checkpoint, &reporter, &search_opts,
        ) => false,
        _ = tokio::signal::ctrl_c() => true,
    };
    reporter.finish();
    session.shutdown().await;

    if interrupted {
        // Everything processed before the interrupt is already in `records`.
        let path = PathBuf::from(format!(
            "{}_interrupted_{}.json",
            args.output,
            file_timestamp()
        ));
        snapshot::write_json(&path, &records)?;
        eprintln!("Interrupted: saved progress to {}", path.display());
        std::process::exit(1);
    }

    let out_path = PathBuf::from(format!(
        "{}_enriched_{}.json",
        args.output,
        file_timestamp()
    ));
    snapshot::write_json(&out_path, &records)?;

    let found = records
        .iter()
        .filter(|r| r.linkedin_url_guess.as_deref().is_some_and(|u| !u.is_empty()))
        .count();
    println!();
    println!("  LinkedIn search done!");
    println!("  Records: {}", records.len());
    println!("  Found:   {found}");
    println!("  Output:  {}", out_path.display());
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// llm
// ---------------------------------------------------------------------------

async fn cmd_llm(
    input: &Path,
    output: &str,
    model: Option<String>,
    limit: Option<usize>,
    include_existing: bool,
) -> Result<()> {
    let config = load_config()?;
    let mut records = snapshot::load_records(input)?;

    let api_key = resolve_credential(&config.openai.api_key_env)?;
    let finder = LlmFinder::with_prompt_file(
        LlmConfig {
            endpoint: config.openai.endpoint.clone(),
            api_key,
            model: model.unwrap_or_else(|| config.openai.model.clone()),
        },
        Path::new(&config.openai.prompt_file),
    );

    let checkpoint = CheckpointWriter::new(".", output, "", 10);
    let opts = LlmPassOptions {
        skip_existing: !include_existing,
        limit,
        ..LlmPassOptions::default()
    };
    let reporter = CliProgress::new();

    let interrupted = tokio::select! {
        stats = llm_pass::llm_find_profiles(
            &finder, &mut records, &checkpoint, &reporter, &opts,
        ) => {
            reporter.finish();
            println!();
            println!("  LLM lookup done!");
            println!("  Asked:   {}", stats.asked);
            println!("  Found:   {}", stats.found);
            println!("  Skipped: {}", stats.skipped);
            println!("  Errors:  {}", stats.errors);
            false
        }
        _ = tokio::signal::ctrl_c() => {
            reporter.finish();
            true
        }
    };

    if interrupted {
        let path = PathBuf::from(format!("{output}_interrupted_{}.json", file_timestamp()));
        snapshot::write_json(&path, &records)?;
        eprintln!("Interrupted: saved progress to {}", path.display());
        std::process::exit(1);
    }

    let out_path = PathBuf::from(format!("{output}_enriched_{}.json", file_timestamp()));
    snapshot::write_json(&out_path, &records)?;
    println!("  Output:  {}", out_path.display());
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// merge / convert
// ---------------------------------------------------------------------------

fn cmd_merge(pattern: Option<String>, output: &str, concat: bool) -> Result<()> {
    let config = load_config()?;
    let opts = MergeOptions {
        pattern: pattern.unwrap_or_else(|| config.merge.pattern.clone()),
        output_prefix: output.to_string(),
        concat: concat || config.merge.concat,
    };

    match merge::merge_batches(&opts)? {
        Some(outcome) => {
            println!();
            println!("  Batches merged!");
            println!("  Files:   {}", outcome.files_merged);
            println!("  Read:    {}", outcome.records_in);
            println!("  Written: {}", outcome.records_out);
            println!("  Output:  {}", outcome.output_path.display());
            println!();
        }
        None => {
            println!("No files matched '{}'; nothing to merge.", opts.pattern);
        }
    }
    Ok(())
}

fn cmd_convert(input: &Path, output: &Path) -> Result<()> {
    let records = snapshot::load_records(input)?;
    snapshot::write_records(output, &records)?;
    println!(
        "Converted {} records: {} -> {}",
        records.len(),
        input.display(),
        output.display()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl PassProgress for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn item(&self, current: usize, total: usize, detail: &str) {
        self.spinner
            .set_message(format!("[{current}/{total}] {detail}"));
    }

    fn note(&self, message: &str) {
        self.spinner.println(message);
    }
}

impl FetchProgress for CliProgress {
    fn page_fetched(&self, page: usize, accumulated: usize) {
        self.spinner
            .set_message(format!("Fetching page {page} ({accumulated} stars)"));
    }

    fn rate_limited(&self, wait: Duration) {
        self.spinner.println(format!(
            "Rate limit reached, waiting {}s",
            wait.as_secs()
        ));
    }
}

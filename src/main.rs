use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use miette::{Context, IntoDiagnostic, Result};
use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

use diffscribe_core::{ContextInputs, DiffscribeConfig, OutputFormat, ReviewMode};
use diffscribe_review::backend::{CompletionBackend, PullRequestHost};
use diffscribe_review::github::GitHubPullRequest;
use diffscribe_review::llm::LlmClient;
use diffscribe_review::pipeline::{ReviewPipeline, RunSummary};
use diffscribe_review::retry::RetryPolicy;
use diffscribe_review::simulate::{SimulatedHost, SimulatedLlm};

const DEFAULT_CONFIG_PATH: &str = ".diffscribe.toml";

#[derive(Parser)]
#[command(
    name = "diffscribe",
    version,
    about = "Explain pull request changes with an LLM and post the result as PR comments",
    long_about = "diffscribe reads the pull request from the GitHub Actions environment, sends each\n\
                   changed file (or each block of added code) to an OpenAI-compatible model, and\n\
                   posts the explanation back on the pull request.\n\n\
                   Examples:\n  \
                     diffscribe review                     Review the PR from GITHUB_EVENT_PATH\n  \
                     diffscribe review --mode blocks       One comment per block of added code\n  \
                     diffscribe review --simulate          Dry run, no network access\n  \
                     diffscribe doctor                     Check the environment"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .diffscribe.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format for the run summary
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text      Human-readable summary (default)\n  \
                         json      Machine-readable JSON with camelCase keys\n  \
                         markdown  GitHub-flavored Markdown"
    )]
    format: OutputFormat,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Review a pull request and post one comment per file or block
    #[command(long_about = "Review a pull request and post one comment per file or block.\n\n\
        Needs GITHUB_REPOSITORY, GITHUB_TOKEN, OPENAI_API_KEY and either GITHUB_EVENT_PATH\n\
        or --pr. With --simulate none of them are needed and nothing is posted.\n\n\
        Examples:\n  diffscribe review\n  diffscribe review --pr 42 --max-items 10\n  diffscribe review --simulate --mode blocks")]
    Review(ReviewArgs),
    /// Check that the environment is ready for a review run
    Doctor,
    /// Create a default .diffscribe.toml
    Init,
}

#[derive(Args)]
struct ReviewArgs {
    /// Pull request number (overrides the event payload)
    #[arg(long)]
    pr: Option<u64>,

    /// Repository as owner/repo (overrides GITHUB_REPOSITORY)
    #[arg(long)]
    repo: Option<String>,

    /// Path to the GitHub event payload (overrides GITHUB_EVENT_PATH)
    #[arg(long)]
    event_path: Option<PathBuf>,

    /// Review whole files or individual blocks of added code
    #[arg(long)]
    mode: Option<ReviewMode>,

    /// Maximum number of files or blocks to review
    #[arg(long)]
    max_items: Option<usize>,

    /// Items per batch
    #[arg(long)]
    batch_size: Option<usize>,

    /// Seconds to wait between batches
    #[arg(long)]
    batch_delay: Option<u64>,

    /// Chat model name
    #[arg(long)]
    model: Option<String>,

    /// Base URL of an OpenAI-compatible API
    #[arg(long)]
    llm_base_url: Option<String>,

    /// Base URL of the GitHub API
    #[arg(long)]
    github_api_url: Option<String>,

    /// Run against a fabricated pull request without any network access
    #[arg(
        long,
        env = "DIFFSCRIBE_SIMULATE",
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    simulate: bool,
}

impl ReviewArgs {
    fn apply(&self, config: &mut DiffscribeConfig) {
        if let Some(mode) = self.mode {
            config.review.mode = mode;
        }
        if let Some(max) = self.max_items {
            config.review.max_items = max;
        }
        if let Some(size) = self.batch_size {
            config.review.batch_size = size;
        }
        if let Some(delay) = self.batch_delay {
            config.review.batch_delay_secs = delay;
        }
        if let Some(model) = &self.model {
            config.llm.model = model.clone();
        }
        if let Some(url) = &self.llm_base_url {
            config.llm.base_url = Some(url.clone());
        }
        if let Some(url) = &self.github_api_url {
            config.github.api_url = Some(url.clone());
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("info,diffscribe=debug,diffscribe_review=debug,diffscribe_difflens=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<DiffscribeConfig> {
    let mut config = match path {
        Some(path) => DiffscribeConfig::from_file(path)?,
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_PATH);
            if default_path.exists() {
                DiffscribeConfig::from_file(default_path)?
            } else {
                DiffscribeConfig::default()
            }
        }
    };
    config.apply_env()?;
    Ok(config)
}

async fn run_review(args: ReviewArgs, mut config: DiffscribeConfig) -> Result<RunSummary> {
    args.apply(&mut config);
    config.validate()?;

    let (host, llm): (Arc<dyn PullRequestHost>, Arc<dyn CompletionBackend>) = if args.simulate {
        info!("simulation mode: no network calls, nothing will be posted");
        config.review.batch_delay_secs = 0;
        (Arc::new(SimulatedHost::new()), Arc::new(SimulatedLlm::new()))
    } else {
        let mut inputs = ContextInputs::from_env();
        if args.repo.is_some() {
            inputs.repository = args.repo.clone();
        }
        if args.event_path.is_some() {
            inputs.event_path = args.event_path.clone();
        }
        inputs.pr_number = args.pr;
        debug!(?inputs, "resolving run context");

        let ctx = inputs.resolve()?;
        let host = GitHubPullRequest::from_context(&ctx, config.github.api_url.as_deref())?;
        let llm = LlmClient::new(
            &config.llm,
            ctx.openai_api_key.clone(),
            RetryPolicy::from_config(&config.retry),
        )?;
        info!(pr = %ctx.pr_reference(), model = %config.llm.model, "starting review");
        (Arc::new(host), Arc::new(llm))
    };

    let pipeline = ReviewPipeline::new(host, llm, config.review)?.simulated(args.simulate);
    let summary = pipeline.run().await?;
    Ok(summary)
}

fn print_summary(summary: &RunSummary, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(summary).into_diagnostic()?);
        }
        OutputFormat::Markdown => print!("{}", summary.to_markdown()),
        OutputFormat::Text => print!("{summary}"),
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
enum Status {
    Pass,
    Fail,
    Info,
}

impl Status {
    /// Marker printed before a check, ANSI-colored when `color` is set.
    fn marker(self, color: bool) -> String {
        let (glyph, ansi) = match self {
            Status::Pass => ("\u{2713}", 32),
            Status::Fail => ("\u{2717}", 31),
            Status::Info => ("~", 33),
        };
        if color {
            format!("\x1b[{ansi}m{glyph}\x1b[0m")
        } else {
            glyph.to_string()
        }
    }
}

#[derive(serde::Serialize)]
struct Check {
    name: &'static str,
    status: Status,
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
}

impl Check {
    fn new(status: Status, name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status,
            detail: detail.into(),
            hint: None,
        }
    }

    fn failed(name: &'static str, detail: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            hint: Some(hint.into()),
            ..Self::new(Status::Fail, name, detail)
        }
    }
}

fn required_var(name: &'static str, value: Option<&str>, hint: &str) -> Check {
    match value {
        Some(_) => Check::new(Status::Pass, name, format!("{} set", name.to_uppercase())),
        None => Check::failed(name, format!("{} not set", name.to_uppercase()), hint),
    }
}

fn run_doctor(config: &DiffscribeConfig, config_path: &Path, format: OutputFormat) -> Result<()> {
    let inputs = ContextInputs::from_env();
    let mut checks: Vec<Check> = Vec::new();

    if config_path.exists() {
        checks.push(Check::new(
            Status::Pass,
            "config_file",
            format!("{} found", config_path.display()),
        ));
    } else {
        checks.push(Check::new(
            Status::Info,
            "config_file",
            format!("{} not found, using defaults", config_path.display()),
        ));
    }

    match inputs.repository.as_deref().map(diffscribe_core::parse_repo_slug) {
        Some(Ok((owner, repo))) => {
            checks.push(Check::new(
                Status::Pass,
                "github_repository",
                format!("{owner}/{repo}"),
            ));
        }
        Some(Err(e)) => checks.push(Check::failed(
            "github_repository",
            e.to_string(),
            "GITHUB_REPOSITORY must look like owner/repo",
        )),
        None => checks.push(Check::failed(
            "github_repository",
            "GITHUB_REPOSITORY not set",
            "set automatically in GitHub Actions, or pass `review --repo owner/repo`",
        )),
    }

    checks.push(required_var(
        "github_token",
        inputs.github_token.as_deref(),
        "pass secrets.GITHUB_TOKEN in the workflow env",
    ));
    checks.push(required_var(
        "openai_api_key",
        inputs.openai_api_key.as_deref(),
        "export OPENAI_API_KEY=... (repository secret in CI)",
    ));

    match &inputs.event_path {
        Some(path) => match diffscribe_core::pr_number_from_event(path) {
            Ok(number) => checks.push(Check::new(
                Status::Pass,
                "github_event_path",
                format!("pull request #{number}"),
            )),
            Err(e) => checks.push(Check::failed(
                "github_event_path",
                e.to_string(),
                "run on a pull_request event, or pass `review --pr`",
            )),
        },
        None => checks.push(Check::failed(
            "github_event_path",
            "GITHUB_EVENT_PATH not set",
            "set automatically in GitHub Actions, or pass `review --pr`",
        )),
    }

    checks.push(Check::new(
        Status::Info,
        "llm",
        format!(
            "{} at {}",
            config.llm.model,
            config.llm.base_url.as_deref().unwrap_or("https://api.openai.com")
        ),
    ));
    checks.push(Check::new(
        Status::Info,
        "review",
        format!(
            "mode {}, max {} items, batches of {} every {}s",
            config.review.mode,
            config.review.max_items,
            config.review.batch_size,
            config.review.batch_delay_secs
        ),
    ));

    let version = env!("CARGO_PKG_VERSION");
    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "version": version,
                "checks": checks,
            });
            println!("{}", serde_json::to_string_pretty(&json).into_diagnostic()?);
        }
        _ => {
            let use_color =
                std::io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err();
            println!("diffscribe v{version} environment check\n");

            for check in &checks {
                let sym = check.status.marker(use_color);
                let label = check.name.replace('_', " ");
                println!("  {sym} {label:<20} {}", check.detail);
                if let Some(hint) = &check.hint {
                    println!("    hint: {hint}");
                }
            }

            let passed = checks.iter().filter(|c| c.status == Status::Pass).count();
            let failed = checks.iter().filter(|c| c.status == Status::Fail).count();
            let info = checks.iter().filter(|c| c.status == Status::Info).count();
            println!("\n{passed} checks passed, {failed} failed, {info} info");
        }
    }

    Ok(())
}

const DEFAULT_CONFIG: &str = r#"# diffscribe configuration
# Environment variables (MAX_BLOCKS, DIFFSCRIBE_MODE, OPENAI_MODEL, ...)
# override these values; command-line flags override both.

[llm]
# model = "gpt-4o-mini"
# base_url = "https://api.openai.com"
# max_tokens = 400
# temperature = 0.2
# timeout_secs = 120

[review]
# mode = "file"            # or "blocks"
# max_items = 5
# batch_size = 3
# batch_delay_secs = 20
# min_block_lines = 1
# extensions = ["py", "js", "ts", "rs", "go"]
# skip_patterns = ["migrations/**", "*.generated.*"]

[retry]
# max_retries = 3
# base_delay_secs = 10

[github]
# api_url = "https://github.example.com/api/v3"
"#;

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .expect("miette handler");
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        None => {
            println!("diffscribe v{}\n", env!("CARGO_PKG_VERSION"));
            println!("Commands:");
            println!("  review    Explain the pull request changes and post comments");
            println!("  doctor    Check your setup and environment");
            println!("  init      Create default configuration\n");
            println!("Run 'diffscribe <command> --help' for details.");
        }
        Some(Command::Review(args)) => {
            let config = load_config(cli.config.as_deref()).wrap_err("loading configuration")?;
            let summary = run_review(args, config).await?;
            print_summary(&summary, cli.format)?;
        }
        Some(Command::Doctor) => {
            let config_path = cli
                .config
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
            let config = load_config(cli.config.as_deref()).wrap_err("loading configuration")?;
            run_doctor(&config, &config_path, cli.format)?;
        }
        Some(Command::Init) => {
            let path = cli
                .config
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
            if path.exists() {
                miette::bail!("{} already exists", path.display());
            }
            std::fs::write(&path, DEFAULT_CONFIG)
                .into_diagnostic()
                .wrap_err_with(|| format!("writing {}", path.display()))?;
            println!("Created {} with default configuration", path.display());
        }
    }

    Ok(())
}

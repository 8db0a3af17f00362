use chrono::NaiveDate;
use civilog::extract::DebugPolicy;
use civilog::http::HttpClient;
use civilog::llm::OllamaClient;
use civilog::merge::MergeOptions;
use civilog::pipeline::{self, PipelineConfig, StageReport};
use civilog::window::{Window, weekday_of};
use civilog::ArtifactPaths;
use clap::{Args, Parser, Subcommand};
use ollama_rs::Ollama;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "civilog", version, about = "Windowed democracy-event pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Clone)]
struct WindowArgs {
    /// Window start (YYYY-MM-DD); requires --end or --weeks
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Window end (YYYY-MM-DD), inclusive
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Number of weeks covered by the window
    #[arg(long)]
    weeks: Option<u32>,

    /// Week number (week 1 is the short Mon-Fri anchor week)
    #[arg(long)]
    week: Option<u32>,
}

#[derive(Args, Debug, Clone)]
struct CommonArgs {
    /// Root directory for all artifacts
    #[arg(long, default_value = "artifacts")]
    artifacts_root: std::path::PathBuf,

    /// Restrict the run to these source keys
    #[arg(long, value_delimiter = ',')]
    only: Vec<String>,

    /// Skip these source keys
    #[arg(long, value_delimiter = ',')]
    skip: Vec<String>,

    /// Cap on entities extracted per source
    #[arg(long)]
    limit_per_source: Option<usize>,
}

#[derive(Args, Debug, Clone)]
struct LlmArgs {
    /// Base URL for Ollama
    #[arg(long, default_value = "http://localhost:11434")]
    llm_url: String,

    /// Model name
    #[arg(long, default_value = "gemma3n")]
    model: String,

    #[arg(long, default_value_t = 0.2)]
    temperature: f32,

    /// Per-item debug artifacts: never | failures | sample | always
    #[arg(long, default_value = "failures")]
    artifact_policy: String,

    /// Success sampling rate for --artifact-policy sample
    #[arg(long, default_value_t = 0.05)]
    artifact_sample: f64,
}

#[derive(Args, Debug, Clone, Default)]
struct WriteArgs {
    /// Keep only the first N merged events
    #[arg(long)]
    preview: Option<usize>,

    /// Drop events missing title/summary/category/why instead of rendering blanks
    #[arg(long)]
    strict: bool,

    #[arg(long)]
    no_header: bool,

    #[arg(long)]
    no_footer: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Discover and window source items, writing raw + filtered artifacts
    Harvest {
        #[command(flatten)]
        window: WindowArgs,
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Extract events from each filtered pack into per-source envelopes
    Build {
        #[command(flatten)]
        window: WindowArgs,
        #[command(flatten)]
        common: CommonArgs,
        #[command(flatten)]
        llm: LlmArgs,
    },
    /// Merge envelopes into the master event log and indexes
    Write {
        #[command(flatten)]
        window: WindowArgs,
        #[command(flatten)]
        common: CommonArgs,
        #[command(flatten)]
        write: WriteArgs,
    },
    /// Harvest, build, and write in one go
    Run {
        #[command(flatten)]
        window: WindowArgs,
        #[command(flatten)]
        common: CommonArgs,
        #[command(flatten)]
        llm: LlmArgs,
        #[command(flatten)]
        write: WriteArgs,
    },
}

fn config(window: &WindowArgs, common: &CommonArgs, policy: DebugPolicy) -> anyhow::Result<PipelineConfig> {
    let window = Window::resolve(window.start, window.end, window.weeks, window.week)?;
    tracing::info!(
        window = %window,
        starts_on = ?weekday_of(window.start),
        "resolved window"
    );
    Ok(PipelineConfig {
        paths: ArtifactPaths::new(&common.artifacts_root),
        window,
        only: common.only.clone(),
        skip: common.skip.clone(),
        debug_policy: policy,
        limit_per_source: common.limit_per_source,
    })
}

fn llm_client(args: &LlmArgs) -> anyhow::Result<OllamaClient> {
    let ollama = Ollama::try_new(&args.llm_url)?;
    Ok(OllamaClient::new(ollama, &args.model, args.temperature))
}

fn merge_options(w: &WriteArgs) -> MergeOptions {
    MergeOptions {
        only: Vec::new(),
        skip: Vec::new(),
        preview: w.preview,
        strict: w.strict,
        no_header: w.no_header,
        no_footer: w.no_footer,
    }
}

fn finish(report: StageReport) -> anyhow::Result<()> {
    let mut failed = 0;
    for o in &report.outcomes {
        if o.ok {
            tracing::info!(source = %o.source, "{}", o.detail);
        } else {
            failed += 1;
            tracing::error!(source = %o.source, "{}", o.detail);
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} source(s) failed");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let cli = Cli::parse();

    match cli.command {
        Command::Harvest { window, common } => {
            let cfg = config(&window, &common, DebugPolicy::default())?;
            let http = HttpClient::new()?;
            finish(pipeline::run_harvest(&http, &cfg).await?)
        }
        Command::Build { window, common, llm } => {
            let policy = DebugPolicy::parse(&llm.artifact_policy, llm.artifact_sample);
            let cfg = config(&window, &common, policy)?;
            let http = HttpClient::new()?;
            let client = llm_client(&llm)?;
            finish(pipeline::run_build(&client, &http, &cfg).await?)
        }
        Command::Write { window, common, write } => {
            let cfg = config(&window, &common, DebugPolicy::default())?;
            finish(pipeline::run_write(&cfg, &merge_options(&write))?)
        }
        Command::Run {
            window,
            common,
            llm,
            write,
        } => {
            let policy = DebugPolicy::parse(&llm.artifact_policy, llm.artifact_sample);
            let cfg = config(&window, &common, policy)?;
            let http = HttpClient::new()?;
            let client = llm_client(&llm)?;
            finish(pipeline::run_all(&client, &http, &cfg, &merge_options(&write)).await?)
        }
    }
}

//! spanevald - continuous evaluation daemon
//!
//! Every interval: pull the spans that ended since the last cycle from
//! Phoenix, score them for hallucination, QA correctness and retrieval
//! relevance with an LLM judge, write the scores back to Phoenix and mirror
//! the window to Arize. All settings come from the environment; flags exist
//! for local overrides.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use spaneval_core::{init_tracing, CycleScheduler, CycleStatus, LogFormat, PipelineConfig};
use spaneval_judge::{Judge, OpenAiJudge, OpenAiJudgeConfig};
use spaneval_store::{ArizeClient, ArizeConfig, ModelTag, PhoenixClient, PhoenixConfig};
use tracing::{info, Level};

#[derive(Parser, Debug)]
#[command(name = "spanevald")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Continuous LLM evaluation over recorded traces", long_about = None)]
struct Args {
    /// Phoenix base URL
    #[arg(long, env = "PHOENIX_ENDPOINT", default_value = "http://phoenix:6006")]
    phoenix_endpoint: String,

    /// Phoenix project
    #[arg(long, env = "PHOENIX_PROJECT", default_value = "default")]
    phoenix_project: String,

    /// Phoenix bearer token
    #[arg(long, env = "PHOENIX_API_KEY", hide_env_values = true)]
    phoenix_api_key: Option<String>,

    /// Arize bulk span endpoint
    #[arg(
        long,
        env = "ARIZE_ENDPOINT",
        default_value = "https://api.arize.com/v1/spans"
    )]
    arize_endpoint: String,

    #[arg(long, env = "ARIZE_API_KEY", hide_env_values = true)]
    arize_api_key: String,

    #[arg(long, env = "ARIZE_SPACE_KEY", hide_env_values = true)]
    arize_space_key: String,

    #[arg(long, env = "ARIZE_SPACE_ID")]
    arize_space_id: Option<String>,

    /// Model id attached to Arize mirrors (falls back to ARIZE_MODEL_NAME)
    #[arg(long, env = "ARIZE_MODEL_ID")]
    model_id: Option<String>,

    #[arg(long, env = "ARIZE_MODEL_VERSION")]
    model_version: String,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: String,

    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    openai_base_url: String,

    /// Judge model
    #[arg(long, env = "SPANEVAL_JUDGE_MODEL", default_value = "gpt-4-turbo-preview")]
    judge_model: String,

    /// Seconds to sleep between cycles
    #[arg(long, env = "SPANEVAL_CYCLE_INTERVAL_SECS", default_value_t = 60)]
    cycle_interval_secs: u64,

    /// Seconds to wait before the first cycle
    #[arg(long, env = "SPANEVAL_STARTUP_DELAY_SECS", default_value_t = 30)]
    startup_delay_secs: u64,

    /// Cold-start lookback of the first window
    #[arg(long, env = "SPANEVAL_INITIAL_LOOKBACK_SECS", default_value_t = 80)]
    initial_lookback_secs: u64,

    /// Overlap subtracted from the previous window end
    #[arg(long, env = "SPANEVAL_SAFETY_OVERLAP_SECS", default_value_t = 20)]
    safety_overlap_secs: u64,

    /// Window width used when the clock goes backward
    #[arg(long, env = "SPANEVAL_MIN_WINDOW_SECS", default_value_t = 20)]
    min_window_secs: u64,

    /// Concurrent judge calls per evaluator
    #[arg(long, env = "SPANEVAL_JUDGE_CONCURRENCY", default_value_t = 8)]
    judge_concurrency: usize,

    /// Per-request timeout for Phoenix, Arize and the judge
    #[arg(long, env = "SPANEVAL_HTTP_TIMEOUT_SECS", default_value_t = 30)]
    http_timeout_secs: u64,

    /// Log line format: text or json
    #[arg(long, env = "SPANEVAL_LOG_FORMAT", default_value = "text")]
    log_format: LogFormat,

    /// Enable debug logging when RUST_LOG is unset
    #[arg(short, long)]
    verbose: bool,

    /// Run a single cycle immediately and exit
    #[arg(long)]
    once: bool,
}

impl Args {
    fn model_tag(&self) -> Result<ModelTag> {
        let model_id = match &self.model_id {
            Some(id) => id.clone(),
            None => std::env::var("ARIZE_MODEL_NAME")
                .context("ARIZE_MODEL_ID (or ARIZE_MODEL_NAME) must be set")?,
        };
        Ok(ModelTag {
            model_id,
            model_version: self.model_version.clone(),
        })
    }

    fn pipeline_config(&self) -> Result<PipelineConfig> {
        let config = PipelineConfig::new(self.model_tag()?)
            .with_cycle_interval(Duration::from_secs(self.cycle_interval_secs))
            .with_startup_delay(Duration::from_secs(self.startup_delay_secs))
            .with_initial_lookback(Duration::from_secs(self.initial_lookback_secs))
            .with_safety_overlap(Duration::from_secs(self.safety_overlap_secs))
            .with_min_window(Duration::from_secs(self.min_window_secs))
            .with_judge_concurrency(self.judge_concurrency);
        config
            .validate()
            .context("invalid pipeline configuration")?;
        Ok(config)
    }

    fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    fn phoenix_config(&self) -> PhoenixConfig {
        let config = PhoenixConfig::new(&self.phoenix_endpoint, &self.phoenix_project)
            .with_timeout(self.http_timeout());
        match &self.phoenix_api_key {
            Some(key) => config.with_api_key(key),
            None => config,
        }
    }

    fn arize_config(&self) -> ArizeConfig {
        let config = ArizeConfig::new(
            &self.arize_endpoint,
            &self.arize_api_key,
            &self.arize_space_key,
        )
        .with_timeout(self.http_timeout());
        match &self.arize_space_id {
            Some(id) => config.with_space_id(id),
            None => config,
        }
    }

    fn judge_config(&self) -> OpenAiJudgeConfig {
        OpenAiJudgeConfig::new(&self.openai_api_key)
            .with_model(&self.judge_model)
            .with_base_url(&self.openai_base_url)
            .with_timeout(self.http_timeout())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(args.log_format, level);

    let config = args.pipeline_config()?;
    let store = Arc::new(
        PhoenixClient::new(args.phoenix_config()).context("Failed to build Phoenix client")?,
    );
    let sink =
        Arc::new(ArizeClient::new(args.arize_config()).context("Failed to build Arize client")?);
    let judge =
        Arc::new(OpenAiJudge::new(args.judge_config()).context("Failed to build judge client")?);

    info!(
        phoenix = %args.phoenix_endpoint,
        project = %args.phoenix_project,
        model_id = %config.model.model_id,
        model_version = %config.model.model_version,
        judge_model = %judge.model_name(),
        interval_secs = config.cycle_interval.as_secs(),
        "spanevald started"
    );

    let mut scheduler = CycleScheduler::new(&config, store, sink, judge)?;

    if args.once {
        let outcome = scheduler.run_once().await;
        if let CycleStatus::Failed(e) = outcome.status {
            bail!("cycle {} failed: {e}", outcome.cycle_id);
        }
        return Ok(());
    }

    tokio::select! {
        _ = scheduler.run_forever() => {}
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for shutdown signal")?;
            info!("Shutdown signal received");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    const REQUIRED: [&str; 11] = [
        "spanevald",
        "--arize-api-key",
        "ak",
        "--arize-space-key",
        "sk",
        "--model-id",
        "support-bot",
        "--model-version",
        "v1",
        "--openai-api-key",
        "sk-test",
    ];

    #[test]
    fn cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn defaults_build_a_valid_pipeline() {
        let args = Args::try_parse_from(REQUIRED).unwrap();
        let config = args.pipeline_config().unwrap();

        assert_eq!(config.model.model_id, "support-bot");
        assert_eq!(args.phoenix_config().project, args.phoenix_project);
        assert_eq!(args.judge_config().timeout, args.http_timeout());
        assert!(!args.once);
    }

    #[test]
    fn overrides_flow_into_collaborator_configs() {
        let mut argv = REQUIRED.to_vec();
        argv.extend([
            "--arize-space-id",
            "space-42",
            "--phoenix-api-key",
            "px",
            "--http-timeout-secs",
            "5",
            "--log-format",
            "json",
            "--once",
        ]);
        let args = Args::try_parse_from(argv).unwrap();

        assert_eq!(args.arize_config().space_id.as_deref(), Some("space-42"));
        assert_eq!(args.phoenix_config().api_key.as_deref(), Some("px"));
        assert_eq!(args.phoenix_config().timeout, Duration::from_secs(5));
        assert_eq!(args.log_format, LogFormat::Json);
        assert!(args.once);
    }

    #[test]
    fn zero_interval_is_rejected_before_startup() {
        let mut argv = REQUIRED.to_vec();
        argv.extend(["--cycle-interval-secs", "0"]);
        let args = Args::try_parse_from(argv).unwrap();

        let err = args.pipeline_config().unwrap_err();
        assert!(format!("{err:#}").contains("cycle_interval"));
    }
}

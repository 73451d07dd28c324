//! Wiring from configuration and CLI flags to the engines.
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use placelens_common::PlacelensError;
use placelens_common::observability::{LogConfig, LogFormat};
use placelens_config::{
    CaptureConfig, ConfigLoadError, DEFAULT_CONFIG_FILE, LabelSchemeKind, LoggingConfig,
    PlacelensConfig, PlacelensConfigLoader, SearchConfig, VisionConfig, require_secret,
    user_config_path,
};
use placelens_drivers::{CaptureOptions, WebDriverCapturer};
use placelens_llm::aesthetic::{AestheticClassifier, LabelScheme, RetryPolicy};
use placelens_llm::openai::OpenAiVisionClient;
use placelens_maps::{AggregatorConfig, SerpApiMaps};
use placelens_runtime::RateLimiter;
use tokio_util::sync::CancellationToken;

use crate::analyze::{AnalyzeOptions, SiteAnalyzer, run_analyze};
use crate::cli::{Commands, Labels};
use crate::rank::{RankOptions, parse_ladder, rank_file, rank_ladder};
use crate::scrape::{load_queries, run_scrape};

fn config_error(e: ConfigLoadError) -> PlacelensError {
    PlacelensError::Config(e.to_string())
}

/// User config, then `./placelens.yaml` (or `--config`), then env.
pub fn load_config(explicit: Option<&Path>) -> Result<PlacelensConfig, PlacelensError> {
    let mut loader = PlacelensConfigLoader::new();
    if let Some(user) = user_config_path() {
        loader = loader.with_optional_file(user);
    }
    loader = match explicit {
        Some(path) => loader.with_file(path),
        None => loader.with_optional_file(DEFAULT_CONFIG_FILE),
    };
    loader.load().map_err(config_error)
}

pub fn log_config(cfg: &LoggingConfig, verbose: bool) -> LogConfig {
    let format = cfg.format.parse().unwrap_or_else(|e: String| {
        eprintln!("placelens: {e}, falling back to text logs");
        LogFormat::Text
    });
    LogConfig {
        app_name: "placelens",
        log_dir: cfg.dir.clone(),
        emit_stderr: cfg.emit_stderr,
        format,
        default_filter: if verbose { "debug".to_string() } else { cfg.filter.clone() },
    }
}

pub fn label_scheme(kind: LabelSchemeKind, flag: Option<Labels>) -> LabelScheme {
    match flag {
        Some(Labels::Modernity) => LabelScheme::MODERNITY,
        Some(Labels::Beauty) => LabelScheme::BEAUTY,
        None => match kind {
            LabelSchemeKind::Modernity => LabelScheme::MODERNITY,
            LabelSchemeKind::Beauty => LabelScheme::BEAUTY,
        },
    }
}

pub fn aggregator_config(
    cfg: &SearchConfig,
    max_pages: Option<u32>,
    concurrency: Option<usize>,
) -> AggregatorConfig {
    AggregatorConfig {
        inter_query_delay: Duration::from_millis(cfg.inter_query_delay_ms),
        max_pages: max_pages.or(cfg.max_pages),
        concurrency: concurrency.unwrap_or(cfg.concurrency).max(1),
    }
}

pub fn search_client(cfg: &SearchConfig) -> Result<SerpApiMaps, PlacelensError> {
    let key = require_secret(&cfg.api_key, "search.api_key").map_err(config_error)?;
    let client = SerpApiMaps::new(&cfg.endpoint, key)
        .map_err(|e| PlacelensError::Config(format!("search.endpoint: {e}")))?
        .with_engine(cfg.engine.clone())
        .with_timeout(Duration::from_secs(cfg.timeout_secs))
        .with_retries(cfg.retries);
    Ok(client)
}

pub fn capture_options(cfg: &CaptureConfig) -> CaptureOptions {
    CaptureOptions {
        webdriver_url: cfg.webdriver_url.clone(),
        viewport: (cfg.viewport_width, cfg.viewport_height),
        nav_timeout: Duration::from_secs(cfg.nav_timeout_secs),
        settle: Duration::from_millis(cfg.settle_ms),
        scroll_settle: Duration::from_millis(cfg.scroll_settle_ms),
        headless: cfg.headless,
        user_agent: cfg.user_agent.clone(),
    }
}

pub fn classifier(
    cfg: &VisionConfig,
    scheme: LabelScheme,
    cancel: CancellationToken,
) -> Result<AestheticClassifier, PlacelensError> {
    let key = require_secret(&cfg.api_key, "vision.api_key").map_err(config_error)?;
    let client = OpenAiVisionClient::new(&cfg.base_url, key.to_string(), cfg.model.clone())?
        .with_timeout(Duration::from_secs(cfg.timeout_secs))
        .with_app_headers(cfg.referer.as_deref(), Some(cfg.title.as_str()))?;

    let mut classifier = AestheticClassifier::new(Arc::new(client))
        .with_scheme(scheme)
        .with_max_tokens(cfg.max_tokens)
        .with_policy(RetryPolicy {
            max_attempts: cfg.max_attempts,
            base_delay: Duration::from_millis(cfg.base_delay_ms),
        })
        .with_cancellation(cancel);
    if let Some(rpm) = cfg.requests_per_minute {
        classifier = classifier.with_rate_limiter(Arc::new(RateLimiter::per_minute(rpm)));
    }
    Ok(classifier)
}

pub async fn run(command: Commands, cfg: PlacelensConfig, cancel: CancellationToken) -> anyhow::Result<()> {
    match command {
        Commands::Scrape {
            queries,
            output,
            max_pages,
            concurrency,
        } => {
            let source = search_client(&cfg.search)?;
            let queries_list = load_queries(&queries)?;
            if queries_list.is_empty() {
                tracing::info!(file=%queries.display(), "scrape.nothing_to_do");
                println!("{}: no queries, nothing to do", queries.display());
                return Ok(());
            }
            let agg = aggregator_config(&cfg.search, max_pages, concurrency);
            let summary = run_scrape(source, agg, &queries_list, &output, cancel).await?;
            println!("{summary}");
        }

        Commands::Analyze {
            input,
            output,
            limit,
            labels,
            concurrency,
            screenshots_dir,
        } => {
            let scheme = label_scheme(cfg.vision.labels, labels);
            let classifier = classifier(&cfg.vision, scheme, cancel.clone())?;
            let capturer = WebDriverCapturer::new(capture_options(&cfg.capture))
                .with_cancellation(cancel.clone());
            let opts = AnalyzeOptions {
                screenshots_dir: screenshots_dir.unwrap_or_else(|| cfg.capture.screenshots_dir.clone()),
                limit,
                concurrency: concurrency.unwrap_or(cfg.analyze.concurrency).max(1),
            };
            let analyzer = SiteAnalyzer::new(&capturer, &classifier, &opts, cancel);
            let summary = run_analyze(&input, &output, &analyzer).await?;
            println!("{summary}");
        }

        Commands::SortJson {
            input,
            key,
            ascending,
            top,
            ladder,
            prefix,
            suffix,
            output,
        } => {
            if let Some(raw) = ladder {
                let rungs = parse_ladder(&raw)?;
                for summary in rank_ladder(&input, &rungs, &prefix, &suffix, &key)? {
                    println!("{summary}");
                }
            } else {
                let output: PathBuf = output.unwrap_or_else(|| input.clone());
                let opts = RankOptions { key, ascending, top };
                let summary = rank_file(&input, &output, &opts)
                    .with_context(|| format!("sort {}", input.display()))?;
                println!("{summary}");
            }
        }
    }
    Ok(())
}

//! gapscribe is a CLI tool that finds the topics competitors write about and
//! a company does not, using their sitemaps, and drafts blog posts for those
//! gaps in the company's own style.
//!
//! The tool has three commands:
//! 1. `run` - The full pipeline, from sitemaps to exported blog posts
//! 2. `discover` - Sitemaps, keywords and the ranked gap list, without generation
//! 3. `keywords` - Keywords extracted from a single domain

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use env_logger::Builder;
use llm::LLMProvider;
use log::{LevelFilter, info, warn};

use gapscribe::{
    CompletionContext, ExportFormat, KeywordExtractor, SitemapFetcher, TextBy,
    config::{ModelSpec, RunConfig},
    constants::MODEL_API_KEY_ENV_NAME,
    export_all,
    llm::build_rate_limiter,
    ranking::suggested_title,
    retry::RetryPolicy,
    run::{Orchestrator, PipelineOptions, RunState},
};

/// A CLI tool to find competitor keyword gaps and draft blog posts for them
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// The command to execute (run, discover or keywords)
    #[command(subcommand)]
    command: Command,

    #[arg(long, short, action = clap::ArgAction::Count, help = "Output v(v...)erbosity: error (0), warn (1), info (2), debug (3), trace (4)", global = true, default_value_t = 2)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Run the whole pipeline and export the generated posts
    Run {
        #[command(flatten)]
        settings: Settings,
        /// Export formats: json, csv, markdown (default: all)
        #[arg(long = "format", short = 'f')]
        formats: Vec<ExportFormat>,
    },
    /// Fetch sitemaps, extract keywords and print the ranked gaps
    Discover {
        #[command(flatten)]
        settings: Settings,
        /// Number of gaps to print
        #[arg(long, short = 'n', default_value_t = 30)]
        top: usize,
    },
    /// Print the keywords found in one domain's sitemaps
    Keywords {
        /// Domain to read, e.g. example.com
        domain: String,
        /// URL of the LLM model to use for validation
        model: String,
        /// Rate limit: requests per minute (default: no limit)
        #[arg(long, short = 'r')]
        rpm: Option<u32>,
    },
}

#[derive(Args)]
struct Settings {
    /// Path to a JSON config file; flags override its values
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,
    /// Company name
    #[arg(long)]
    company: Option<String>,
    /// Company domain, e.g. example.com
    #[arg(long, short = 'd')]
    domain: Option<String>,
    /// Additional company domain (repeatable)
    #[arg(long = "also")]
    additional_domains: Vec<String>,
    /// Competitor name or domain (repeatable)
    #[arg(long = "competitor")]
    competitors: Vec<String>,
    /// Custom keyword (repeatable)
    #[arg(long = "keyword", short = 'k')]
    keywords: Vec<String>,
    /// URL of the LLM model, e.g. openai://gpt-4o or ollama://llama3
    #[arg(long, short = 'm')]
    model: Option<String>,
    /// Maximum number of blogs to generate
    #[arg(long)]
    max_blogs: Option<usize>,
    /// Minimum keyword frequency
    #[arg(long)]
    min_frequency: Option<u32>,
    /// Minimum words per blog
    #[arg(long)]
    min_words: Option<usize>,
    /// Output directory
    #[arg(long, short = 'o')]
    output_dir: Option<PathBuf>,
    /// Rate limit: requests per minute (default: no limit)
    #[arg(long, short = 'r')]
    rpm: Option<u32>,
    /// Text extraction method: "dom_smoothie" (default) or "fast_html2md"
    #[arg(long, default_value = "dom_smoothie")]
    text_by: TextBy,
    /// Use the model's relevance score in the priority
    #[arg(long)]
    relevance_score: bool,
    /// Look for blog/docs/help subdomains of the company domain
    #[arg(long)]
    subdomains: bool,
}

impl Settings {
    fn into_config(self) -> Result<(RunConfig, TextBy)> {
        let mut config = match &self.config {
            Some(path) => RunConfig::from_file(path)?,
            None => RunConfig::default(),
        };
        if let Some(company) = self.company {
            config.company_name = company;
        }
        if let Some(domain) = self.domain {
            config.company_domain = domain;
        }
        if let Some(model) = self.model {
            config.model = model;
        }
        if let Some(max_blogs) = self.max_blogs {
            config.max_blogs = max_blogs;
        }
        if let Some(min_frequency) = self.min_frequency {
            config.min_keyword_frequency = min_frequency;
        }
        if let Some(min_words) = self.min_words {
            config.min_words = min_words;
        }
        if let Some(output_dir) = self.output_dir {
            config.output_dir = output_dir;
        }
        if self.rpm.is_some() {
            config.requests_per_minute = self.rpm;
        }
        config.additional_domains.extend(self.additional_domains);
        config.competitors.extend(self.competitors);
        config.keywords.extend(self.keywords);
        config.use_relevance_score |= self.relevance_score;
        config.discover_subdomains |= self.subdomains;
        Ok((config, self.text_by))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    Builder::new()
        .filter_level(match cli.verbose {
            0 => LevelFilter::Error,
            1 => LevelFilter::Warn,
            2 => LevelFilter::Info,
            3 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        })
        .init();

    match cli.command {
        Command::Run { settings, formats } => {
            let (mut config, text_by) = settings.into_config()?;
            if !formats.is_empty() {
                config.export_formats = formats;
            }
            handle_run_command(config, text_by, true, 0).await
        }
        Command::Discover { settings, top } => {
            let (config, text_by) = settings.into_config()?;
            handle_run_command(config, text_by, false, top).await
        }
        Command::Keywords { domain, model, rpm } => {
            handle_keywords_command(domain, model, rpm).await
        }
    }
}

fn api_key() -> Option<String> {
    match std::env::var(MODEL_API_KEY_ENV_NAME) {
        Ok(key) => {
            info!("API key is provided");
            Some(key)
        }
        Err(err) => {
            info!("{err} while providing api key");
            None
        }
    }
}

fn build_model(
    model_spec: &ModelSpec,
    api_key: Option<&str>,
    config: &RunConfig,
) -> Result<Box<dyn LLMProvider>> {
    model_spec.builder(api_key, config.max_tokens, config.temperature)?
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build LLM provider: {}", e))
}

fn build_fetcher(config: &RunConfig) -> Result<SitemapFetcher> {
    let retry = RetryPolicy {
        max_retries: config.max_retries,
        ..RetryPolicy::default()
    };
    Ok(SitemapFetcher::new(
        Duration::from_secs(config.timeout_secs),
        retry,
    )?)
}

async fn handle_run_command(
    config: RunConfig,
    text_by: TextBy,
    generate: bool,
    top: usize,
) -> Result<()> {
    let api_key = api_key();
    let model_spec = config.validate(api_key.as_deref())?;
    let model = build_model(&model_spec, api_key.as_deref(), &config)?;
    let fetcher = build_fetcher(&config)?;
    let rate_limiter = build_rate_limiter(config.requests_per_minute);
    let ctx = CompletionContext {
        model: model.as_ref(),
        rate_limiter: rate_limiter.as_ref(),
        retry: RetryPolicy {
            max_retries: config.max_retries,
            ..RetryPolicy::default()
        },
    };
    let options = PipelineOptions {
        text_by,
        ..PipelineOptions::from_config(&config)
    };
    let orchestrator = Orchestrator::new(&ctx, &fetcher, options);

    if generate {
        let state = orchestrator.run_full_pipeline(&config).await?;
        report(&state);
        if state.posts.is_empty() {
            warn!("No posts were generated, nothing to export");
            return Ok(());
        }
        let written = export_all(&state.posts, &config.output_dir, &config.export_formats)?;
        for path in written {
            info!("Wrote {}", path.display());
        }
        return Ok(());
    }

    let mut state = RunState::default();
    state.set_company(
        &config.company_name,
        &config.company_domain,
        &config.additional_domains,
    )?;
    orchestrator.fetch_own_sitemap(&mut state).await;
    orchestrator.add_competitors(&mut state, &config.competitors).await;
    orchestrator.fetch_competitor_sitemaps(&mut state, false).await;
    orchestrator.extract_keywords(&mut state).await;
    orchestrator.rank_gaps(&mut state);
    if !config.keywords.is_empty() {
        orchestrator.add_custom_keywords(&mut state, &config.keywords);
    }
    print_gaps(&state, top);
    report(&state);
    Ok(())
}

async fn handle_keywords_command(domain: String, model: String, rpm: Option<u32>) -> Result<()> {
    let config = RunConfig {
        model,
        requests_per_minute: rpm,
        ..RunConfig::default()
    };
    let api_key = api_key();
    let model_spec = ModelSpec::parse(&config.model)?;
    if model_spec.requires_api_key() && api_key.is_none() {
        anyhow::bail!("Backend {} needs {MODEL_API_KEY_ENV_NAME}", model_spec.backend);
    }
    let model = build_model(&model_spec, api_key.as_deref(), &config)?;
    let fetcher = build_fetcher(&config)?;
    let rate_limiter = build_rate_limiter(rpm);
    let ctx = CompletionContext {
        model: model.as_ref(),
        rate_limiter: rate_limiter.as_ref(),
        retry: RetryPolicy::default(),
    };

    let fetch = fetcher.fetch_domain(&domain).await;
    if let Some(failure) = &fetch.failure {
        warn!("{failure}");
    }
    let brand = fetch.domain.split('.').next().unwrap_or_default().to_owned();
    let extraction = KeywordExtractor::new(&ctx)
        .extract(&fetch.domain, &brand, &fetch.entries, None)
        .await;
    let mut keywords = extraction.keywords;
    keywords.sort_by(|a, b| b.frequency.cmp(&a.frequency).then_with(|| a.phrase.cmp(&b.phrase)));
    for keyword in keywords {
        let content_type = format!("{:?}", keyword.content_type);
        println!("{:>4}  {content_type:<12} {}", keyword.frequency, keyword.phrase);
    }
    Ok(())
}

fn print_gaps(state: &RunState, top: usize) {
    let year = chrono::Datelike::year(&chrono::Utc::now());
    for (index, keyword) in state.gaps.iter().take(top).enumerate() {
        println!(
            "{:>3}. {:<40} priority {:>6.1}  freq {:>3}  competitors {}  | {}",
            index + 1,
            keyword.phrase,
            keyword.priority().unwrap_or_default(),
            keyword.frequency,
            keyword.competitor_count,
            suggested_title(&keyword.phrase, keyword.content_type, year)
        );
    }
}

fn report(state: &RunState) {
    for failure in &state.failures {
        warn!(
            "Failed \"{}\" at {}: {}",
            failure.keyword, failure.stage, failure.reason
        );
    }
    let warnings = state
        .posts
        .iter()
        .filter(|post| !post.status.is_clean())
        .count();
    info!(
        "{} gaps, {} posts ({warnings} with warnings), {} failed, {} notes",
        state.gaps.len(),
        state.posts.len(),
        state.failures.len(),
        state.notes.len()
    );
}


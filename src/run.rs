//! The run module sequences the pipeline over an explicit [`RunState`].
//!
//! Each step caches its output in the state, so a step can be repeated
//! without redoing the ones before it: adding a custom keyword re-ranks
//! without fetching any sitemap again.

use std::collections::{BTreeMap, BTreeSet};

use log::{info, warn};

use crate::TextBy;
use crate::config::RunConfig;
use crate::error::GapError;
use crate::generator::{BlogGenerator, BlogPost, GenerationOutcome, GeneratorOptions, Stage};
use crate::keywords::{KEYWORD_BATCH_SIZE, Keyword, KeywordExtractor, compact_phrase};
use crate::llm::CompletionContext;
use crate::ranking::{CUSTOM_KEYWORD_SCORE, RankOptions, ScoreSource, rank};
use crate::sitemap::{
    CompetitorDomain, SiteEntry, SitemapFetcher, find_subdomains, is_valid_domain,
    normalize_domain, resolve_domains,
};
use crate::style::{StyleAnalyzer, StyleProfile};

/// A keyword whose blog could not be generated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenerationFailure {
    pub keyword: String,
    pub stage: Stage,
    pub reason: String,
}

/// Everything one session has fetched, learned and generated.
#[derive(Debug, Default)]
pub struct RunState {
    pub company_name: String,
    /// Normalized company domain; keywords found there are not gaps.
    pub company_domain: String,
    /// Company domain as given, used for fetching.
    pub company_address: String,
    pub additional_domains: Vec<String>,
    pub own_entries: Vec<SiteEntry>,
    pub style: Option<StyleProfile>,
    pub competitors: Vec<CompetitorDomain>,
    /// Entries per competitor domain; a present key means "already fetched".
    pub competitor_entries: BTreeMap<String, Vec<SiteEntry>>,
    /// Extracted keywords per domain, the company domain included.
    pub domain_keywords: BTreeMap<String, Vec<Keyword>>,
    pub custom_keywords: Vec<Keyword>,
    /// Ranked gap list.
    pub gaps: Vec<Keyword>,
    pub posts: Vec<BlogPost>,
    pub failures: Vec<GenerationFailure>,
    /// Non-fatal problems met along the way.
    pub notes: Vec<String>,
}

impl RunState {
    /// Records the company. Cached results of earlier runs are dropped when
    /// the domain changes.
    ///
    /// # Errors
    ///
    /// Returns [`GapError::Configuration`] for an empty name or an invalid domain.
    pub fn set_company(
        &mut self,
        name: &str,
        domain: &str,
        additional_domains: &[String],
    ) -> Result<(), GapError> {
        if name.trim().is_empty() {
            return Err(GapError::Configuration("company name is empty".to_owned()));
        }
        if let Some(invalid) = std::iter::once(domain)
            .chain(additional_domains.iter().map(String::as_str))
            .find(|domain| !is_valid_domain(domain))
        {
            return Err(GapError::Configuration(format!("invalid domain {invalid:?}")));
        }

        let normalized = normalize_domain(domain);
        if self.company_domain != normalized {
            *self = RunState::default();
        }
        self.company_name = name.trim().to_owned();
        self.company_domain = normalized;
        self.company_address = domain.trim().trim_end_matches('/').to_owned();
        self.additional_domains = additional_domains.to_vec();
        info!("Company: {} ({})", self.company_name, self.company_domain);
        Ok(())
    }

    pub fn note(&mut self, note: impl Into<String>) {
        let note = note.into();
        warn!("{note}");
        self.notes.push(note);
    }

    /// Selects the `count` highest ranked gaps and deselects the rest.
    pub fn select_top(&mut self, count: usize) -> usize {
        for (index, keyword) in self.gaps.iter_mut().enumerate() {
            keyword.selected = index < count;
        }
        self.selected().len()
    }

    /// Selects gaps by position in the ranked list; out-of-range indices
    /// are ignored. Returns how many were newly selected.
    pub fn select(&mut self, indices: &[usize]) -> usize {
        let mut newly_selected = 0;
        for index in indices {
            if let Some(keyword) = self.gaps.get_mut(*index)
                && !keyword.selected
            {
                keyword.selected = true;
                newly_selected += 1;
            }
        }
        newly_selected
    }

    pub fn deselect_all(&mut self) {
        for keyword in &mut self.gaps {
            keyword.selected = false;
        }
    }

    /// Selected gaps in ranked order.
    pub fn selected(&self) -> Vec<&Keyword> {
        self.gaps.iter().filter(|keyword| keyword.selected).collect()
    }
}

/// Knobs of every pipeline step.
#[derive(Clone, Debug)]
pub struct PipelineOptions {
    pub rank: RankOptions,
    pub generator: GeneratorOptions,
    pub style_sample_size: usize,
    pub text_by: TextBy,
    pub discover_subdomains: bool,
    pub keyword_batch_size: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            rank: RankOptions::default(),
            generator: GeneratorOptions::default(),
            style_sample_size: 20,
            text_by: TextBy::default(),
            discover_subdomains: false,
            keyword_batch_size: KEYWORD_BATCH_SIZE,
        }
    }
}

impl PipelineOptions {
    pub fn from_config(config: &RunConfig) -> Self {
        let defaults = Self::default();
        Self {
            rank: RankOptions {
                min_frequency: config.min_keyword_frequency,
                score_source: if config.use_relevance_score {
                    ScoreSource::Relevance
                } else {
                    ScoreSource::Default
                },
                ..RankOptions::default()
            },
            generator: GeneratorOptions {
                min_words: config.min_words,
                max_expansion_attempts: config.max_expansion_attempts,
                ..defaults.generator
            },
            style_sample_size: config.style_sample_size,
            discover_subdomains: config.discover_subdomains,
            ..defaults
        }
    }
}

/// Runs pipeline steps against a [`RunState`].
pub struct Orchestrator<'a> {
    ctx: &'a CompletionContext<'a>,
    fetcher: &'a SitemapFetcher,
    options: PipelineOptions,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        ctx: &'a CompletionContext<'a>,
        fetcher: &'a SitemapFetcher,
        options: PipelineOptions,
    ) -> Self {
        Self {
            ctx,
            fetcher,
            options,
        }
    }

    /// Fetches the company's own sitemaps: the main domain, the additional
    /// domains and, when enabled, discovered content subdomains.
    pub async fn fetch_own_sitemap(&self, state: &mut RunState) {
        let mut addresses = vec![state.company_address.clone()];
        addresses.extend(state.additional_domains.iter().cloned());
        if self.options.discover_subdomains {
            addresses.extend(find_subdomains(self.ctx, self.fetcher, &state.company_domain).await);
        }

        let mut seen: BTreeSet<String> = BTreeSet::new();
        state.own_entries.clear();
        for address in addresses {
            if !seen.insert(normalize_domain(&address)) {
                continue;
            }
            let fetch = self.fetcher.fetch_domain(&address).await;
            if let Some(failure) = fetch.failure {
                state.note(format!("{}: {failure}", fetch.domain));
            }
            let mut urls: BTreeSet<String> =
                state.own_entries.iter().map(|entry| entry.url.to_string()).collect();
            for entry in fetch.entries {
                if urls.insert(entry.url.to_string()) {
                    state.own_entries.push(entry);
                }
            }
        }
        info!("Company sitemaps: {} content pages", state.own_entries.len());
    }

    /// Learns the writing style, link map and product context.
    pub async fn learn_style(&self, state: &mut RunState) {
        let analyzer = StyleAnalyzer::new(self.ctx, self.fetcher)
            .with_sample_size(self.options.style_sample_size)
            .with_text_by(self.options.text_by);
        let profile = analyzer.analyze(&state.own_entries).await;
        if !profile.has_signal {
            state.note("No writing style learned, drafts use the default tone");
        }
        state.style = Some(profile);
    }

    /// Resolves competitor names to domains and adds the new ones.
    pub async fn add_competitors(&self, state: &mut RunState, names: &[String]) {
        let resolution = resolve_domains(self.ctx, names).await;
        for name in resolution.unresolved {
            state.note(format!("Could not resolve a domain for competitor {name:?}"));
        }
        for competitor in resolution.resolved {
            if competitor.domain == state.company_domain {
                state.note(format!("{} is the company domain, not a competitor", competitor.name));
                continue;
            }
            if state
                .competitors
                .iter()
                .all(|known| known.domain != competitor.domain)
            {
                info!("Competitor {} -> {}", competitor.name, competitor.domain);
                state.competitors.push(competitor);
            }
        }
    }

    /// Fetches every competitor sitemap not fetched yet, or all of them when
    /// `force` is set. A failing domain is noted and skipped.
    pub async fn fetch_competitor_sitemaps(&self, state: &mut RunState, force: bool) {
        let competitors = state.competitors.clone();
        for competitor in competitors {
            if !force && state.competitor_entries.contains_key(&competitor.domain) {
                continue;
            }
            let fetch = self.fetcher.fetch_domain(&competitor.address).await;
            if let Some(failure) = fetch.failure {
                state.note(format!("{}: {failure}", competitor.domain));
            }
            state.domain_keywords.remove(&competitor.domain);
            state
                .competitor_entries
                .insert(competitor.domain.clone(), fetch.entries);
        }
    }

    /// Extracts keywords for the company and every fetched competitor that
    /// has no keywords yet.
    pub async fn extract_keywords(&self, state: &mut RunState) {
        let extractor =
            KeywordExtractor::new(self.ctx).with_batch_size(self.options.keyword_batch_size);

        if !state.domain_keywords.contains_key(&state.company_domain) {
            let extraction = extractor
                .extract(
                    &state.company_domain,
                    &state.company_name,
                    &state.own_entries,
                    None,
                )
                .await;
            if extraction.degraded() {
                state.note(format!(
                    "{}: {} keyword batches without AI validation",
                    state.company_domain, extraction.degraded_batches
                ));
            }
            state
                .domain_keywords
                .insert(state.company_domain.clone(), extraction.keywords);
        }

        let competitors = state.competitors.clone();
        for competitor in competitors {
            if state.domain_keywords.contains_key(&competitor.domain) {
                continue;
            }
            let Some(entries) = state.competitor_entries.get(&competitor.domain) else {
                continue;
            };
            let extraction = extractor
                .extract(
                    &competitor.domain,
                    &brand_name(&competitor),
                    entries,
                    Some(&state.company_name),
                )
                .await;
            if extraction.degraded() {
                state.note(format!(
                    "{}: {} keyword batches without AI validation",
                    competitor.domain, extraction.degraded_batches
                ));
            }
            state
                .domain_keywords
                .insert(competitor.domain.clone(), extraction.keywords);
        }
    }

    /// Ranks the gaps from the cached keywords. Selections survive re-ranking.
    pub fn rank_gaps(&self, state: &mut RunState) {
        let selected: BTreeSet<String> = state
            .gaps
            .iter()
            .filter(|keyword| keyword.selected)
            .map(Keyword::match_key)
            .collect();

        let keywords = state
            .domain_keywords
            .values()
            .flatten()
            .chain(&state.custom_keywords)
            .cloned();
        let mut gaps = rank(&state.company_domain, keywords, &self.options.rank);
        for keyword in &mut gaps {
            keyword.selected = selected.contains(&keyword.match_key());
        }
        info!("{} keyword gaps", gaps.len());
        state.gaps = gaps;
    }

    /// Adds user keywords and re-ranks. Phrases already known as custom
    /// keywords are ignored. Returns how many were added.
    pub fn add_custom_keywords(&self, state: &mut RunState, phrases: &[String]) -> usize {
        let mut known: BTreeSet<String> =
            state.custom_keywords.iter().map(Keyword::key).collect();
        let mut added = 0;
        for phrase in phrases {
            let keyword = Keyword::custom(phrase, CUSTOM_KEYWORD_SCORE);
            let key = keyword.key();
            if key.is_empty() || !known.insert(key) {
                continue;
            }
            state.custom_keywords.push(keyword);
            added += 1;
        }
        self.rank_gaps(state);
        added
    }

    /// Generates posts for the selected gaps, at most `max_blogs`. With
    /// nothing selected the top `max_blogs` gaps are used. Keywords that
    /// already have a post are skipped, and a retried keyword replaces its
    /// earlier failure. Returns the number of new posts.
    pub async fn generate_blogs(&self, state: &mut RunState, max_blogs: usize) -> usize {
        if state.selected().is_empty() {
            state.select_top(max_blogs);
        }
        let done: BTreeSet<String> = state
            .posts
            .iter()
            .map(|post| compact_phrase(&post.keyword))
            .collect();
        let queue: Vec<Keyword> = state
            .selected()
            .into_iter()
            .filter(|keyword| !done.contains(&keyword.match_key()))
            .take(max_blogs)
            .cloned()
            .collect();

        let style = state.style.clone().unwrap_or_else(StyleProfile::no_signal);
        let company_name = state.company_name.clone();
        let generator = BlogGenerator::new(self.ctx, &company_name, &style)
            .with_options(self.options.generator.clone());

        let mut generated = 0;
        for (position, keyword) in queue.iter().enumerate() {
            info!("Blog {}/{}: {}", position + 1, queue.len(), keyword.phrase);
            let key = keyword.match_key();
            state
                .failures
                .retain(|failure| compact_phrase(&failure.keyword) != key);
            match generator.generate(keyword).await {
                GenerationOutcome::Done(post) => {
                    state.posts.push(*post);
                    generated += 1;
                }
                GenerationOutcome::Failed {
                    keyword,
                    stage,
                    reason,
                } => state.failures.push(GenerationFailure {
                    keyword,
                    stage,
                    reason,
                }),
            }
        }
        generated
    }

    /// Runs every step for `config` and returns the resulting state.
    ///
    /// # Errors
    ///
    /// Returns [`GapError::Configuration`] before any network access when the
    /// company settings are invalid. Later failures are recorded in the state.
    pub async fn run_full_pipeline(&self, config: &RunConfig) -> Result<RunState, GapError> {
        let mut state = RunState::default();
        state.set_company(
            &config.company_name,
            &config.company_domain,
            &config.additional_domains,
        )?;

        self.fetch_own_sitemap(&mut state).await;
        self.learn_style(&mut state).await;
        self.add_competitors(&mut state, &config.competitors).await;
        self.fetch_competitor_sitemaps(&mut state, false).await;
        self.extract_keywords(&mut state).await;
        self.rank_gaps(&mut state);
        if !config.keywords.is_empty() {
            self.add_custom_keywords(&mut state, &config.keywords);
        }
        self.generate_blogs(&mut state, config.max_blogs).await;

        info!(
            "Run finished: {} posts, {} failures, {} notes",
            state.posts.len(),
            state.failures.len(),
            state.notes.len()
        );
        Ok(state)
    }
}

/// The name a competitor uses for itself: the given name, or the first label
/// of its domain when it was given as a domain.
fn brand_name(competitor: &CompetitorDomain) -> String {
    if is_valid_domain(&competitor.name) && !competitor.name.contains(' ') {
        competitor
            .domain
            .split(['.', ':'])
            .next()
            .unwrap_or_default()
            .to_owned()
    } else {
        competitor.name.clone()
    }
}

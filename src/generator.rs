//! Per-keyword blog generation:
//! `Draft -> LengthCheck -> LinkInjection -> DateRefresh -> SpellCheck -> Done`.
//!
//! Every LLM answer is scrubbed of banned phrases as soon as it arrives, and
//! the finished post is scanned once more; a post that still carries a banned
//! phrase never reaches `Done`.

use std::fmt;

use chrono::{DateTime, Datelike, Utc};
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::cleanup::{
    americanize, find_banned, inject_links, link_targets, normalize_meta_description,
    refresh_years, scrub_banned, slugify, word_count,
};
use crate::constants::{BANNED_PHRASES, DRAFT_PROMPT, EXPAND_PROMPT, SPELLCHECK_PROMPT};
use crate::error::GapError;
use crate::keywords::{ContentType, Keyword};
use crate::llm::CompletionContext;
use crate::ranking::suggested_title;
use crate::style::StyleProfile;

static TITLE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*\**TITLE:?\**:?\s*(.+)$").expect("Failed to compile regex"));
static META_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*\**META[_ ]DESCRIPTION:?\**:?\s*(.+)$").expect("Failed to compile regex")
});
static CONTENT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*\**CONTENT:?\**:?[ \t]*").expect("Failed to compile regex"));
static FENCE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^\s*```[a-zA-Z]*\s*\n(.*?)\n?```\s*$").expect("Failed to compile regex")
});

/// Spell-check answers shorter than this share of the input are discarded.
const SPELLCHECK_MIN_RATIO: f64 = 0.8;

/// A step of the generation state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Stage {
    Draft,
    LengthCheck,
    LinkInjection,
    DateRefresh,
    SpellCheck,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Draft => "draft",
            Self::LengthCheck => "length check",
            Self::LinkInjection => "link injection",
            Self::DateRefresh => "date refresh",
            Self::SpellCheck => "spell check",
        };
        f.write_str(name)
    }
}

/// Quality flag of a finished post.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum PostStatus {
    Clean,
    /// Kept but below the quality bar, e.g. too short.
    Warning(String),
}

impl PostStatus {
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Clean)
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clean => f.write_str("clean"),
            Self::Warning(reason) => write!(f, "warning: {reason}"),
        }
    }
}

/// A generated article.
#[derive(Clone, Debug, Serialize)]
pub struct BlogPost {
    pub keyword: String,
    pub content_type: ContentType,
    pub title: String,
    pub meta_description: String,
    /// Markdown body.
    pub content: String,
    pub word_count: usize,
    pub created_at: DateTime<Utc>,
    pub slug: String,
    pub status: PostStatus,
    pub links_inserted: usize,
    pub expansion_attempts: u32,
}

/// Terminal state of one keyword.
#[derive(Debug)]
pub enum GenerationOutcome {
    Done(Box<BlogPost>),
    Failed {
        keyword: String,
        stage: Stage,
        reason: String,
    },
}

#[derive(Clone, Debug)]
pub struct GeneratorOptions {
    pub min_words: usize,
    pub max_expansion_attempts: u32,
    pub max_internal_links: usize,
    /// Link map entries offered to the model in the draft prompt.
    pub max_link_candidates: usize,
    pub current_year: i32,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            min_words: 2_500,
            max_expansion_attempts: 2,
            max_internal_links: 5,
            max_link_candidates: 15,
            current_year: Utc::now().year(),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
struct Draft {
    title: String,
    meta_description: String,
    content: String,
}

/// Writes blog posts in the company's style.
pub struct BlogGenerator<'a> {
    ctx: &'a CompletionContext<'a>,
    company_name: &'a str,
    style: &'a StyleProfile,
    options: GeneratorOptions,
}

impl<'a> BlogGenerator<'a> {
    pub fn new(
        ctx: &'a CompletionContext<'a>,
        company_name: &'a str,
        style: &'a StyleProfile,
    ) -> Self {
        Self {
            ctx,
            company_name,
            style,
            options: GeneratorOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: GeneratorOptions) -> Self {
        self.options = options;
        self
    }

    /// Runs every stage for `keyword`. Failures are returned as
    /// [`GenerationOutcome::Failed`], never as an error.
    pub async fn generate(&self, keyword: &Keyword) -> GenerationOutcome {
        info!("Generating blog for \"{}\"", keyword.phrase);
        match self.run_stages(keyword).await {
            Ok(post) => {
                info!(
                    "\"{}\": {} words, {} links, {}",
                    keyword.phrase, post.word_count, post.links_inserted, post.status
                );
                GenerationOutcome::Done(Box::new(post))
            }
            Err((stage, err)) => {
                warn!("\"{}\" failed at {stage}: {err}", keyword.phrase);
                GenerationOutcome::Failed {
                    keyword: keyword.phrase.clone(),
                    stage,
                    reason: err.to_string(),
                }
            }
        }
    }

    async fn run_stages(&self, keyword: &Keyword) -> Result<BlogPost, (Stage, GapError)> {
        let mut draft = self
            .draft(keyword)
            .await
            .map_err(|err| (Stage::Draft, err))?;

        let expansion_attempts = self
            .expand(keyword, &mut draft.content)
            .await
            .map_err(|err| (Stage::LengthCheck, err))?;

        let (content, links_inserted) = inject_links(
            &draft.content,
            &self.style.internal_link_map,
            self.options.max_internal_links,
        );
        draft.content = content;

        let year = self.options.current_year;
        draft.title = refresh_years(&draft.title, year);
        draft.meta_description = refresh_years(&draft.meta_description, year);
        draft.content = refresh_years(&draft.content, year);

        draft.content = self.spellcheck(&keyword.phrase, &draft.content).await;
        let draft = Draft {
            title: scrub_banned(&draft.title),
            meta_description: normalize_meta_description(
                &scrub_banned(&draft.meta_description),
                &keyword.phrase,
            ),
            content: scrub_banned(&draft.content),
        };

        let leftovers: Vec<&str> = [&draft.title, &draft.meta_description, &draft.content]
            .iter()
            .flat_map(|text| find_banned(text))
            .collect();
        if !leftovers.is_empty() {
            return Err((
                Stage::SpellCheck,
                GapError::Quality(format!("banned phrases remain: {}", leftovers.join(", "))),
            ));
        }

        let words = word_count(&draft.content);
        let status = if words < self.options.min_words {
            PostStatus::Warning(format!(
                "Blog too short: {words} words (minimum {})",
                self.options.min_words
            ))
        } else {
            PostStatus::Clean
        };

        Ok(BlogPost {
            keyword: keyword.phrase.clone(),
            content_type: keyword.content_type,
            title: draft.title,
            meta_description: draft.meta_description,
            content: draft.content,
            word_count: words,
            created_at: Utc::now(),
            slug: slugify(&keyword.phrase),
            status,
            links_inserted,
            expansion_attempts,
        })
    }

    async fn draft(&self, keyword: &Keyword) -> Result<Draft, GapError> {
        let prompt = self.draft_prompt(keyword);
        let response = self.ctx.complete("draft", &prompt).await?;
        let default_title = suggested_title(
            &keyword.phrase,
            keyword.content_type,
            self.options.current_year,
        );
        let draft = parse_draft(&response, &default_title);
        if draft.content.trim().is_empty() {
            return Err(GapError::Quality("the model returned an empty draft".to_owned()));
        }

        Ok(Draft {
            title: scrub_banned(&draft.title),
            meta_description: scrub_banned(&draft.meta_description),
            content: scrub_banned(&draft.content),
        })
    }

    fn draft_prompt(&self, keyword: &Keyword) -> String {
        let competitors = if keyword.source_domains.is_empty() {
            "none (user-added topic)".to_owned()
        } else {
            keyword
                .source_domains
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        };
        let product = self
            .style
            .product_context
            .as_ref()
            .map_or_else(String::new, |context| format!("Product: {context}"));
        let links = self
            .style
            .link_candidates(&keyword.phrase, self.options.max_link_candidates)
            .into_iter()
            .map(|(anchor, url)| format!("- {anchor}: {url}"))
            .collect::<Vec<_>>();
        let links = if links.is_empty() {
            "No internal links available.".to_owned()
        } else {
            links.join("\n")
        };
        let banned = BANNED_PHRASES
            .iter()
            .map(|(phrase, _)| *phrase)
            .collect::<Vec<_>>()
            .join(", ");

        DRAFT_PROMPT
            .replace("{company}", self.company_name)
            .replace("{keyword}", &keyword.phrase)
            .replace("{content_type}", &format!("{:?}", keyword.content_type))
            .replace("{competitors}", &competitors)
            .replace("{product}", &product)
            .replace("{style}", &self.style.style_instructions())
            .replace("{links}", &links)
            .replace("{banned}", &banned)
            .replace("{min_words}", &self.options.min_words.to_string())
            .replace("{year}", &self.options.current_year.to_string())
    }

    /// Asks for longer content until the minimum is met or the attempts run
    /// out. Returns the number of attempts made.
    async fn expand(&self, keyword: &Keyword, content: &mut String) -> Result<u32, GapError> {
        let mut attempts = 0;
        while word_count(content) < self.options.min_words
            && attempts < self.options.max_expansion_attempts
        {
            attempts += 1;
            let current_words = word_count(content);
            info!(
                "\"{}\" has {current_words} words, expansion {attempts}/{}",
                keyword.phrase, self.options.max_expansion_attempts
            );
            let prompt = EXPAND_PROMPT
                .replace("{keyword}", &keyword.phrase)
                .replace("{word_count}", &current_words.to_string())
                .replace("{min_words}", &self.options.min_words.to_string())
                .replace("{content}", content);
            let response = self.ctx.complete("expansion", &prompt).await?;
            let expanded = scrub_banned(&strip_fences(&response));
            if word_count(&expanded) > current_words {
                *content = expanded;
            } else {
                warn!("Expansion of \"{}\" came back shorter, keeping the draft", keyword.phrase);
            }
        }
        Ok(attempts)
    }

    /// Model spell-check, with the local dictionary pass when the model fails,
    /// drops content or loses a link target.
    async fn spellcheck(&self, phrase: &str, content: &str) -> String {
        let prompt = SPELLCHECK_PROMPT.replace("{content}", content);
        match self.ctx.complete("spell check", &prompt).await {
            Ok(response) => {
                let corrected = strip_fences(&response);
                #[allow(clippy::cast_precision_loss)]
                let kept = word_count(&corrected) as f64 / word_count(content).max(1) as f64;
                let corrected_targets = link_targets(&corrected);
                let lost_link = link_targets(content)
                    .iter()
                    .any(|target| !corrected_targets.contains(target));
                if kept >= SPELLCHECK_MIN_RATIO && !lost_link {
                    corrected
                } else {
                    warn!("Spell check of \"{phrase}\" dropped content, using the local pass");
                    americanize(content)
                }
            }
            Err(err) => {
                warn!("{err}, using the local spelling pass");
                americanize(content)
            }
        }
    }
}

/// Splits a `TITLE:` / `META_DESCRIPTION:` / `CONTENT:` answer. Unlabelled
/// answers become the whole content under `default_title`.
fn parse_draft(response: &str, default_title: &str) -> Draft {
    let response = strip_fences(response);
    let capture = |regex: &Regex| {
        regex
            .captures(&response)
            .and_then(|captures| captures.get(1))
            .map(|found| found.as_str().trim().trim_matches('*').trim().to_owned())
            .filter(|value| !value.is_empty())
    };
    let title = capture(&TITLE_REGEX);
    let meta_description = capture(&META_REGEX);

    let content = match CONTENT_REGEX.find(&response) {
        Some(found) => response.get(found.end()..).unwrap_or_default().trim().to_owned(),
        None if title.is_none() => response.trim().to_owned(),
        None => {
            let body_start = [TITLE_REGEX.find(&response), META_REGEX.find(&response)]
                .into_iter()
                .flatten()
                .map(|found| found.end())
                .max()
                .unwrap_or(0);
            response.get(body_start..).unwrap_or_default().trim().to_owned()
        }
    };

    Draft {
        title: title
            .unwrap_or_else(|| default_title.to_owned())
            .trim_matches('"')
            .to_owned(),
        meta_description: meta_description.unwrap_or_default(),
        content,
    }
}

fn strip_fences(text: &str) -> String {
    match FENCE_REGEX.captures(text).and_then(|captures| captures.get(1)) {
        Some(inner) => inner.as_str().trim().to_owned(),
        None => text.trim().to_owned(),
    }
}


//! Keyword phrases derived from sitemap URL slugs, validated in batches by the
//! LLM, with a mechanical fallback when the model is unavailable.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::{KEYWORD_PROMPT, SKIP_SLUG_SEGMENTS, STOP_WORDS, VALUABLE_SINGLE_WORDS};
use crate::llm::{CompletionContext, extract_json_array};
use crate::sitemap::SiteEntry;

/// Sample URLs kept per keyword.
const MAX_SAMPLE_URLS: usize = 5;
/// Candidates sent to the model in one call.
pub const KEYWORD_BATCH_SIZE: usize = 50;

/// Kind of article a keyword calls for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ContentType {
    #[default]
    Blog,
    Tool,
    Comparison,
    Alternative,
    HowTo,
    Listicle,
    Guide,
    UserAdded,
}

impl ContentType {
    /// Classifies a phrase from its words.
    pub fn classify(phrase: &str) -> Self {
        let lowered = phrase.to_lowercase();
        let words: BTreeSet<&str> = lowered.split_whitespace().collect();
        let has_any = |candidates: &[&str]| candidates.iter().any(|word| words.contains(word));

        if has_any(&["alternative", "alternatives", "competitor", "competitors"]) {
            Self::Alternative
        } else if has_any(&["comparison", "compare", "vs", "versus"]) {
            Self::Comparison
        } else if has_any(&[
            "generator", "creator", "maker", "builder", "tool", "tools", "software", "app",
            "free", "online", "recorder", "editor",
        ]) {
            Self::Tool
        } else if has_any(&["how", "tutorial", "learn", "create", "make", "build", "step"]) {
            Self::HowTo
        } else if has_any(&["guide", "ultimate", "complete"]) {
            Self::Guide
        } else if has_any(&["best", "top", "list", "examples", "ideas"]) {
            Self::Listicle
        } else {
            Self::Blog
        }
    }

    fn from_label(label: &str) -> Option<Self> {
        let normalized: String = label
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "blog" | "other" => Some(Self::Blog),
            "tool" | "solution" => Some(Self::Tool),
            "comparison" => Some(Self::Comparison),
            "alternative" => Some(Self::Alternative),
            "howto" | "tutorial" => Some(Self::HowTo),
            "listicle" => Some(Self::Listicle),
            "guide" => Some(Self::Guide),
            _ => None,
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Blog => "Blog",
            Self::Tool => "Tool",
            Self::Comparison => "Comparison",
            Self::Alternative => "Alternative",
            Self::HowTo => "How-To",
            Self::Listicle => "Listicle",
            Self::Guide => "Guide",
            Self::UserAdded => "User Added",
        };
        formatter.write_str(label)
    }
}

/// Where a keyword came from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum KeywordOrigin {
    #[default]
    Extracted,
    Custom,
}

/// A candidate topic phrase and its aggregated statistics.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Keyword {
    /// Display form, e.g. "Video Editing Tips".
    pub phrase: String,
    pub source_domains: BTreeSet<String>,
    pub frequency: u32,
    pub competitor_count: u32,
    /// Caller-supplied base weight of the priority formula.
    pub score: f64,
    /// Relevance 1-10 reported by the model, if it validated the phrase.
    pub relevance: Option<u8>,
    /// Set by the gap ranker only.
    pub priority: Option<f64>,
    pub selected: bool,
    pub content_type: ContentType,
    pub sample_urls: Vec<Url>,
    pub origin: KeywordOrigin,
}

impl Keyword {
    /// A keyword seen once on `domain`.
    pub fn new(phrase: &str, domain: &str) -> Self {
        Self {
            phrase: phrase.trim().to_owned(),
            source_domains: BTreeSet::from([domain.to_owned()]),
            frequency: 1,
            competitor_count: 0,
            score: 0.0,
            relevance: None,
            priority: None,
            selected: false,
            content_type: ContentType::classify(phrase),
            sample_urls: Vec::new(),
            origin: KeywordOrigin::Extracted,
        }
    }

    /// A user-supplied keyword, independent of any domain.
    pub fn custom(phrase: &str, score: f64) -> Self {
        Self {
            phrase: title_case(phrase.trim()),
            source_domains: BTreeSet::new(),
            frequency: 0,
            competitor_count: 0,
            score,
            relevance: None,
            priority: None,
            selected: false,
            content_type: ContentType::UserAdded,
            sample_urls: Vec::new(),
            origin: KeywordOrigin::Custom,
        }
    }

    /// Natural key: the normalized phrase.
    pub fn key(&self) -> String {
        normalize_phrase(&self.phrase)
    }

    /// Punctuation-insensitive key used to merge phrases and to match them
    /// against the target, so `E-commerce SEO` equals `Ecommerce SEO`.
    pub fn match_key(&self) -> String {
        compact_phrase(&self.phrase)
    }

    pub fn priority(&self) -> Option<f64> {
        self.priority
    }

    /// Folds another extraction of the same phrase into this one.
    ///
    /// Order independent: frequencies add, domains union, and every tie is
    /// settled by value rather than by which side came first.
    pub fn absorb(&mut self, other: Keyword) {
        self.frequency += other.frequency;
        self.source_domains.extend(other.source_domains);
        self.score = self.score.max(other.score);
        self.relevance = self.relevance.max(other.relevance);
        self.selected |= other.selected;
        if other.phrase < self.phrase {
            self.phrase = other.phrase;
        }
        if other.origin == KeywordOrigin::Custom {
            self.origin = KeywordOrigin::Custom;
        }
        self.content_type = match (self.content_type, other.content_type) {
            (ContentType::Blog, theirs) => theirs,
            (ours, ContentType::Blog) => ours,
            (ours, theirs) => ours.min(theirs),
        };
        self.sample_urls.extend(other.sample_urls);
        self.sample_urls.sort();
        self.sample_urls.dedup();
        self.sample_urls.truncate(MAX_SAMPLE_URLS);
        self.priority = None;
    }
}

/// Lowercase alphanumeric words joined by single spaces.
pub fn normalize_phrase(phrase: &str) -> String {
    phrase
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lowercase alphanumerics only, with every space and punctuation dropped.
pub fn compact_phrase(phrase: &str) -> String {
    phrase
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

pub(crate) fn title_case(phrase: &str) -> String {
    phrase
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Reconstructs a readable phrase from the last meaningful slug segment.
///
/// Returns `None` for IDs, dates, pagination and other non-phrases.
pub fn phrase_from_slug(segments: &[String]) -> Option<String> {
    if segments
        .iter()
        .any(|segment| SKIP_SLUG_SEGMENTS.contains(&segment.as_str()))
    {
        return None;
    }

    let best = segments.iter().rev().find(|segment| {
        let length = segment.chars().count();
        let digits = segment.chars().filter(char::is_ascii_digit).count();
        let id_like = length >= 20 && segment.chars().all(|c| c.is_ascii_alphanumeric());
        (3..=80).contains(&length) && !id_like && digits * 10 <= length * 4
    })?;

    let words: Vec<&str> = best
        .split(['-', '_', '/', '.', '+'])
        .filter(|word| word.len() >= 2 && word.chars().all(|c| c.is_ascii_alphabetic()))
        .filter(|word| !STOP_WORDS.contains(word))
        .take(6)
        .collect();

    match words.as_slice() {
        [] => None,
        [single] if !VALUABLE_SINGLE_WORDS.contains(single) && single.len() < 8 => None,
        _ => {
            let phrase = words.join(" ");
            let letters = phrase.replace(' ', "");
            let vowels = letters.chars().filter(|c| "aeiou".contains(*c)).count();
            (vowels * 10 >= letters.len()).then_some(phrase)
        }
    }
}

/// Keywords extracted from one domain.
#[derive(Debug, Default)]
pub struct Extraction {
    pub domain: String,
    pub keywords: Vec<Keyword>,
    pub total_batches: usize,
    /// Batches that fell back to mechanical phrases.
    pub degraded_batches: usize,
}

impl Extraction {
    /// True when at least one batch skipped AI validation.
    pub fn degraded(&self) -> bool {
        self.degraded_batches > 0
    }
}

#[derive(Debug)]
struct Candidate<'e> {
    entry: &'e SiteEntry,
    phrase: String,
}

#[derive(Debug, Deserialize)]
struct Verdict {
    index: usize,
    #[serde(default)]
    keyword: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default = "default_valid")]
    valid: bool,
}

fn default_valid() -> bool {
    true
}

/// Turns site entries into per-domain keywords.
pub struct KeywordExtractor<'a> {
    ctx: &'a CompletionContext<'a>,
    batch_size: usize,
}

impl<'a> KeywordExtractor<'a> {
    pub fn new(ctx: &'a CompletionContext<'a>) -> Self {
        Self {
            ctx,
            batch_size: KEYWORD_BATCH_SIZE,
        }
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Extracts the keywords of one domain.
    ///
    /// `brand` is the domain owner's name; when it appears inside a phrase it
    /// is replaced by `company_name` so competitor-branded topics become ours.
    pub async fn extract(
        &self,
        domain: &str,
        brand: &str,
        entries: &[SiteEntry],
        company_name: Option<&str>,
    ) -> Extraction {
        let candidates: Vec<Candidate<'_>> = entries
            .iter()
            .filter_map(|entry| {
                phrase_from_slug(&entry.slug_segments).map(|phrase| Candidate { entry, phrase })
            })
            .collect();

        let mut extraction = Extraction {
            domain: domain.to_owned(),
            ..Extraction::default()
        };
        let mut by_key: BTreeMap<String, Keyword> = BTreeMap::new();

        for batch in candidates.chunks(self.batch_size) {
            extraction.total_batches += 1;
            let validated = match self.validate_batch(brand, batch).await {
                Some(validated) => validated,
                None => {
                    extraction.degraded_batches += 1;
                    mechanical_batch(batch)
                }
            };

            for (candidate, mut keyword) in validated {
                keyword.phrase = neutralize_brand(&keyword.phrase, brand, company_name);
                keyword.source_domains = BTreeSet::from([domain.to_owned()]);
                keyword.sample_urls = vec![candidate.entry.url.clone()];
                let key = keyword.key();
                if key.is_empty() {
                    continue;
                }
                match by_key.get_mut(&key) {
                    Some(existing) => existing.absorb(keyword),
                    None => {
                        by_key.insert(key, keyword);
                    }
                }
            }
        }

        if extraction.degraded() {
            warn!(
                "{domain}: {}/{} keyword batches used mechanical phrases without AI validation",
                extraction.degraded_batches, extraction.total_batches
            );
        }
        extraction.keywords = by_key.into_values().collect();
        info!(
            "{domain}: {} keywords from {} candidates",
            extraction.keywords.len(),
            candidates.len()
        );
        extraction
    }

    async fn validate_batch<'c, 'e>(
        &self,
        brand: &str,
        batch: &'c [Candidate<'e>],
    ) -> Option<Vec<(&'c Candidate<'e>, Keyword)>> {
        let listing = batch
            .iter()
            .enumerate()
            .map(|(index, candidate)| {
                format!(
                    "{}. {} => {}",
                    index + 1,
                    candidate.entry.slug(),
                    candidate.phrase
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = KEYWORD_PROMPT
            .replace("{source}", brand)
            .replace("{candidates}", &listing);

        let response = match self.ctx.complete("keyword extraction", &prompt).await {
            Ok(response) => response,
            Err(err) => {
                warn!("{err}");
                return None;
            }
        };
        let Some(verdicts) = extract_json_array::<Vec<Verdict>>(&response) else {
            warn!("Keyword extraction answer is not a JSON array");
            return None;
        };

        let mut validated = Vec::new();
        for verdict in verdicts {
            let Some(candidate) = verdict.index.checked_sub(1).and_then(|i| batch.get(i)) else {
                debug!("Verdict for unknown candidate {}", verdict.index);
                continue;
            };
            if !verdict.valid {
                continue;
            }
            let phrase = if verdict.keyword.trim().is_empty() {
                title_case(&candidate.phrase)
            } else {
                verdict.keyword.trim().to_owned()
            };
            let mut keyword = Keyword::new(&phrase, &candidate.entry.domain);
            if let Some(kind) = verdict.kind.as_deref().and_then(ContentType::from_label) {
                keyword.content_type = kind;
            }
            keyword.relevance = verdict
                .score
                .filter(|score| score.is_finite())
                .map(|score| score.clamp(0.0, 10.0).round() as u8);
            validated.push((candidate, keyword));
        }
        Some(validated)
    }
}

fn mechanical_batch<'c, 'e>(batch: &'c [Candidate<'e>]) -> Vec<(&'c Candidate<'e>, Keyword)> {
    batch
        .iter()
        .map(|candidate| {
            let keyword = Keyword::new(&title_case(&candidate.phrase), &candidate.entry.domain);
            (candidate, keyword)
        })
        .collect()
}

fn neutralize_brand(phrase: &str, brand: &str, company_name: Option<&str>) -> String {
    let (Some(company), brand) = (company_name, normalize_phrase(brand)) else {
        return phrase.to_owned();
    };
    if brand.is_empty() || brand == normalize_phrase(company) {
        return phrase.to_owned();
    }
    let normalized = format!(" {} ", normalize_phrase(phrase));
    let needle = format!(" {brand} ");
    if !normalized.contains(&needle) {
        return phrase.to_owned();
    }
    title_case(normalized.replace(&needle, &format!(" {company} ")).trim())
}

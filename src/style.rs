//! Learns how the company writes from its own pages, which of its pages are
//! worth linking to, and what its product does.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use log::{debug, info, warn};
use serde::Deserialize;
use url::Url;

use crate::TextBy;
use crate::constants::{DEFAULT_STYLE_INSTRUCTIONS, LINK_MAP_PROMPT, PRODUCT_PROMPT, STYLE_PROMPT};
use crate::keywords::{normalize_phrase, phrase_from_slug};
use crate::llm::{CompletionContext, extract_json_object};
use crate::page::fetch_page_text;
use crate::sitemap::{SiteEntry, SitemapFetcher};

/// Pages shorter than this carry no usable style signal.
const MIN_PAGE_CHARS: usize = 500;
/// Each sample is cut to this many characters.
const MAX_PAGE_CHARS: usize = 5_000;
/// Samples included in the style prompt.
const MAX_PROMPT_SAMPLES: usize = 10;
const LINK_MAP_BATCH_SIZE: usize = 30;
const MAX_LINK_MAP_PAGES: usize = 150;
const MAX_ANCHORS_PER_URL: usize = 3;
const MAX_PRODUCT_PAGES: usize = 5;

/// Path markers of pages likely to hold articles.
const ARTICLE_MARKERS: &[&str] = &["blog", "article", "post", "guide", "resources", "learn", "news"];
/// Path markers of pages describing the product.
const PRODUCT_MARKERS: &[&str] = &[
    "feature",
    "product",
    "solution",
    "platform",
    "use-case",
    "how-it-works",
];

/// Writing style learned from the company's pages.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StyleProfile {
    pub tone_description: String,
    pub formatting_notes: String,
    /// Anchor phrase to the company page it should link to.
    pub internal_link_map: BTreeMap<String, Url>,
    /// False when no page gave a usable sample; generation then uses the
    /// neutral default tone.
    pub has_signal: bool,
    pub product_context: Option<String>,
}

impl StyleProfile {
    /// The explicit "nothing learned" profile.
    pub fn no_signal() -> Self {
        Self::default()
    }

    /// Style section of the draft prompt.
    pub fn style_instructions(&self) -> String {
        if !self.has_signal {
            return DEFAULT_STYLE_INSTRUCTIONS.to_owned();
        }
        let mut lines = vec![format!("- {}", self.tone_description)];
        if !self.formatting_notes.is_empty() {
            lines.push(format!("- {}", self.formatting_notes));
        }
        lines.join("\n")
    }

    /// Link map entries ordered by word overlap with `keyword`, best first.
    pub fn link_candidates(&self, keyword: &str, max: usize) -> Vec<(&str, &Url)> {
        let keyword_words: BTreeSet<String> = normalize_phrase(keyword)
            .split(' ')
            .map(str::to_owned)
            .collect();
        let mut candidates: Vec<(usize, &str, &Url)> = self
            .internal_link_map
            .iter()
            .map(|(anchor, url)| {
                let overlap = normalize_phrase(anchor)
                    .split(' ')
                    .filter(|word| keyword_words.contains(*word))
                    .count();
                (overlap, anchor.as_str(), url)
            })
            .collect();
        candidates.sort_by(|left, right| right.0.cmp(&left.0).then_with(|| left.1.cmp(right.1)));
        candidates
            .into_iter()
            .take(max)
            .map(|(_, anchor, url)| (anchor, url))
            .collect()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StyleSummary {
    tone: String,
    voice: String,
    sentence_structure: String,
    paragraph_length: String,
    use_of_headers: String,
    formatting_style: String,
    cta_style: String,
    opening_pattern: String,
    closing_pattern: String,
    unique_phrases: Vec<String>,
}

impl StyleSummary {
    fn tone_description(&self) -> String {
        labelled(&[
            ("Tone", &self.tone),
            ("Voice", &self.voice),
            ("Sentences", &self.sentence_structure),
            ("Paragraphs", &self.paragraph_length),
        ])
    }

    fn formatting_notes(&self) -> String {
        let phrases = self.unique_phrases.join(", ");
        labelled(&[
            ("Headers", &self.use_of_headers),
            ("Formatting", &self.formatting_style),
            ("Calls to action", &self.cta_style),
            ("Openings", &self.opening_pattern),
            ("Closings", &self.closing_pattern),
            ("Typical phrases", &phrases),
        ])
    }
}

fn labelled(parts: &[(&str, &String)]) -> String {
    parts
        .iter()
        .filter(|(_, value)| !value.trim().is_empty())
        .map(|(label, value)| format!("{label}: {}", value.trim()))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Samples the company's pages and turns them into a [`StyleProfile`].
pub struct StyleAnalyzer<'a> {
    ctx: &'a CompletionContext<'a>,
    fetcher: &'a SitemapFetcher,
    sample_size: usize,
    text_by: TextBy,
}

impl<'a> StyleAnalyzer<'a> {
    pub fn new(ctx: &'a CompletionContext<'a>, fetcher: &'a SitemapFetcher) -> Self {
        Self {
            ctx,
            fetcher,
            sample_size: 20,
            text_by: TextBy::default(),
        }
    }

    #[must_use]
    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size;
        self
    }

    #[must_use]
    pub fn with_text_by(mut self, text_by: TextBy) -> Self {
        self.text_by = text_by;
        self
    }

    /// Builds the style profile of the company whose pages are `entries`.
    ///
    /// With no entries the result is [`StyleProfile::no_signal`]. When pages
    /// exist but none is usable, the link map is still built from the URLs.
    pub async fn analyze(&self, entries: &[SiteEntry]) -> StyleProfile {
        if entries.is_empty() {
            info!("No company pages, using the default writing style");
            return StyleProfile::no_signal();
        }

        let samples = self.collect_samples(entries).await;
        let mut profile = if samples.is_empty() {
            warn!("No company page had enough text, using the default writing style");
            StyleProfile::no_signal()
        } else {
            self.summarize_style(&samples).await
        };

        profile.internal_link_map = self.build_link_map(entries).await;
        profile.product_context = self.product_context(entries).await;
        info!(
            "Style profile: signal={}, {} link anchors, product context={}",
            profile.has_signal,
            profile.internal_link_map.len(),
            profile.product_context.is_some()
        );
        profile
    }

    async fn collect_samples(&self, entries: &[SiteEntry]) -> Vec<String> {
        let mut samples = Vec::new();
        for entry in sample_entries(entries, self.sample_size) {
            match fetch_page_text(self.fetcher, entry.url.as_str(), self.text_by).await {
                Ok(article) if article.text.chars().count() > MIN_PAGE_CHARS => {
                    samples.push(article.sample(MAX_PAGE_CHARS));
                }
                Ok(_) => debug!("Skipping short page {}", entry.url),
                Err(err) => debug!("{err}"),
            }
        }
        samples
    }

    async fn summarize_style(&self, samples: &[String]) -> StyleProfile {
        let joined = samples
            .iter()
            .take(MAX_PROMPT_SAMPLES)
            .enumerate()
            .map(|(index, sample)| format!("--- Sample {} ---\n{sample}", index + 1))
            .collect::<Vec<_>>()
            .join("\n\n");
        let prompt = STYLE_PROMPT.replace("{samples}", &joined);

        let summary = match self.ctx.complete("style analysis", &prompt).await {
            Ok(response) => extract_json_object::<StyleSummary>(&response),
            Err(err) => {
                warn!("{err}");
                None
            }
        };

        match summary {
            Some(summary) if !summary.tone_description().is_empty() => StyleProfile {
                tone_description: summary.tone_description(),
                formatting_notes: summary.formatting_notes(),
                has_signal: true,
                ..StyleProfile::default()
            },
            _ => {
                warn!("Style analysis gave no usable summary, using the default writing style");
                StyleProfile::no_signal()
            }
        }
    }

    /// Maps anchor phrases to company URLs, asking the model in batches and
    /// falling back to the slug phrase of each URL.
    pub async fn build_link_map(&self, entries: &[SiteEntry]) -> BTreeMap<String, Url> {
        let pages: Vec<&SiteEntry> = entries
            .iter()
            .filter(|entry| !entry.slug_segments.is_empty())
            .take(MAX_LINK_MAP_PAGES)
            .collect();
        let mut link_map = BTreeMap::new();

        for batch in pages.chunks(LINK_MAP_BATCH_SIZE) {
            let anchors = match self.anchors_for(batch).await {
                Some(anchors) => anchors,
                None => mechanical_anchors(batch),
            };
            for (url, phrases) in anchors {
                for phrase in phrases.into_iter().take(MAX_ANCHORS_PER_URL) {
                    let anchor = phrase.trim().to_lowercase();
                    if anchor.len() >= 3 {
                        link_map.entry(anchor).or_insert_with(|| url.clone());
                    }
                }
            }
        }
        link_map
    }

    async fn anchors_for(&self, batch: &[&SiteEntry]) -> Option<Vec<(Url, Vec<String>)>> {
        let listing = batch
            .iter()
            .map(|entry| entry.url.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = LINK_MAP_PROMPT.replace("{urls}", &listing);
        let response = match self.ctx.complete("link map", &prompt).await {
            Ok(response) => response,
            Err(err) => {
                warn!("{err}");
                return None;
            }
        };
        let answer: HashMap<String, Vec<String>> = extract_json_object(&response)?;
        let answer: HashMap<&str, &Vec<String>> = answer
            .iter()
            .map(|(url, anchors)| (url.trim_end_matches('/'), anchors))
            .collect();

        let anchors = batch
            .iter()
            .filter_map(|entry| {
                answer
                    .get(entry.url.as_str().trim_end_matches('/'))
                    .map(|anchors| (entry.url.clone(), anchors.to_vec()))
            })
            .collect::<Vec<_>>();
        (!anchors.is_empty()).then_some(anchors)
    }

    /// One-paragraph product description from feature and product pages.
    pub async fn product_context(&self, entries: &[SiteEntry]) -> Option<String> {
        let mut samples = Vec::new();
        let product_pages = entries.iter().filter(|entry| {
            let path = entry.slug();
            PRODUCT_MARKERS.iter().any(|marker| path.contains(marker))
        });
        for entry in product_pages.take(MAX_PRODUCT_PAGES) {
            match fetch_page_text(self.fetcher, entry.url.as_str(), self.text_by).await {
                Ok(article) => {
                    samples.push(article.sample(MAX_PAGE_CHARS / 2));
                }
                Err(err) => debug!("{err}"),
            }
        }
        if samples.is_empty() {
            return None;
        }

        let prompt = PRODUCT_PROMPT.replace("{samples}", &samples.join("\n\n---\n\n"));
        match self.ctx.complete("product context", &prompt).await {
            Ok(summary) if !summary.trim().is_empty() => Some(summary.trim().to_owned()),
            Ok(_) => None,
            Err(err) => {
                warn!("{err}");
                None
            }
        }
    }
}

/// Article-like pages first, then the rest, in sitemap order.
fn sample_entries(entries: &[SiteEntry], sample_size: usize) -> Vec<&SiteEntry> {
    let is_article = |entry: &&SiteEntry| {
        entry
            .slug_segments
            .iter()
            .any(|segment| ARTICLE_MARKERS.iter().any(|marker| segment.contains(marker)))
    };
    let (mut articles, others): (Vec<&SiteEntry>, Vec<&SiteEntry>) =
        entries.iter().partition(is_article);
    articles.extend(others);
    articles.truncate(sample_size);
    articles
}

fn mechanical_anchors(batch: &[&SiteEntry]) -> Vec<(Url, Vec<String>)> {
    batch
        .iter()
        .filter_map(|entry| {
            phrase_from_slug(&entry.slug_segments).map(|phrase| (entry.url.clone(), vec![phrase]))
        })
        .collect()
}

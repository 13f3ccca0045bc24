//! Gap ranking: merges per-domain keywords, drops what the target already
//! covers and orders the rest by
//! `priority = frequency * 3 + competitor_count * 5 + score`.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use crate::keywords::{ContentType, Keyword, KeywordOrigin};

/// Base score given to user-added keywords so they rank near the top.
pub const CUSTOM_KEYWORD_SCORE: f64 = 100.0;

/// Where the `score` term of the priority comes from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScoreSource {
    /// The keyword's own `score` (0 unless a caller set it).
    #[default]
    Default,
    /// The model's 1-10 relevance for validated keywords.
    Relevance,
}

#[derive(Clone, Debug)]
pub struct RankOptions {
    /// Extracted keywords seen fewer times are dropped; custom keywords stay.
    pub min_frequency: u32,
    pub score_source: ScoreSource,
    /// Per-phrase base weights, keyed by normalized phrase.
    pub score_overrides: HashMap<String, f64>,
}

impl Default for RankOptions {
    fn default() -> Self {
        Self {
            min_frequency: 1,
            score_source: ScoreSource::Default,
            score_overrides: HashMap::new(),
        }
    }
}

/// The priority formula.
pub fn priority(frequency: u32, competitor_count: u32, score: f64) -> f64 {
    f64::from(frequency) * 3.0 + f64::from(competitor_count) * 5.0 + score
}

/// Merges keywords of every domain by [`Keyword::match_key`], so spelling
/// variants that differ only in spaces or punctuation become one keyword.
///
/// Frequencies are summed, source domains united and `competitor_count` set
/// to the number of distinct source domains other than `target_domain`.
/// The result is sorted by key, so input order never matters.
pub fn merge<I>(target_domain: &str, keywords: I) -> Vec<Keyword>
where
    I: IntoIterator<Item = Keyword>,
{
    let mut merged: BTreeMap<String, Keyword> = BTreeMap::new();
    for keyword in keywords {
        let key = keyword.match_key();
        if key.is_empty() {
            continue;
        }
        match merged.get_mut(&key) {
            Some(existing) => existing.absorb(keyword),
            None => {
                let mut keyword = keyword;
                keyword.priority = None;
                merged.insert(key, keyword);
            }
        }
    }

    merged
        .into_values()
        .map(|mut keyword| {
            let competitors = keyword
                .source_domains
                .iter()
                .filter(|domain| domain.as_str() != target_domain)
                .count();
            keyword.competitor_count = u32::try_from(competitors).unwrap_or(u32::MAX);
            keyword
        })
        .collect()
}

/// Produces the ordered gap list.
///
/// Phrases present on `target_domain`, compared by
/// [`Keyword::match_key`], are excluded. Ties on priority are
/// broken by descending `competitor_count`, then ascending phrase.
pub fn rank<I>(target_domain: &str, keywords: I, options: &RankOptions) -> Vec<Keyword>
where
    I: IntoIterator<Item = Keyword>,
{
    let mut gaps: Vec<Keyword> = merge(target_domain, keywords)
        .into_iter()
        .filter(|keyword| !keyword.source_domains.contains(target_domain))
        .filter(|keyword| {
            keyword.origin == KeywordOrigin::Custom || keyword.frequency >= options.min_frequency
        })
        .map(|mut keyword| {
            let score = base_score(&keyword, options);
            keyword.score = score;
            keyword.priority = Some(priority(
                keyword.frequency,
                keyword.competitor_count,
                score,
            ));
            keyword
        })
        .collect();

    gaps.sort_by(compare_ranked);
    gaps
}

fn base_score(keyword: &Keyword, options: &RankOptions) -> f64 {
    if let Some(score) = options.score_overrides.get(&keyword.key()) {
        return *score;
    }
    match (options.score_source, keyword.origin) {
        (_, KeywordOrigin::Custom) | (ScoreSource::Default, _) => keyword.score,
        (ScoreSource::Relevance, KeywordOrigin::Extracted) => {
            keyword.relevance.map_or(keyword.score, f64::from)
        }
    }
}

fn compare_ranked(left: &Keyword, right: &Keyword) -> Ordering {
    let left_priority = left.priority.unwrap_or(f64::MIN);
    let right_priority = right.priority.unwrap_or(f64::MIN);
    right_priority
        .total_cmp(&left_priority)
        .then_with(|| right.competitor_count.cmp(&left.competitor_count))
        .then_with(|| left.key().cmp(&right.key()))
}

/// Title idea for a keyword, by content type.
pub fn suggested_title(phrase: &str, content_type: ContentType, year: i32) -> String {
    let phrase = crate::keywords::title_case(phrase);
    match content_type {
        ContentType::Blog => format!("{phrase}: Complete Guide for {year}"),
        ContentType::Tool => format!("Best {phrase} in {year} (Top Picks Compared)"),
        ContentType::Comparison => format!("{phrase}: Complete Comparison Guide"),
        ContentType::Alternative => format!("{phrase}: Top Options Compared ({year})"),
        ContentType::HowTo => format!("How to {phrase}: Step by Step Guide"),
        ContentType::Listicle => format!("{phrase}: Our Top Picks for {year}"),
        ContentType::Guide => format!("The Ultimate Guide to {phrase}"),
        ContentType::UserAdded => format!("Complete Guide to {phrase} ({year})"),
    }
}

//! Text post-processing for generated posts: banned phrase removal, stale
//! year refresh, internal link insertion and the local spelling pass.

use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use url::Url;

use crate::constants::{AMERICAN_SPELLINGS, BANNED_DASHES, BANNED_PHRASES};
use crate::keywords::normalize_phrase;

struct BannedPattern {
    phrase: &'static str,
    replacement: &'static str,
    regex: Regex,
}

fn phrase_regex(phrase: &str) -> Regex {
    let body = regex::escape(phrase)
        .replace('\'', "['\u{2019}]")
        .replace(' ', r"\s+");
    Regex::new(&format!(r"(?i)\b{body}\b")).expect("Failed to compile banned phrase regex")
}

/// Removal patterns also swallow trailing punctuation and the space after it.
static BANNED_PATTERNS: Lazy<Vec<BannedPattern>> = Lazy::new(|| {
    BANNED_PHRASES
        .iter()
        .map(|(phrase, replacement)| BannedPattern {
            phrase,
            replacement,
            regex: if replacement.is_empty() {
                let body = phrase_regex(phrase).as_str().to_owned();
                Regex::new(&format!(r"{body}[,:;]?[ \t]*"))
                    .expect("Failed to compile banned phrase regex")
            } else {
                phrase_regex(phrase)
            },
        })
        .collect()
});

static DIGIT_DASH_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d)\s*[–—]\s*(\d)").expect("Failed to compile regex"));
static DASH_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t]*[–—][ \t]*").expect("Failed to compile regex"));
static SPACED_HYPHEN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\p{L})[ \t]+-[ \t]+(\p{L})").expect("Failed to compile regex"));
static DOUBLE_COMMA_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",[ \t]*,").expect("Failed to compile regex"));
static PERIOD_COMMA_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([.!?])[ \t]*,").expect("Failed to compile regex"));
static COMMA_PERIOD_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",[ \t]*([.!?])").expect("Failed to compile regex"));
static LINE_START_COMMA_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^([ \t]*(?:[#>*-]+[ \t]+)?),[ \t]*").expect("Failed to compile regex"));
static MULTI_SPACE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\S)[ \t]{2,}").expect("Failed to compile regex"));
static TRAILING_SPACE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)[ \t]+$").expect("Failed to compile regex"));
static BLANK_LINES_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("Failed to compile regex"));

static YEAR_CONTEXT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(in|for|of|as of|during|throughout|updated|this year,?)(\s+)(20\d{2})\b(\s*[-–/]\s*\d{2,4})?",
    )
    .expect("Failed to compile year regex")
});
static YEAR_PAREN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\((20\d{2})\)").expect("Failed to compile year regex"));

static MARKDOWN_LINK_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[[^\]]*\]\([^)]*\)").expect("Failed to compile link regex"));
static LINK_TARGET_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\]\(([^)\s]+)\)").expect("Failed to compile link regex"));
static LINK_PLACEHOLDER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x01(\d+)\x01").expect("Failed to compile link regex"));
static HEADING_LINE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^#.*$").expect("Failed to compile heading regex"));

static SPELLING_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    AMERICAN_SPELLINGS
        .iter()
        .map(|(british, american)| (phrase_regex(british), *american))
        .collect()
});

/// Markdown link targets swapped out for placeholders, so text rewrites
/// never touch a URL.
struct MaskedLinks {
    text: String,
    targets: Vec<String>,
}

impl MaskedLinks {
    fn new(text: &str) -> Self {
        let mut targets = Vec::new();
        let text = LINK_TARGET_REGEX
            .replace_all(text, |captures: &Captures<'_>| {
                let index = targets.len();
                targets.push(captures.get(1).map_or("", |m| m.as_str()).to_owned());
                format!("](\u{1}{index}\u{1})")
            })
            .into_owned();
        Self { text, targets }
    }

    fn restore(&self, text: &str) -> String {
        LINK_PLACEHOLDER_REGEX
            .replace_all(text, |captures: &Captures<'_>| {
                captures
                    .get(1)
                    .and_then(|index| index.as_str().parse::<usize>().ok())
                    .and_then(|index| self.targets.get(index))
                    .cloned()
                    .unwrap_or_default()
            })
            .into_owned()
    }

    /// Runs `rewrite` over the masked text and puts the targets back.
    fn rewrite(text: &str, rewrite: impl FnOnce(&str) -> String) -> String {
        let masked = Self::new(text);
        masked.restore(&rewrite(&masked.text))
    }
}

/// Markdown link targets in `text`, in order.
pub fn link_targets(text: &str) -> Vec<String> {
    MaskedLinks::new(text).targets
}

/// Copies the capitalization of `original`'s first letter onto `replacement`.
fn match_case(original: &str, replacement: &str) -> String {
    let starts_upper = original.chars().next().is_some_and(char::is_uppercase);
    let all_upper = original.chars().filter(|c| c.is_alphabetic()).count() > 1
        && original
            .chars()
            .filter(|c| c.is_alphabetic())
            .all(char::is_uppercase);
    if all_upper {
        return replacement.to_uppercase();
    }
    let mut chars = replacement.chars();
    match chars.next() {
        Some(first) if starts_upper => first.to_uppercase().chain(chars).collect(),
        _ => replacement.to_owned(),
    }
}

fn at_sentence_start(before: &str) -> bool {
    let trimmed = before.trim_end_matches([' ', '\t']);
    trimmed.is_empty()
        || trimmed.ends_with(['.', '!', '?', '\n', '#', '>', '*', '"'])
        || trimmed.ends_with("\n-")
        || trimmed == "-"
}

/// Removes or replaces every banned phrase and dash, then tidies the
/// punctuation the removals leave behind. Link targets are left as they are.
pub fn scrub_banned(text: &str) -> String {
    MaskedLinks::rewrite(text, scrub_masked)
}

fn scrub_masked(text: &str) -> String {
    let mut text = DIGIT_DASH_REGEX.replace_all(text, "$1-$2").into_owned();
    text = DASH_REGEX.replace_all(&text, ", ").into_owned();
    text = SPACED_HYPHEN_REGEX.replace_all(&text, "$1, $2").into_owned();

    for pattern in BANNED_PATTERNS.iter() {
        if !pattern.regex.is_match(&text) {
            continue;
        }
        let source = text.clone();
        text = pattern
            .regex
            .replace_all(&source, |captures: &Captures<'_>| {
                let Some(found) = captures.get(0) else {
                    return String::new();
                };
                if !pattern.replacement.is_empty() {
                    return match_case(found.as_str(), pattern.replacement);
                }
                // Capitalize what now opens the sentence.
                let starts_sentence = source
                    .get(..found.start())
                    .is_some_and(at_sentence_start);
                let rest = source.get(found.end()..).unwrap_or_default();
                if starts_sentence && rest.starts_with(char::is_lowercase) {
                    "\u{0}".to_owned()
                } else {
                    String::new()
                }
            })
            .into_owned();
        text = capitalize_markers(&text);
    }

    tidy_punctuation(&text)
}

/// Uppercases the letter following each NUL marker and drops the marker.
fn capitalize_markers(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut capitalize_next = false;
    for c in text.chars() {
        if c == '\u{0}' {
            capitalize_next = true;
            continue;
        }
        if capitalize_next {
            output.extend(c.to_uppercase());
            capitalize_next = false;
        } else {
            output.push(c);
        }
    }
    output
}

fn tidy_punctuation(text: &str) -> String {
    let text = DOUBLE_COMMA_REGEX.replace_all(text, ",");
    let text = PERIOD_COMMA_REGEX.replace_all(&text, "$1");
    let text = COMMA_PERIOD_REGEX.replace_all(&text, "$1");
    let text = LINE_START_COMMA_REGEX.replace_all(&text, "$1");
    let text = MULTI_SPACE_REGEX.replace_all(&text, "$1 ");
    let text = TRAILING_SPACE_REGEX.replace_all(&text, "");
    let text = BLANK_LINES_REGEX.replace_all(&text, "\n\n");
    text.trim().to_owned()
}

/// Banned phrases (and dashes) still present in `text` outside link
/// targets, in list order.
pub fn find_banned(text: &str) -> Vec<&'static str> {
    let masked = MaskedLinks::new(text);
    let text = masked.text.as_str();
    let mut found: Vec<&'static str> = BANNED_PATTERNS
        .iter()
        .filter(|pattern| pattern.regex.is_match(text))
        .map(|pattern| pattern.phrase)
        .collect();
    if text.contains(BANNED_DASHES) {
        found.push("em/en dash");
    }
    found
}

/// Replaces stale years used as "now" references with `current_year`.
///
/// Years after `in`, `for`, `of`, `as of`, `during`, `throughout`, `updated`
/// or in parentheses are refreshed; ranges like `2021-2023` are left alone.
pub fn refresh_years(text: &str, current_year: i32) -> String {
    MaskedLinks::rewrite(text, |text| refresh_masked(text, current_year))
}

fn refresh_masked(text: &str, current_year: i32) -> String {
    let is_stale = |year: &str| {
        year.parse::<i32>()
            .is_ok_and(|year| (2000..current_year).contains(&year))
    };

    let text = YEAR_CONTEXT_REGEX.replace_all(text, |captures: &Captures<'_>| {
        let whole = captures.get(0).map_or("", |m| m.as_str());
        let year = captures.get(3).map_or("", |m| m.as_str());
        if captures.get(4).is_some() || !is_stale(year) {
            return whole.to_owned();
        }
        let lead = captures.get(1).map_or("", |m| m.as_str());
        let gap = captures.get(2).map_or(" ", |m| m.as_str());
        format!("{lead}{gap}{current_year}")
    });

    YEAR_PAREN_REGEX
        .replace_all(&text, |captures: &Captures<'_>| {
            let year = captures.get(1).map_or("", |m| m.as_str());
            if is_stale(year) {
                format!("({current_year})")
            } else {
                format!("({year})")
            }
        })
        .into_owned()
}

/// Byte ranges that must not receive a new link.
fn protected_ranges(text: &str) -> Vec<(usize, usize)> {
    MARKDOWN_LINK_REGEX
        .find_iter(text)
        .chain(HEADING_LINE_REGEX.find_iter(text))
        .map(|found| (found.start(), found.end()))
        .collect()
}

/// Links the first unprotected occurrence of each anchor to its URL.
///
/// Longer anchors go first, each anchor and each URL is linked at most once,
/// URLs already linked in `text` are skipped and no more than `max_links`
/// links are added. Returns the new text and the number of links added.
pub fn inject_links(
    text: &str,
    link_map: &BTreeMap<String, Url>,
    max_links: usize,
) -> (String, usize) {
    let mut anchors: Vec<(&String, &Url)> = link_map.iter().collect();
    anchors.sort_by(|(left, _), (right, _)| {
        right.len().cmp(&left.len()).then_with(|| left.cmp(right))
    });

    let mut text = text.to_owned();
    let mut linked_urls: BTreeSet<String> = BTreeSet::new();
    let mut linked_anchors: BTreeSet<String> = BTreeSet::new();
    let mut added = 0;

    for (anchor, url) in anchors {
        if added >= max_links {
            break;
        }
        let anchor_key = normalize_phrase(anchor);
        if anchor_key.is_empty()
            || linked_anchors.contains(&anchor_key)
            || linked_urls.contains(url.as_str())
            || text.contains(&format!("]({url}"))
        {
            continue;
        }

        let regex = phrase_regex(anchor.trim());
        let protected = protected_ranges(&text);
        let target = regex.find_iter(&text).find(|found| {
            !protected
                .iter()
                .any(|(start, end)| found.start() < *end && *start < found.end())
        });
        let Some(found) = target else {
            continue;
        };

        let (start, end) = (found.start(), found.end());
        let linked = format!("[{}]({url})", found.as_str());
        text.replace_range(start..end, &linked);

        linked_anchors.insert(anchor_key);
        linked_urls.insert(url.to_string());
        added += 1;
    }

    (text, added)
}

/// Local spelling pass: rewrites common British spellings outside link
/// targets.
pub fn americanize(text: &str) -> String {
    MaskedLinks::rewrite(text, americanize_masked)
}

fn americanize_masked(text: &str) -> String {
    let mut text = text.to_owned();
    for (regex, american) in SPELLING_PATTERNS.iter() {
        if regex.is_match(&text) {
            text = regex
                .replace_all(&text, |captures: &Captures<'_>| {
                    let original = captures.get(0).map_or("", |m| m.as_str());
                    match_case(original, american)
                })
                .into_owned();
        }
    }
    text
}

/// Whitespace-separated word count.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Meta description of at most 160 characters, cut at a word boundary.
pub fn normalize_meta_description(description: &str, keyword: &str) -> String {
    let description = description.split_whitespace().collect::<Vec<_>>().join(" ");
    if description.is_empty() {
        return format!("Learn about {keyword} with practical tips, examples and answers to common questions.")
            .chars()
            .take(160)
            .collect();
    }
    if description.chars().count() <= 160 {
        return description;
    }
    let mut cut = String::new();
    for word in description.split(' ') {
        if cut.chars().count() + word.chars().count() + 1 > 157 {
            break;
        }
        if !cut.is_empty() {
            cut.push(' ');
        }
        cut.push_str(word);
    }
    format!("{}...", cut.trim_end_matches([',', '.', ';', ':']))
}

/// Short URL slug from a keyword, at most 5 words and 50 characters.
pub fn slugify(keyword: &str) -> String {
    const SLUG_STOP_WORDS: &[&str] = &[
        "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
        "is", "are", "your", "you",
    ];
    let normalized = normalize_phrase(keyword);
    let words: Vec<&str> = normalized.split(' ').filter(|word| !word.is_empty()).collect();
    let kept: Vec<&str> = if words.len() <= 3 {
        words.clone()
    } else {
        words
            .iter()
            .copied()
            .filter(|word| !SLUG_STOP_WORDS.contains(word))
            .collect()
    };
    let chosen = if kept.len() < 2 { words } else { kept };
    let mut slug = chosen.into_iter().take(5).collect::<Vec<_>>().join("-");
    if slug.len() > 50 {
        slug = slug.chars().take(50).collect::<String>();
        slug = slug.trim_end_matches('-').to_owned();
    }
    if slug.is_empty() { "post".to_owned() } else { slug }
}

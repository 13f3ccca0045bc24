//! Page bodies for style sampling: fetching and turning HTML into plain text.

use crate::TextBy;

use anyhow::Result;
use dom_smoothie::{Article, CandidateSelectMode, Config, Readability, TextMode};
use html2md;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector as ScraperSelector};

use crate::error::GapError;
use crate::sitemap::SitemapFetcher;

static WHITESPACE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("Failed to compile whitespace regex"));

/// Elements whose text never belongs to the article body.
const BOILERPLATE_TAGS: &[&str] = &[
    "script", "style", "nav", "footer", "header", "aside", "noscript", "form",
];

/// Title and readable text of one company page.
#[derive(Debug)]
pub struct PageArticle {
    pub title: Option<String>,
    /// Whitespace-collapsed text, Markdown-flavoured for `DomSmoothie`.
    pub text: String,
}

impl PageArticle {
    /// The text cut to `max_chars`, headed by the page title when there is one.
    pub fn sample(&self, max_chars: usize) -> String {
        let text: String = self.text.chars().take(max_chars).collect();
        match &self.title {
            Some(title) => format!("Title: {title}\n{text}"),
            None => text,
        }
    }
}

/// Runs the chosen extractor over a whole page.
///
/// # Errors
///
/// Returns an error when `dom_smoothie` cannot build or parse the document.
pub fn extract_article(html: &str, text_by: TextBy) -> Result<PageArticle> {
    let text = match text_by {
        TextBy::DomSmoothie => {
            let config = Config {
                text_mode: TextMode::Markdown,
                candidate_select_mode: CandidateSelectMode::DomSmoothie,
                ..Default::default()
            };
            let mut readability = Readability::new(html, None, Some(config))?;
            let article: Article = readability.parse()?;
            article.text_content.to_string()
        }
        TextBy::FastHtml2Md => html2md::parse_html(html, false),
    };

    Ok(PageArticle {
        title: parse_title(html),
        text,
    })
}

/// First non-empty `title`, `h1` or `h2` text.
pub fn parse_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    ["title", "h1", "h2"]
        .iter()
        .filter_map(|tag| ScraperSelector::parse(tag).ok())
        .filter_map(|selector| {
            document.select(&selector).next().map(|element| {
                WHITESPACE_REGEX
                    .replace_all(&element.text().collect::<String>(), " ")
                    .trim()
                    .to_owned()
            })
        })
        .find(|text| !text.is_empty())
}

/// Plain text of the main content: `main`, `article`, a content-like
/// container, or `body`, skipping navigation and script elements.
pub fn main_text(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let root = [
        "main",
        "article",
        "[class*=content], [class*=post], [class*=article], [class*=entry]",
        "body",
    ]
    .iter()
    .filter_map(|query| ScraperSelector::parse(query).ok())
    .find_map(|selector| document.select(&selector).next())?;

    let text = WHITESPACE_REGEX
        .replace_all(&visible_text(root), " ")
        .trim()
        .to_owned();
    (!text.is_empty()).then_some(text)
}

fn visible_text(root: ElementRef<'_>) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for node in root.descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|element| BOILERPLATE_TAGS.contains(&element.name()))
        });
        if !hidden {
            parts.push(&**text);
        }
    }
    parts.join(" ")
}

/// Fetches a page and returns its readable text.
///
/// The chosen extractor is tried first; when it fails or finds nothing the
/// main-content fallback is used.
///
/// # Errors
///
/// Returns [`GapError::Fetch`] when the page cannot be downloaded or holds no text.
pub async fn fetch_page_text(
    fetcher: &SitemapFetcher,
    url: &str,
    text_by: TextBy,
) -> Result<PageArticle, GapError> {
    let html = fetcher.get_text(url).await?;

    let article = match extract_article(&html, text_by) {
        Ok(article) if !article.text.trim().is_empty() => Some(article),
        Ok(_) => None,
        Err(err) => {
            debug!("Extractor failed on {url}: {err}");
            None
        }
    };

    let article = match article {
        Some(article) => article,
        None => PageArticle {
            title: parse_title(&html),
            text: main_text(&html).ok_or_else(|| GapError::fetch(url, "no readable text"))?,
        },
    };

    Ok(PageArticle {
        title: article.title,
        text: WHITESPACE_REGEX
            .replace_all(&article.text, " ")
            .trim()
            .to_owned(),
    })
}

//! The gapscribe library finds keyword gaps between a company site and its
//! competitors using their sitemaps, then drafts blog posts for the selected
//! gaps with an LLM, styled after the company's existing writing.

pub mod cleanup;
pub mod config;
pub mod constants;
pub mod error;
pub mod export;
pub mod generator;
pub mod keywords;
pub mod llm;
pub mod page;
pub mod ranking;
pub mod retry;
pub mod run;
pub mod sitemap;
pub mod style;

/// Enum representing the text extraction method.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum TextBy {
    /// Use dom_smoothie for text extraction
    #[default]
    DomSmoothie,
    /// Use fast_html2md for text extraction
    FastHtml2Md,
}

impl std::str::FromStr for TextBy {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.to_lowercase().as_str() {
            "dom_smoothie" => Ok(TextBy::DomSmoothie),
            "fast_html2md" => Ok(TextBy::FastHtml2Md),
            _ => Err(format!("Invalid text extraction method: {input}")),
        }
    }
}

/// Enum representing an export target for generated posts.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// One JSON document holding every post.
    Json,
    /// One CSV table, a row per post.
    Csv,
    /// One Markdown file per post.
    Markdown,
}

impl ExportFormat {
    /// All formats, the default export set.
    pub const ALL: [ExportFormat; 3] = [Self::Json, Self::Csv, Self::Markdown];
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "markdown" | "md" => Ok(Self::Markdown),
            _ => Err(format!("Invalid export format: {input}")),
        }
    }
}

pub use error::GapError;
pub use export::export_all;
pub use generator::{BlogGenerator, BlogPost, GenerationOutcome, PostStatus};
pub use keywords::{Keyword, KeywordExtractor};
pub use llm::CompletionContext;
pub use ranking::rank;
pub use run::{Orchestrator, RunState};
pub use sitemap::{SiteEntry, SitemapFetcher};
pub use style::{StyleAnalyzer, StyleProfile};

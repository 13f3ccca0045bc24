//! The export module writes generated posts to JSON, CSV and Markdown files.

use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;

use crate::ExportFormat;
use crate::generator::BlogPost;

const CSV_HEADER: &[&str] = &[
    "Keyword",
    "Type",
    "Title",
    "Meta Description",
    "Content",
    "Word Count",
    "Status",
    "Generated At",
];

#[derive(Serialize)]
struct JsonExport<'a> {
    generated_at: DateTime<Utc>,
    total_blogs: usize,
    blogs: Vec<JsonBlog<'a>>,
}

#[derive(Serialize)]
struct JsonBlog<'a> {
    keyword: &'a str,
    #[serde(rename = "type")]
    content_type: String,
    title: &'a str,
    meta_description: &'a str,
    content: &'a str,
    word_count: usize,
    status: String,
    created_at: DateTime<Utc>,
    slug: &'a str,
}

impl<'a> From<&'a BlogPost> for JsonBlog<'a> {
    fn from(post: &'a BlogPost) -> Self {
        Self {
            keyword: &post.keyword,
            content_type: format!("{:?}", post.content_type),
            title: &post.title,
            meta_description: &post.meta_description,
            content: &post.content,
            word_count: post.word_count,
            status: post.status.to_string(),
            created_at: post.created_at,
            slug: &post.slug,
        }
    }
}

/// Writes `posts` in every requested format into `dir` and returns the
/// written paths. File names carry the export timestamp.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or a file cannot be written.
pub fn export_all(posts: &[BlogPost], dir: &Path, formats: &[ExportFormat]) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let now = Utc::now();
    let stamp = now.format("%Y%m%d_%H%M%S").to_string();
    let formats: BTreeSet<ExportFormat> = formats.iter().copied().collect();
    let mut written = Vec::new();

    for format in formats {
        match format {
            ExportFormat::Json => {
                let path = dir.join(format!("blogs_{stamp}.json"));
                write_file(&path, &export_json(posts, now)?)?;
                written.push(path);
            }
            ExportFormat::Csv => {
                let path = dir.join(format!("blogs_{stamp}.csv"));
                write_file(&path, &export_csv(posts))?;
                written.push(path);
            }
            ExportFormat::Markdown => {
                let markdown_dir = dir.join(format!("markdown_{stamp}"));
                fs::create_dir_all(&markdown_dir).with_context(|| {
                    format!("Failed to create directory {}", markdown_dir.display())
                })?;
                let mut used = BTreeSet::new();
                for post in posts {
                    let stem = unique_stem(&post.slug, &mut used);
                    let path = markdown_dir.join(format!("{stem}.md"));
                    write_file(&path, &export_markdown(post))?;
                    written.push(path);
                }
            }
        }
    }

    info!("Exported {} posts to {} files in {}", posts.len(), written.len(), dir.display());
    Ok(written)
}

/// JSON document with every post.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn export_json(posts: &[BlogPost], generated_at: DateTime<Utc>) -> Result<String> {
    let export = JsonExport {
        generated_at,
        total_blogs: posts.len(),
        blogs: posts.iter().map(JsonBlog::from).collect(),
    };
    Ok(serde_json::to_string_pretty(&export)?)
}

/// One CSV row per post, fields quoted when they need it.
pub fn export_csv(posts: &[BlogPost]) -> String {
    let mut output = csv_row(CSV_HEADER.iter().map(|field| (*field).to_owned()));
    for post in posts {
        output.push_str(&csv_row([
            post.keyword.clone(),
            format!("{:?}", post.content_type),
            post.title.clone(),
            post.meta_description.clone(),
            post.content.clone(),
            post.word_count.to_string(),
            post.status.to_string(),
            post.created_at.to_rfc3339(),
        ]));
    }
    output
}

fn csv_row(fields: impl IntoIterator<Item = String>) -> String {
    let mut row = fields
        .into_iter()
        .map(|field| csv_field(&field))
        .collect::<Vec<_>>()
        .join(",");
    row.push_str("\r\n");
    row
}

fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_owned()
    }
}

/// A standalone Markdown document for one post.
pub fn export_markdown(post: &BlogPost) -> String {
    let mut document = format!(
        "# {}\n\n**Meta Description:** {}\n\n**Keyword:** {}\n\n**Word Count:** {}\n\n**Status:** {}\n\n---\n\n",
        post.title, post.meta_description, post.keyword, post.word_count, post.status
    );
    document.push_str(&post.content);
    document.push('\n');
    document
}

fn unique_stem(slug: &str, used: &mut BTreeSet<String>) -> String {
    let mut stem = slug.to_owned();
    let mut suffix = 2;
    while !used.insert(stem.clone()) {
        stem = format!("{slug}-{suffix}");
        suffix += 1;
    }
    stem
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

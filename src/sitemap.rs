//! Sitemap discovery and parsing for a domain, the URL filters that keep only
//! English content pages, and LLM-assisted competitor domain resolution.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::time::Duration;

use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::StatusCode;
use sitemap::reader::{SiteMapEntity, SiteMapReader};
use sitemap::structs::Location;
use url::Url;

use crate::constants::{
    DOMAIN_RESOLUTION_PROMPT, FOREIGN_LANGUAGE_CODES, FOREIGN_PATH_MARKERS, NON_CONTENT_EXTENSIONS,
    NON_CONTENT_SEGMENTS, SITEMAP_FALLBACK_PATHS, SUBDOMAIN_PROMPT, USER_AGENT,
};
use crate::error::GapError;
use crate::llm::{CompletionContext, extract_json_array, extract_json_object};
use crate::retry::{RetryPolicy, retry_with_backoff};

static LOCALE_SEGMENT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z]{2}[-_][a-z]{2}$").expect("Failed to compile locale regex"));

/// Percent-encoded UTF-8 lead bytes, i.e. a non-ASCII character in the path.
static NON_ASCII_ESCAPE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)%[c-f][0-9a-f]").expect("Failed to compile escape regex"));

static ROBOTS_SITEMAP_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^\s*sitemap:\s*(\S+)").expect("Failed to compile robots regex")
});

/// A page URL found in a sitemap.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SiteEntry {
    pub url: Url,
    pub domain: String,
    /// Lowercased, non-empty path segments.
    pub slug_segments: Vec<String>,
    pub is_english: bool,
    pub is_content_page: bool,
}

impl SiteEntry {
    pub fn from_url(url: Url, domain: &str) -> Self {
        let slug_segments: Vec<String> = url
            .path_segments()
            .map(|segments| {
                segments
                    .filter(|segment| !segment.is_empty())
                    .map(str::to_lowercase)
                    .collect()
            })
            .unwrap_or_default();
        let is_english = is_english_url(&url);
        let is_content_page = is_content_path(&slug_segments);

        Self {
            url,
            domain: domain.to_owned(),
            slug_segments,
            is_english,
            is_content_page,
        }
    }

    /// The URL path without a trailing slash, e.g. `/blog/video-tips`.
    pub fn slug(&self) -> String {
        format!("/{}", self.slug_segments.join("/"))
    }
}

/// Result of fetching one domain: never an error, a failure is a note.
#[derive(Debug, Default)]
pub struct SitemapFetch {
    pub domain: String,
    pub entries: Vec<SiteEntry>,
    pub failure: Option<String>,
    pub documents_fetched: usize,
}

/// Bounds that keep a misconfigured or hostile sitemap tree finite.
#[derive(Clone, Copy, Debug)]
pub struct SitemapLimits {
    pub max_documents: usize,
    pub max_urls: usize,
}

impl Default for SitemapLimits {
    fn default() -> Self {
        Self {
            max_documents: 50,
            max_urls: 5000,
        }
    }
}

/// Outcome of a single HTTP attempt, tagged with whether retrying may help.
#[derive(Debug)]
struct Attempt {
    reason: String,
    transient: bool,
}

impl fmt::Display for Attempt {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.reason)
    }
}

impl From<reqwest::Error> for Attempt {
    fn from(err: reqwest::Error) -> Self {
        let transient = err.is_timeout() || err.is_connect() || err.is_request();
        Self {
            reason: err.to_string(),
            transient,
        }
    }
}

/// HTTP client used for sitemaps, robots.txt and page bodies.
pub struct SitemapFetcher {
    client: reqwest::Client,
    retry: RetryPolicy,
    limits: SitemapLimits,
}

impl SitemapFetcher {
    /// Creates a fetcher whose every request is bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`GapError::Configuration`] if the HTTP client cannot be built.
    pub fn new(timeout: Duration, retry: RetryPolicy) -> Result<Self, GapError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|err| GapError::Configuration(format!("HTTP client: {err}")))?;

        Ok(Self {
            client,
            retry,
            limits: SitemapLimits::default(),
        })
    }

    #[must_use]
    pub fn with_limits(mut self, limits: SitemapLimits) -> Self {
        self.limits = limits;
        self
    }

    /// GETs `url` and returns its body, retrying transient failures.
    ///
    /// # Errors
    ///
    /// Returns [`GapError::Fetch`] on network errors and non-success statuses.
    pub async fn get_text(&self, url: &str) -> Result<String, GapError> {
        let client = &self.client;
        retry_with_backoff(
            self.retry,
            url,
            |attempt: &Attempt| attempt.transient,
            move || async move {
                let response = client.get(url).send().await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(Attempt {
                        reason: format!("HTTP status {status}"),
                        transient: status == StatusCode::TOO_MANY_REQUESTS
                            || status.is_server_error(),
                    });
                }
                Ok::<String, Attempt>(response.text().await?)
            },
        )
        .await
        .map_err(|attempt| GapError::fetch(url, attempt))
    }

    /// Checks that a host answers a HEAD request with a status below 400.
    pub async fn domain_exists(&self, domain: &str) -> bool {
        let Ok(base) = base_url(domain) else {
            return false;
        };
        match self.client.head(base.as_str()).send().await {
            Ok(response) => response.status().as_u16() < 400,
            Err(err) => {
                debug!("HEAD {base} failed: {err}");
                false
            }
        }
    }

    /// Collects the English content pages listed by a domain's sitemaps.
    ///
    /// `robots.txt` sitemaps and `/sitemap.xml` are tried first, then the
    /// fallback paths while nothing has been found. Sitemap indexes are
    /// followed breadth-first, each document at most once.
    pub async fn fetch_domain(&self, domain: &str) -> SitemapFetch {
        let label = normalize_domain(domain);
        let mut fetch = SitemapFetch {
            domain: label.clone(),
            ..SitemapFetch::default()
        };

        let base = match base_url(domain) {
            Ok(base) => base,
            Err(err) => {
                fetch.failure = Some(err.to_string());
                return fetch;
            }
        };

        let mut queue: VecDeque<Url> = self.robots_sitemaps(&base).await.into();
        if let Ok(primary) = base.join("/sitemap.xml") {
            queue.push_back(primary);
        }
        let mut fallbacks = SITEMAP_FALLBACK_PATHS
            .iter()
            .filter_map(|path| base.join(path).ok());

        let mut visited: HashSet<String> = HashSet::new();
        let mut seen_urls: HashSet<String> = HashSet::new();
        let mut found_sitemap = false;
        let mut last_problem: Option<String> = None;

        loop {
            if fetch.documents_fetched >= self.limits.max_documents {
                warn!(
                    "{label}: stopping after {} sitemap documents",
                    self.limits.max_documents
                );
                break;
            }
            if fetch.entries.len() >= self.limits.max_urls {
                break;
            }

            let next = match queue.pop_front() {
                Some(url) => url,
                None if found_sitemap => break,
                None => match fallbacks.next() {
                    Some(url) => url,
                    None => break,
                },
            };
            if !visited.insert(next.to_string()) {
                continue;
            }

            fetch.documents_fetched += 1;
            let content = match self.get_text(next.as_str()).await {
                Ok(content) => content,
                Err(err) => {
                    debug!("{err}");
                    last_problem.get_or_insert_with(|| err.to_string());
                    continue;
                }
            };

            let document = parse_sitemap_document(&content);
            if document.malformed {
                last_problem = Some(format!("malformed sitemap XML at {next}"));
                continue;
            }
            found_sitemap = true;

            for child in document.children {
                match Url::parse(&child) {
                    Ok(child) if !visited.contains(child.as_str()) => queue.push_back(child),
                    Ok(_) => debug!("{label}: sitemap {child} already visited"),
                    Err(err) => debug!("{label}: bad child sitemap {child}: {err}"),
                }
            }

            for loc in document.urls {
                if fetch.entries.len() >= self.limits.max_urls {
                    break;
                }
                let Ok(url) = Url::parse(&loc) else {
                    continue;
                };
                let entry = SiteEntry::from_url(url, &label);
                if entry.is_english
                    && entry.is_content_page
                    && seen_urls.insert(entry.url.to_string())
                {
                    fetch.entries.push(entry);
                }
            }
        }

        if !found_sitemap {
            fetch.failure = Some(
                last_problem.unwrap_or_else(|| format!("no sitemap found for {label}")),
            );
        }

        info!(
            "{label}: {} content URLs from {} sitemap documents",
            fetch.entries.len(),
            fetch.documents_fetched
        );
        fetch
    }

    async fn robots_sitemaps(&self, base: &Url) -> Vec<Url> {
        let Ok(robots_url) = base.join("/robots.txt") else {
            return Vec::new();
        };
        match self.get_text(robots_url.as_str()).await {
            Ok(robots) => ROBOTS_SITEMAP_REGEX
                .captures_iter(&robots)
                .filter_map(|captures| captures.get(1))
                .filter_map(|location| Url::parse(location.as_str().trim()).ok())
                .collect(),
            Err(err) => {
                debug!("No robots.txt sitemaps: {err}");
                Vec::new()
            }
        }
    }
}

/// Page and child-sitemap locations found in one XML document.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SitemapDocument {
    pub urls: Vec<String>,
    pub children: Vec<String>,
    pub malformed: bool,
}

/// Parses a `<urlset>` or `<sitemapindex>` document.
pub fn parse_sitemap_document(content: &str) -> SitemapDocument {
    let mut document = SitemapDocument::default();
    let mut errors = 0_usize;

    for entity in SiteMapReader::new(content.as_bytes()) {
        match entity {
            SiteMapEntity::Url(url_entry) => {
                if let Location::Url(ref url) = url_entry.loc {
                    document.urls.push(url.to_string());
                }
            }
            SiteMapEntity::SiteMap(sitemap_entry) => {
                if let Location::Url(ref url) = sitemap_entry.loc {
                    document.children.push(url.to_string());
                }
            }
            SiteMapEntity::Err(_) => errors += 1,
        }
    }

    let looks_like_sitemap = content.contains("<urlset") || content.contains("<sitemapindex");
    let nothing_parsed = document.urls.is_empty() && document.children.is_empty();
    document.malformed = !looks_like_sitemap || (errors > 0 && nothing_parsed);
    document
}

/// Lowercases a domain and strips scheme, `www.` and any path.
pub fn normalize_domain(domain: &str) -> String {
    let lowered = domain.trim().to_lowercase();
    let without_scheme = lowered
        .strip_prefix("https://")
        .or_else(|| lowered.strip_prefix("http://"))
        .unwrap_or(&lowered);
    let host = without_scheme.split('/').next().unwrap_or_default();
    host.strip_prefix("www.").unwrap_or(host).to_owned()
}

/// Base URL for a domain; a value that already has a scheme is kept as-is.
///
/// # Errors
///
/// Returns [`GapError::Configuration`] when no host can be parsed.
pub fn base_url(domain: &str) -> Result<Url, GapError> {
    let trimmed = domain.trim().trim_end_matches('/');
    let candidate = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_owned()
    } else {
        format!("https://{trimmed}")
    };
    let url = Url::parse(&candidate)
        .map_err(|err| GapError::Configuration(format!("invalid domain {domain:?}: {err}")))?;
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(GapError::Configuration(format!(
            "invalid domain {domain:?}: no host"
        ))),
    }
}

/// True for something that looks like a bare domain or a URL with a host.
pub fn is_valid_domain(domain: &str) -> bool {
    let normalized = normalize_domain(domain);
    let has_scheme = domain.trim().starts_with("http://") || domain.trim().starts_with("https://");
    !normalized.is_empty()
        && !normalized.contains(char::is_whitespace)
        && (normalized.contains('.') || has_scheme)
        && base_url(domain).is_ok()
}

/// English heuristic: no non-ASCII path, no locale segment, no foreign `lang=`.
pub fn is_english_url(url: &Url) -> bool {
    let path = url.path().to_lowercase();
    if NON_ASCII_ESCAPE_REGEX.is_match(&path) || !path.is_ascii() {
        return false;
    }
    let padded = format!("{path}/");
    if FOREIGN_PATH_MARKERS
        .iter()
        .any(|marker| padded.contains(marker))
    {
        return false;
    }

    // Bare language codes only count as a locale in the first segment.
    let mut segments = path.split('/').filter(|segment| !segment.is_empty());
    let leading_code = segments
        .next()
        .is_some_and(|first| FOREIGN_LANGUAGE_CODES.contains(&first) || is_foreign_locale(first));
    if leading_code || segments.any(is_foreign_locale) {
        return false;
    }
    !url.query_pairs().any(|(key, value)| {
        matches!(key.as_ref(), "lang" | "locale" | "hl")
            && !value.to_lowercase().starts_with("en")
    })
}

fn is_foreign_locale(segment: &str) -> bool {
    LOCALE_SEGMENT_REGEX.is_match(segment) && !segment.starts_with("en")
}

/// Content heuristic: not the root page, no denylisted segment, no asset extension.
pub fn is_content_path(segments: &[String]) -> bool {
    let Some(last) = segments.last() else {
        return false;
    };
    if NON_CONTENT_EXTENSIONS
        .iter()
        .any(|extension| last.ends_with(extension))
    {
        return false;
    }
    !segments
        .iter()
        .any(|segment| NON_CONTENT_SEGMENTS.contains(&segment.as_str()))
}

/// A competitor name paired with the domain it resolved to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompetitorDomain {
    pub name: String,
    /// Normalized domain, the label keywords are attributed to.
    pub domain: String,
    /// What the fetcher is pointed at; keeps an explicit scheme when one was given.
    pub address: String,
}

/// Names resolved to domains and the names that could not be resolved.
#[derive(Debug, Default)]
pub struct Resolution {
    pub resolved: Vec<CompetitorDomain>,
    pub unresolved: Vec<String>,
}

/// Resolves competitor names to domains. Names that already are domains are
/// taken as-is; the rest are resolved with one LLM call.
pub async fn resolve_domains(ctx: &CompletionContext<'_>, names: &[String]) -> Resolution {
    let mut resolution = Resolution::default();
    let mut to_ask: Vec<&str> = Vec::new();

    for name in names.iter().map(|name| name.trim()).filter(|name| !name.is_empty()) {
        if !name.contains(' ') && is_valid_domain(name) {
            resolution.resolved.push(CompetitorDomain {
                name: name.to_owned(),
                domain: normalize_domain(name),
                address: name.trim_end_matches('/').to_owned(),
            });
        } else {
            to_ask.push(name);
        }
    }
    if to_ask.is_empty() {
        return resolution;
    }

    let listing = to_ask
        .iter()
        .map(|name| format!("- {name}"))
        .collect::<Vec<_>>()
        .join("\n");
    let prompt = DOMAIN_RESOLUTION_PROMPT.replace("{names}", &listing);

    let answers: HashMap<String, String> = match ctx.complete("domain resolution", &prompt).await {
        Ok(response) => extract_json_object::<HashMap<String, String>>(&response)
            .unwrap_or_default()
            .into_iter()
            .map(|(name, domain)| (name.trim().to_lowercase(), domain))
            .collect(),
        Err(err) => {
            warn!("{err}");
            HashMap::new()
        }
    };

    for name in to_ask {
        match answers.get(&name.to_lowercase()) {
            Some(domain) if is_valid_domain(domain) => {
                info!("Resolved {name} to {domain}");
                resolution.resolved.push(CompetitorDomain {
                    name: name.to_owned(),
                    domain: normalize_domain(domain),
                    address: normalize_domain(domain),
                });
            }
            _ => resolution.unresolved.push(name.to_owned()),
        }
    }

    resolution
}

/// Asks the LLM for likely content subdomains and keeps the reachable ones.
pub async fn find_subdomains(
    ctx: &CompletionContext<'_>,
    fetcher: &SitemapFetcher,
    domain: &str,
) -> Vec<String> {
    let domain = normalize_domain(domain);
    let prompt = SUBDOMAIN_PROMPT.replace("{domain}", &domain);
    let candidates: Vec<String> = match ctx.complete("subdomain discovery", &prompt).await {
        Ok(response) => extract_json_array(&response).unwrap_or_default(),
        Err(err) => {
            warn!("{err}");
            return Vec::new();
        }
    };

    let suffix = format!(".{domain}");
    let mut subdomains = Vec::new();
    for candidate in candidates {
        let candidate = normalize_domain(&candidate);
        if candidate.ends_with(&suffix)
            && !subdomains.contains(&candidate)
            && fetcher.domain_exists(&candidate).await
        {
            subdomains.push(candidate);
        }
    }
    subdomains
}

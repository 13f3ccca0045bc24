//! Run configuration: the options a pipeline run consumes, loaded from an
//! optional JSON file, and the checks that must pass before any network call.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Context;
use llm::builder::{LLMBackend, LLMBuilder};
use serde::Deserialize;
use url::Url;

use crate::ExportFormat;
use crate::error::GapError;
use crate::sitemap::is_valid_domain;

/// Everything one pipeline run needs besides the model credentials.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub company_name: String,
    pub company_domain: String,
    /// Extra company domains, e.g. a blog subdomain.
    pub additional_domains: Vec<String>,
    /// Competitor names or domains.
    pub competitors: Vec<String>,
    /// User-added keywords, ranked alongside the discovered gaps.
    pub keywords: Vec<String>,
    /// Model URL, `backend://model`.
    pub model: String,
    pub max_blogs: usize,
    pub min_keyword_frequency: u32,
    pub output_dir: PathBuf,
    pub min_words: usize,
    pub max_expansion_attempts: u32,
    pub style_sample_size: usize,
    pub export_formats: Vec<ExportFormat>,
    /// Use the model's relevance as the `score` term of the priority.
    pub use_relevance_score: bool,
    /// Ask the model for content subdomains of the company domain.
    pub discover_subdomains: bool,
    pub requests_per_minute: Option<u32>,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            company_name: String::new(),
            company_domain: String::new(),
            additional_domains: Vec::new(),
            competitors: Vec::new(),
            keywords: Vec::new(),
            model: String::new(),
            max_blogs: 10,
            min_keyword_frequency: 2,
            output_dir: PathBuf::from("output"),
            min_words: 2_500,
            max_expansion_attempts: 2,
            style_sample_size: 20,
            export_formats: ExportFormat::ALL.to_vec(),
            use_relevance_score: false,
            discover_subdomains: false,
            requests_per_minute: None,
            timeout_secs: 30,
            max_retries: 2,
            max_tokens: 8_000,
            temperature: 0.7,
        }
    }
}

impl RunConfig {
    /// Reads a JSON config file; missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Checks the configuration before anything touches the network.
    ///
    /// # Errors
    ///
    /// Returns [`GapError::Configuration`] for an empty company name, an
    /// invalid domain, an unparsable model URL, a missing API key for a remote
    /// backend or out-of-range numbers.
    pub fn validate(&self, api_key: Option<&str>) -> Result<ModelSpec, GapError> {
        if self.company_name.trim().is_empty() {
            return Err(GapError::Configuration("company name is empty".to_owned()));
        }
        if !is_valid_domain(&self.company_domain) {
            return Err(GapError::Configuration(format!(
                "invalid company domain {:?}",
                self.company_domain
            )));
        }
        if let Some(domain) = self
            .additional_domains
            .iter()
            .find(|domain| !is_valid_domain(domain))
        {
            return Err(GapError::Configuration(format!(
                "invalid additional domain {domain:?}"
            )));
        }
        if self.min_words == 0 {
            return Err(GapError::Configuration("min_words must be positive".to_owned()));
        }
        if self.export_formats.is_empty() {
            return Err(GapError::Configuration("no export format selected".to_owned()));
        }

        let model_spec = ModelSpec::parse(&self.model)?;
        if model_spec.requires_api_key() && api_key.is_none_or(|key| key.trim().is_empty()) {
            return Err(GapError::Configuration(format!(
                "backend {} needs an API key in {}",
                model_spec.backend,
                crate::constants::MODEL_API_KEY_ENV_NAME
            )));
        }
        Ok(model_spec)
    }
}

/// A parsed model URL such as `openai://gpt-4o` or `ollama://latest@llama3`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelSpec {
    /// Backend name, the URL scheme.
    pub backend: String,
    /// Model name; `tag@name` becomes `name:tag`.
    pub name: String,
}

impl ModelSpec {
    /// # Errors
    ///
    /// Returns [`GapError::Configuration`] when the URL, backend or model name is invalid.
    pub fn parse(model: &str) -> Result<Self, GapError> {
        let model_url = Url::parse(model)
            .map_err(|err| GapError::Configuration(format!("invalid model URL {model:?}: {err}")))?;
        LLMBackend::from_str(model_url.scheme())
            .map_err(|err| GapError::Configuration(format!("invalid LLM backend: {err}")))?;
        let host = model_url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| {
                GapError::Configuration("specify the model name as the URL host".to_owned())
            })?;
        let name = [host, model_url.username()]
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(":");

        Ok(Self {
            backend: model_url.scheme().to_owned(),
            name,
        })
    }

    /// Local backends run without a key.
    pub fn requires_api_key(&self) -> bool {
        self.backend != "ollama"
    }

    /// Builder for the configured backend and model.
    ///
    /// # Errors
    ///
    /// Returns [`GapError::Configuration`] when the backend is unknown.
    pub fn builder(
        &self,
        api_key: Option<&str>,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<LLMBuilder, GapError> {
        let backend = LLMBackend::from_str(&self.backend)
            .map_err(|err| GapError::Configuration(format!("invalid LLM backend: {err}")))?;
        let builder = LLMBuilder::new()
            .backend(backend)
            .model(&self.name)
            .max_tokens(max_tokens)
            .temperature(temperature);
        Ok(match api_key {
            Some(key) => builder.api_key(key),
            None => builder,
        })
    }
}

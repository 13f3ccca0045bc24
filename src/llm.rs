//! The llm module wraps the chat model behind a single completion call with
//! rate limiting, bounded retries and `<think>` stripping, plus helpers that
//! pull JSON out of free-form model answers.

use llm::chat::{ChatMessage, ChatProvider};
use llm::error::LLMError;
use log::debug;
use once_cell::sync::Lazy;
use rate_guard::{RateLimit, StdTokenBucket, TokenBucketBuilder};
use regex::Regex;
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::constants::THINK_STRIPPER;
use crate::error::GapError;
use crate::retry::{RetryPolicy, retry_with_backoff};

static THINK_STRIPPER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(THINK_STRIPPER).expect("Failed to compile THINK_STRIPPER regex"));

/// Configuration containing shared data for every LLM call of a run
pub struct CompletionContext<'a> {
    /// LLM model answering the prompts
    pub model: &'a dyn ChatProvider,
    /// Rate limiter for controlling request frequency
    pub rate_limiter: Option<&'a StdTokenBucket>,
    /// Retry budget for transient failures
    pub retry: RetryPolicy,
}

impl CompletionContext<'_> {
    /// Sends `prompt` as a single user message and returns the answer text.
    ///
    /// `stage` names the pipeline step in logs and errors.
    ///
    /// # Errors
    ///
    /// Returns [`GapError::AiService`] once the retry budget is spent or the
    /// error is not transient (authentication, invalid request).
    pub async fn complete(&self, stage: &str, prompt: &str) -> Result<String, GapError> {
        let messages = vec![ChatMessage::user().content(prompt).build()];
        let messages = &messages;
        let model = self.model;
        let limiter = self.rate_limiter;

        let response = retry_with_backoff(self.retry, stage, is_transient, move || async move {
            acquire_slot(limiter).await;
            model.chat(messages).await.map(|response| response.to_string())
        })
        .await
        .map_err(|err| GapError::ai(stage, format!("LLM error: {err}.")))?;

        debug!("{stage}: received {} chars", response.len());
        Ok(strip_think(&response))
    }
}

fn is_transient(err: &LLMError) -> bool {
    !matches!(err, LLMError::AuthError(_) | LLMError::InvalidRequest(_))
}

async fn acquire_slot(limiter: Option<&StdTokenBucket>) {
    if let Some(limiter) = limiter {
        loop {
            match limiter.try_acquire(1) {
                Ok(()) => break,
                Err(_) => {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }
}

/// Builds a token bucket allowing `rpm` requests per minute.
#[must_use]
pub fn build_rate_limiter(rpm: Option<u32>) -> Option<StdTokenBucket> {
    rpm.and_then(|rpm| {
        let capacity = u64::from(rpm.max(1));
        #[allow(clippy::cast_precision_loss)]
        let refill_interval = Duration::from_secs_f64(60.0 / capacity as f64);

        TokenBucketBuilder::builder()
            .capacity(capacity)
            .refill_amount(1_u64)
            .refill_every(refill_interval)
            .with_time(rate_guard::StdTimeSource::new())
            .with_precision::<rate_guard::Nanos>()
            .build()
            .ok()
    })
}

/// Removes `<think>...</think>` reasoning blocks and surrounding whitespace.
#[must_use]
pub fn strip_think(response: &str) -> String {
    THINK_STRIPPER_REGEX
        .replace_all(response, "")
        .to_string()
        .trim()
        .to_owned()
}

/// Parses the outermost `[...]` of `text` as JSON.
pub fn extract_json_array<T: DeserializeOwned>(text: &str) -> Option<T> {
    extract_between(text, '[', ']')
}

/// Parses the outermost `{...}` of `text` as JSON.
pub fn extract_json_object<T: DeserializeOwned>(text: &str) -> Option<T> {
    extract_between(text, '{', '}')
}

fn extract_between<T: DeserializeOwned>(text: &str, open: char, close: char) -> Option<T> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    let candidate = text.get(start..=end)?;
    match serde_json::from_str(candidate) {
        Ok(value) => Some(value),
        Err(err) => {
            debug!("Unparsable JSON in model answer: {err}");
            None
        }
    }
}

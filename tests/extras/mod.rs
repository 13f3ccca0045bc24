#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use gapscribe::retry::RetryPolicy;
use gapscribe::{CompletionContext, SitemapFetcher};
use llm::{
    chat::{ChatMessage, ChatProvider, ChatResponse, Tool},
    error::LLMError,
};

#[macro_export]
macro_rules! assert_responses {
    (
        $(
            $test_name:ident : response => $response:expr, result => $result:expr
        ),+ $(,)?
    ) => {
        $(
            #[tokio::test]
            async fn $test_name() {
                let model = ScriptedLlm::new().on("", $response);
                let context = context(&model);
                let result = context
                    .complete("test", "prompt")
                    .await
                    .expect("Expected successful processing.");

                assert_that(&result).is_equal_to($result.to_owned());
            }
        )+
    }
}

struct Rule {
    marker: String,
    responses: VecDeque<Result<String, String>>,
}

/// A chat model answering from a script: the first rule (in insertion order)
/// whose marker occurs in the prompt answers, its queued responses are used in order and the
/// last one repeats.
pub(crate) struct ScriptedLlm {
    rules: Mutex<Vec<Rule>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        ScriptedLlm {
            rules: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn on(self, marker: &str, response: &str) -> Self {
        self.push(marker, Ok(response.to_owned()))
    }

    pub fn fail_on(self, marker: &str, error: &str) -> Self {
        self.push(marker, Err(error.to_owned()))
    }

    fn push(self, marker: &str, response: Result<String, String>) -> Self {
        {
            let mut rules = self.rules.lock().unwrap();
            match rules.iter_mut().find(|rule| rule.marker == marker) {
                Some(rule) => rule.responses.push_back(response),
                None => rules.push(Rule {
                    marker: marker.to_owned(),
                    responses: VecDeque::from([response]),
                }),
            }
        }
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls_matching(&self, marker: &str) -> usize {
        self.prompts()
            .iter()
            .filter(|prompt| prompt.contains(marker))
            .count()
    }

    fn answer(&self, prompt: &str) -> Result<String, String> {
        self.prompts.lock().unwrap().push(prompt.to_owned());
        let mut rules = self.rules.lock().unwrap();
        let rule = rules
            .iter_mut()
            .find(|rule| prompt.contains(&rule.marker))
            .ok_or_else(|| format!("no scripted response for prompt: {prompt}"))?;
        if rule.responses.len() > 1 {
            rule.responses.pop_front().unwrap()
        } else {
            rule.responses.front().cloned().unwrap()
        }
    }
}

#[derive(Debug)]
struct StringResponse(String);

impl ChatResponse for StringResponse {
    fn text(&self) -> Option<String> {
        Some(self.0.clone())
    }

    fn tool_calls(&self) -> Option<Vec<llm::ToolCall>> {
        panic!()
    }

    fn thinking(&self) -> Option<String> {
        None
    }

    fn usage(&self) -> Option<llm::chat::Usage> {
        None
    }
}

impl std::fmt::Display for StringResponse {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

impl ChatProvider for ScriptedLlm {
    fn chat<'life0, 'life1, 'async_trait>(
        &'life0 self,
        messages: &'life1 [ChatMessage],
    ) -> ::core::pin::Pin<
        Box<
            dyn ::core::future::Future<Output = Result<Box<dyn ChatResponse>, LLMError>>
                + ::core::marker::Send
                + 'async_trait,
        >,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        let prompt = messages
            .iter()
            .map(|message| message.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let answer = self.answer(&prompt);
        Box::pin(async move {
            answer
                .map(|text| Box::new(StringResponse(text)) as Box<dyn ChatResponse>)
                .map_err(LLMError::ProviderError)
        })
    }

    fn chat_with_tools<'life0, 'life1, 'life2, 'async_trait>(
        &'life0 self,
        _messages: &'life1 [ChatMessage],
        _tools: Option<&'life2 [Tool]>,
    ) -> ::core::pin::Pin<
        Box<
            dyn ::core::future::Future<Output = Result<Box<dyn ChatResponse>, LLMError>>
                + ::core::marker::Send
                + 'async_trait,
        >,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        'life2: 'async_trait,
        Self: 'async_trait,
    {
        panic!()
    }
}

/// A context without retries or rate limiting.
pub(crate) fn context(model: &ScriptedLlm) -> CompletionContext<'_> {
    CompletionContext {
        model,
        rate_limiter: None,
        retry: RetryPolicy::immediate(0),
    }
}

pub(crate) fn fetcher() -> SitemapFetcher {
    SitemapFetcher::new(Duration::from_secs(5), RetryPolicy::immediate(0))
        .expect("failed to build test fetcher")
}

pub(crate) fn urlset(urls: &[String]) -> String {
    let body = urls
        .iter()
        .map(|url| format!("  <url><loc>{url}</loc></url>"))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n{body}\n</urlset>"
    )
}

pub(crate) fn sitemap_index(children: &[String]) -> String {
    let body = children
        .iter()
        .map(|url| format!("  <sitemap><loc>{url}</loc></sitemap>"))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<sitemapindex xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n{body}\n</sitemapindex>"
    )
}

/// A page whose main content has roughly `words` words.
pub(crate) fn article_html(title: &str, words: usize) -> String {
    let body = "We help you record and edit clear videos for your team. "
        .repeat(words / 11 + 1);
    format!(
        "<html><head><title>{title}</title></head><body><nav>Home Pricing</nav><main><h1>{title}</h1><p>{body}</p></main></body></html>"
    )
}

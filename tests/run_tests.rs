use crate::extras::{ScriptedLlm, context, fetcher, urlset};
use gapscribe::config::RunConfig;
use gapscribe::generator::{GeneratorOptions, Stage};
use gapscribe::keywords::Keyword;
use gapscribe::ranking::RankOptions;
use gapscribe::run::{GenerationFailure, PipelineOptions};
use gapscribe::{GapError, Orchestrator, RunState};
use spectral::prelude::*;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod extras;

const DRAFT_MARKER: &str = "You are a senior content writer";
const SPELLCHECK_MARKER: &str = "Fix any spelling errors";

async fn serve_sitemap(server: &MockServer, routes: &[&str]) {
    let uri = server.uri();
    let urls: Vec<String> = routes.iter().map(|route| format!("{uri}{route}")).collect();
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(urlset(&urls)))
        .mount(server)
        .await;
}

async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.unwrap_or_default().len()
}

fn options() -> PipelineOptions {
    PipelineOptions {
        rank: RankOptions {
            min_frequency: 1,
            ..RankOptions::default()
        },
        generator: GeneratorOptions {
            min_words: 5,
            current_year: 2026,
            ..GeneratorOptions::default()
        },
        ..PipelineOptions::default()
    }
}

fn scripted_model() -> ScriptedLlm {
    ScriptedLlm::new()
        .fail_on("Keyword: Gif Maker", "overloaded")
        .on(
            DRAFT_MARKER,
            "TITLE: A Post\nMETA_DESCRIPTION: A post.\nCONTENT:\nA short post about video work for busy teams.",
        )
        .fail_on(SPELLCHECK_MARKER, "offline")
        .fail_on("", "offline")
}

fn keys(keywords: &[Keyword]) -> Vec<String> {
    keywords.iter().map(Keyword::key).collect()
}

#[tokio::test]
async fn invalid_company_fails_before_any_request() {
    let server = MockServer::start().await;
    let model = ScriptedLlm::new().fail_on("", "offline");
    let ctx = context(&model);
    let fetcher = fetcher();
    let config = RunConfig {
        company_name: "  ".to_owned(),
        company_domain: server.uri(),
        competitors: vec!["veed.io".to_owned()],
        ..RunConfig::default()
    };

    let result = Orchestrator::new(&ctx, &fetcher, options())
        .run_full_pipeline(&config)
        .await;

    assert!(matches!(result, Err(GapError::Configuration(_))));
    assert_that(&request_count(&server).await).is_equal_to(0);
    assert_that(&model.prompts()).is_empty();
}

#[tokio::test]
async fn full_pipeline_records_failures_and_keeps_going() {
    let company = MockServer::start().await;
    let competitor = MockServer::start().await;
    let unreachable = MockServer::start().await;
    serve_sitemap(&company, &["/blog/video-editing-tips", "/features/screen-recorder"]).await;
    serve_sitemap(
        &competitor,
        &["/blog/video-editing-tips", "/tools/gif-maker", "/blog/podcast-editing"],
    )
    .await;

    let model = scripted_model();
    let ctx = context(&model);
    let fetcher = fetcher();
    let config = RunConfig {
        company_name: "OurTool".to_owned(),
        company_domain: company.uri(),
        competitors: vec![competitor.uri(), unreachable.uri(), "Nobody Inc".to_owned()],
        keywords: vec!["teleprompter scripts".to_owned()],
        max_blogs: 2,
        ..RunConfig::default()
    };
    let orchestrator = Orchestrator::new(&ctx, &fetcher, options());

    let mut state = orchestrator.run_full_pipeline(&config).await.unwrap();

    assert_that(&state.own_entries.len()).is_equal_to(2);
    assert_that(&state.competitors.len()).is_equal_to(2);
    assert_that(&keys(&state.gaps)).is_equal_to(vec![
        "teleprompter scripts".to_owned(),
        "gif maker".to_owned(),
        "podcast editing".to_owned(),
    ]);
    assert_that(&state.posts.len()).is_equal_to(1);
    assert_that(&state.posts[0].keyword).is_equal_to("Teleprompter Scripts".to_owned());
    assert_that(&state.failures.len()).is_equal_to(1);
    let GenerationFailure { keyword, stage, .. } = &state.failures[0];
    assert_that(keyword).is_equal_to(&"Gif Maker".to_owned());
    assert_that(stage).is_equal_to(&Stage::Draft);

    let unreachable_domain = unreachable.uri().trim_start_matches("http://").to_owned();
    assert_that(&state.notes.iter().any(|note| note.starts_with(&unreachable_domain))).is_true();
    assert_that(&state.notes.iter().any(|note| note.contains("Nobody Inc"))).is_true();
    assert_that(&state.notes.iter().any(|note| note.contains("default tone"))).is_true();

    // Repeated steps reuse what the state already holds.
    let requests_before = request_count(&competitor).await;
    orchestrator.fetch_competitor_sitemaps(&mut state, false).await;
    orchestrator.extract_keywords(&mut state).await;
    let added = orchestrator.add_custom_keywords(
        &mut state,
        &["Screen Recorder".to_owned(), "Teleprompter  Scripts".to_owned()],
    );

    assert_that(&request_count(&competitor).await).is_equal_to(requests_before);
    assert_that(&added).is_equal_to(1);
    assert_that(&state.custom_keywords.len()).is_equal_to(2);
    assert_that(&keys(&state.gaps).contains(&"screen recorder".to_owned())).is_false();
    assert_that(&state.selected().len()).is_equal_to(2);

    // Only the failed keyword is retried, and its failure is replaced.
    let generated = orchestrator.generate_blogs(&mut state, 2).await;

    assert_that(&generated).is_equal_to(0);
    assert_that(&state.posts.len()).is_equal_to(1);
    assert_that(&state.failures.len()).is_equal_to(1);
    assert_that(&state.failures[0].keyword).is_equal_to("Gif Maker".to_owned());
}

#[tokio::test]
async fn forced_refetch_goes_back_to_the_network() {
    let company = MockServer::start().await;
    let competitor = MockServer::start().await;
    serve_sitemap(&company, &["/blog/video-editing-tips"]).await;
    serve_sitemap(&competitor, &["/tools/gif-maker"]).await;

    let model = ScriptedLlm::new().fail_on("", "offline");
    let ctx = context(&model);
    let fetcher = fetcher();
    let orchestrator = Orchestrator::new(&ctx, &fetcher, options());
    let mut state = RunState::default();
    state.set_company("OurTool", &company.uri(), &[]).unwrap();

    orchestrator.add_competitors(&mut state, &[competitor.uri()]).await;
    orchestrator.fetch_competitor_sitemaps(&mut state, false).await;
    orchestrator.extract_keywords(&mut state).await;
    let first = request_count(&competitor).await;
    orchestrator.fetch_competitor_sitemaps(&mut state, true).await;

    assert_that(&request_count(&competitor).await).is_greater_than(first);
    assert_that(&state.domain_keywords.len()).is_equal_to(1);
    orchestrator.extract_keywords(&mut state).await;
    orchestrator.rank_gaps(&mut state);
    assert_that(&keys(&state.gaps)).is_equal_to(vec!["gif maker".to_owned()]);
}

#[tokio::test]
async fn the_company_is_never_its_own_competitor() {
    let company = MockServer::start().await;
    let model = ScriptedLlm::new().fail_on("", "offline");
    let ctx = context(&model);
    let fetcher = fetcher();
    let orchestrator = Orchestrator::new(&ctx, &fetcher, options());
    let mut state = RunState::default();
    state.set_company("OurTool", &company.uri(), &[]).unwrap();

    orchestrator
        .add_competitors(&mut state, &[company.uri(), company.uri()])
        .await;

    assert_that(&state.competitors).is_empty();
    assert_that(&state.notes.len()).is_equal_to(2);
}

#[test]
fn selection_follows_ranked_positions() {
    let mut state = RunState {
        gaps: ["Gif Maker", "Podcast Editing", "Screen Recorder"]
            .iter()
            .map(|phrase| Keyword::new(phrase, "veed.io"))
            .collect(),
        ..RunState::default()
    };

    assert_that(&state.select_top(2)).is_equal_to(2);
    assert_that(&state.select(&[1, 2, 7])).is_equal_to(1);
    assert_that(&state.selected().len()).is_equal_to(3);
    state.deselect_all();
    assert_that(&state.selected()).is_empty();
}

#[test]
fn changing_the_company_drops_cached_results() {
    let mut state = RunState::default();
    state.set_company("OurTool", "ourtool.com", &[]).unwrap();
    state.note("something happened");
    state.gaps.push(Keyword::new("Gif Maker", "veed.io"));

    state.set_company("OurTool", "https://www.ourtool.com/", &[]).unwrap();
    assert_that(&state.gaps.len()).is_equal_to(1);

    state.set_company("Other", "other.io", &[]).unwrap();
    assert_that(&state.gaps).is_empty();
    assert_that(&state.notes).is_empty();
    assert!(matches!(
        state.set_company("Other", "not a domain", &[]),
        Err(GapError::Configuration(_))
    ));
}

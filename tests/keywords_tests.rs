use crate::extras::{ScriptedLlm, context};
use gapscribe::keywords::{ContentType, Keyword, KeywordExtractor, normalize_phrase, phrase_from_slug};
use gapscribe::SiteEntry;
use spectral::prelude::*;
use url::Url;

mod extras;

fn entry(url: &str) -> SiteEntry {
    SiteEntry::from_url(Url::parse(url).unwrap(), "capcut.com")
}

fn segments(path: &str) -> Vec<String> {
    path.split('/').filter(|s| !s.is_empty()).map(str::to_owned).collect()
}

fn find<'k>(keywords: &'k [Keyword], phrase: &str) -> &'k Keyword {
    keywords
        .iter()
        .find(|keyword| keyword.key() == normalize_phrase(phrase))
        .unwrap_or_else(|| panic!("no keyword {phrase:?} in {keywords:?}"))
}

#[test]
fn slug_phrases_are_reconstructed() {
    assert_that(&phrase_from_slug(&segments("/blog/video-editing-tips")))
        .is_equal_to(Some("video editing tips".to_owned()));
    assert_that(&phrase_from_slug(&segments("/tools/screen_recorder/")))
        .is_equal_to(Some("screen recorder".to_owned()));
    assert_that(&phrase_from_slug(&segments("/blog/how-to-record-zoom-calls")))
        .is_equal_to(Some("how record zoom calls".to_owned()));
}

#[test]
fn slug_artifacts_are_rejected() {
    assert_that(&phrase_from_slug(&segments("/blog/page/2"))).is_none();
    assert_that(&phrase_from_slug(&segments("/p/123456"))).is_none();
    assert_that(&phrase_from_slug(&segments("/blog/a8f3k2j4h5g6f7d8s9a0"))).is_none();
    assert_that(&phrase_from_slug(&segments("/blog/2024-05-17"))).is_none();
    assert_that(&phrase_from_slug(&segments("/about"))).is_none();
}

#[test]
fn valuable_single_words_survive() {
    assert_that(&phrase_from_slug(&segments("/generator"))).is_equal_to(Some("generator".to_owned()));
    assert_that(&phrase_from_slug(&segments("/teleprompter"))).is_equal_to(Some("teleprompter".to_owned()));
}

#[test]
fn content_type_is_classified_from_words() {
    assert_that(&ContentType::classify("capcut alternatives")).is_equal_to(ContentType::Alternative);
    assert_that(&ContentType::classify("loom vs vidyard")).is_equal_to(ContentType::Comparison);
    assert_that(&ContentType::classify("free gif maker")).is_equal_to(ContentType::Tool);
    assert_that(&ContentType::classify("how to add subtitles")).is_equal_to(ContentType::HowTo);
    assert_that(&ContentType::classify("best youtube intros")).is_equal_to(ContentType::Listicle);
    assert_that(&ContentType::classify("video marketing")).is_equal_to(ContentType::Blog);
}

#[test]
fn phrases_normalize_to_lowercase_words() {
    assert_that(&normalize_phrase("  Video-Editing   TIPS! ")).is_equal_to("video editing tips".to_owned());
}

#[tokio::test]
async fn validated_keywords_follow_the_model() {
    let model = ScriptedLlm::new().on(
        "URL slug candidates",
        r#"Here is the result:
        [
          {"index": 1, "keyword": "Video Editing Tips", "type": "Blog", "score": 8, "valid": true},
          {"index": 2, "keyword": "Video Editing Tips", "type": "Blog", "score": 7, "valid": true},
          {"index": 3, "keyword": "Screen Recorder", "type": "Tool", "score": 9, "valid": true},
          {"index": 4, "keyword": "", "valid": false}
        ]"#,
    );
    let context = context(&model);
    let entries = vec![
        entry("https://capcut.com/blog/video-editing-tips"),
        entry("https://capcut.com/resource/video-editing-tips"),
        entry("https://capcut.com/tools/screen-recorder"),
        entry("https://capcut.com/blog/lorem-ipsum-dolor"),
    ];

    let extraction = KeywordExtractor::new(&context)
        .extract("capcut.com", "CapCut", &entries, None)
        .await;

    assert_that(&extraction.degraded()).is_false();
    assert_that(&extraction.keywords).has_length(2);
    let tips = find(&extraction.keywords, "video editing tips");
    assert_that(&tips.frequency).is_equal_to(2);
    assert_that(&tips.relevance).is_equal_to(Some(8));
    assert_that(&tips.sample_urls).has_length(2);
    let recorder = find(&extraction.keywords, "screen recorder");
    assert_that(&recorder.content_type).is_equal_to(ContentType::Tool);
    assert_that(&recorder.source_domains.contains("capcut.com")).is_true();
}

#[tokio::test]
async fn model_failure_degrades_to_mechanical_phrases() {
    let model = ScriptedLlm::new().fail_on("", "model unavailable");
    let context = context(&model);
    let entries = vec![
        entry("https://capcut.com/blog/video-editing-tips"),
        entry("https://capcut.com/tools/screen-recorder"),
        entry("https://capcut.com/tools/gif-maker"),
    ];

    let extraction = KeywordExtractor::new(&context)
        .with_batch_size(2)
        .extract("capcut.com", "CapCut", &entries, None)
        .await;

    assert_that(&extraction.degraded()).is_true();
    assert_that(&extraction.total_batches).is_equal_to(2);
    assert_that(&extraction.degraded_batches).is_equal_to(2);
    assert_that(&extraction.keywords).has_length(3);
    assert_that(&find(&extraction.keywords, "gif maker").phrase).is_equal_to("Gif Maker".to_owned());
}

#[tokio::test]
async fn unparsable_answer_degrades_only_that_batch() {
    let model = ScriptedLlm::new()
        .on("URL slug candidates", "Sorry, I cannot help with that.")
        .on(
            "URL slug candidates",
            r#"[{"index": 1, "keyword": "GIF Maker", "type": "Tool", "score": 6, "valid": true}]"#,
        );
    let context = context(&model);
    let entries = vec![
        entry("https://capcut.com/blog/video-editing-tips"),
        entry("https://capcut.com/tools/gif-maker"),
    ];

    let extraction = KeywordExtractor::new(&context)
        .with_batch_size(1)
        .extract("capcut.com", "CapCut", &entries, None)
        .await;

    assert_that(&extraction.total_batches).is_equal_to(2);
    assert_that(&extraction.degraded_batches).is_equal_to(1);
    assert_that(&find(&extraction.keywords, "gif maker").relevance).is_equal_to(Some(6));
}

#[tokio::test]
async fn competitor_brand_is_replaced_by_company_name() {
    let model = ScriptedLlm::new().fail_on("", "offline");
    let context = context(&model);
    let entries = vec![entry("https://capcut.com/blog/capcut-video-templates")];

    let extraction = KeywordExtractor::new(&context)
        .extract("capcut.com", "CapCut", &entries, Some("OurTool"))
        .await;

    assert_that(&extraction.keywords[0].phrase).is_equal_to("OurTool Video Templates".to_owned());
}

#[test]
fn absorbing_is_commutative() {
    let mut left = Keyword::new("screen recorder", "a.com");
    left.relevance = Some(4);
    let mut right = Keyword::new("Screen Recorder", "b.com");
    right.frequency = 3;
    right.relevance = Some(7);

    let mut one = left.clone();
    one.absorb(right.clone());
    let mut other = right;
    other.absorb(left);

    assert_that(&one).is_equal_to(other);
    assert_that(&one.frequency).is_equal_to(4);
    assert_that(&one.relevance).is_equal_to(Some(7));
}

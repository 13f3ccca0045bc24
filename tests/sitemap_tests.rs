use crate::extras::{ScriptedLlm, context, fetcher, sitemap_index, urlset};
use gapscribe::sitemap::{
    SiteEntry, SitemapLimits, is_content_path, is_english_url, normalize_domain, parse_sitemap_document,
    resolve_domains,
};
use spectral::prelude::*;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod extras;

async fn serve(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

fn paths(entries: &[gapscribe::SiteEntry]) -> Vec<String> {
    entries.iter().map(|entry| entry.url.path().to_owned()).collect()
}

#[tokio::test]
async fn urlset_keeps_english_content_pages_only() {
    let server = MockServer::start().await;
    let uri = server.uri();
    serve(
        &server,
        "/sitemap.xml",
        urlset(&[
            format!("{uri}/"),
            format!("{uri}/blog/video-editing-tips"),
            format!("{uri}/blog/video-editing-tips"),
            format!("{uri}/pricing"),
            format!("{uri}/login"),
            format!("{uri}/de/blog/video-tipps"),
            format!("{uri}/pt-br/blog/dicas"),
            format!("{uri}/tag/video"),
            format!("{uri}/assets/logo.png"),
            format!("{uri}/en-us/screen-recorder"),
        ]),
    )
    .await;

    let fetch = fetcher().fetch_domain(&uri).await;

    assert_that(&fetch.failure).is_none();
    assert_that(&paths(&fetch.entries)).is_equal_to(vec![
        "/blog/video-editing-tips".to_owned(),
        "/en-us/screen-recorder".to_owned(),
    ]);
}

#[tokio::test]
async fn sitemap_index_children_are_followed() {
    let server = MockServer::start().await;
    let uri = server.uri();
    serve(
        &server,
        "/sitemap.xml",
        sitemap_index(&[format!("{uri}/post-sitemap.xml"), format!("{uri}/page-sitemap.xml")]),
    )
    .await;
    serve(&server, "/post-sitemap.xml", urlset(&[format!("{uri}/blog/gif-maker")])).await;
    serve(&server, "/page-sitemap.xml", urlset(&[format!("{uri}/features/screen-recorder")])).await;

    let fetch = fetcher().fetch_domain(&uri).await;

    assert_that(&paths(&fetch.entries)).is_equal_to(vec![
        "/blog/gif-maker".to_owned(),
        "/features/screen-recorder".to_owned(),
    ]);
    assert_that(&fetch.documents_fetched).is_equal_to(3);
}

#[tokio::test]
async fn cyclic_sitemap_index_terminates() {
    let server = MockServer::start().await;
    let uri = server.uri();
    serve(
        &server,
        "/sitemap.xml",
        sitemap_index(&[format!("{uri}/sitemap.xml"), format!("{uri}/child.xml")]),
    )
    .await;
    serve(
        &server,
        "/child.xml",
        sitemap_index(&[format!("{uri}/sitemap.xml"), format!("{uri}/leaf.xml")]),
    )
    .await;
    serve(&server, "/leaf.xml", urlset(&[format!("{uri}/blog/record-zoom-calls")])).await;

    let fetch = fetcher().fetch_domain(&uri).await;

    assert_that(&paths(&fetch.entries)).is_equal_to(vec!["/blog/record-zoom-calls".to_owned()]);
    assert_that(&fetch.documents_fetched).is_equal_to(3);
}

#[tokio::test]
async fn document_limit_bounds_a_runaway_index() {
    let server = MockServer::start().await;
    let uri = server.uri();
    let children: Vec<String> = (0..20).map(|n| format!("{uri}/sitemap-{n}.xml")).collect();
    serve(&server, "/sitemap.xml", sitemap_index(&children)).await;
    for n in 0..20 {
        serve(
            &server,
            &format!("/sitemap-{n}.xml"),
            urlset(&[format!("{uri}/blog/topic-number-{n}-guide")]),
        )
        .await;
    }

    let fetch = fetcher()
        .with_limits(SitemapLimits {
            max_documents: 5,
            max_urls: 100,
        })
        .fetch_domain(&uri)
        .await;

    assert_that(&fetch.documents_fetched).is_equal_to(5);
    assert_that(&fetch.entries).has_length(4);
}

#[tokio::test]
async fn robots_txt_sitemaps_come_first() {
    let server = MockServer::start().await;
    let uri = server.uri();
    serve(&server, "/robots.txt", format!("User-agent: *\nDisallow:\nSitemap: {uri}/custom-map.xml\n")).await;
    serve(&server, "/custom-map.xml", urlset(&[format!("{uri}/blog/ai-voice-over")])).await;

    let fetch = fetcher().fetch_domain(&uri).await;

    assert_that(&fetch.failure).is_none();
    assert_that(&paths(&fetch.entries)).is_equal_to(vec!["/blog/ai-voice-over".to_owned()]);
}

#[tokio::test]
async fn fallback_paths_are_tried_when_sitemap_xml_is_missing() {
    let server = MockServer::start().await;
    let uri = server.uri();
    serve(&server, "/wp-sitemap.xml", urlset(&[format!("{uri}/blog/gif-maker")])).await;

    let fetch = fetcher().fetch_domain(&uri).await;

    assert_that(&fetch.failure).is_none();
    assert_that(&paths(&fetch.entries)).is_equal_to(vec!["/blog/gif-maker".to_owned()]);
}

#[tokio::test]
async fn missing_sitemap_is_a_note_not_an_error() {
    let server = MockServer::start().await;

    let fetch = fetcher().fetch_domain(&server.uri()).await;

    assert_that(&fetch.entries).is_empty();
    assert_that(&fetch.failure).is_some();
}

#[tokio::test]
async fn malformed_sitemap_is_reported() {
    let server = MockServer::start().await;
    serve(&server, "/sitemap.xml", "<html><body>Not a sitemap</body></html>".to_owned()).await;

    let fetch = fetcher().fetch_domain(&server.uri()).await;

    assert_that(&fetch.entries).is_empty();
    assert_that(&fetch.failure.unwrap_or_default()).contains("malformed");
}

#[tokio::test]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;
    let uri = server.uri();
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    serve(&server, "/sitemap.xml", urlset(&[format!("{uri}/blog/gif-maker")])).await;

    let fetcher = gapscribe::SitemapFetcher::new(
        std::time::Duration::from_secs(5),
        gapscribe::retry::RetryPolicy::immediate(2),
    )
    .expect("failed to build fetcher");
    let fetch = fetcher.fetch_domain(&uri).await;

    assert_that(&paths(&fetch.entries)).is_equal_to(vec!["/blog/gif-maker".to_owned()]);
}

#[test]
fn parses_urlset_and_index_documents() {
    let urls = parse_sitemap_document(&urlset(&["https://a.com/blog/x".to_owned()]));
    let index = parse_sitemap_document(&sitemap_index(&["https://a.com/s1.xml".to_owned()]));
    let junk = parse_sitemap_document("this is not xml");

    assert_that(&urls.urls).is_equal_to(vec!["https://a.com/blog/x".to_owned()]);
    assert_that(&urls.malformed).is_false();
    assert_that(&index.children).is_equal_to(vec!["https://a.com/s1.xml".to_owned()]);
    assert_that(&junk.malformed).is_true();
}

#[test]
fn domains_are_normalized() {
    assert_that(&normalize_domain("https://www.Example.com/blog/")).is_equal_to("example.com".to_owned());
    assert_that(&normalize_domain("blog.example.com")).is_equal_to("blog.example.com".to_owned());
    assert_that(&normalize_domain("http://127.0.0.1:8080")).is_equal_to("127.0.0.1:8080".to_owned());
}

#[test]
fn english_heuristic() {
    let english = |url: &str| is_english_url(&Url::parse(url).unwrap());

    assert_that(&english("https://a.com/blog/video-tips")).is_true();
    assert_that(&english("https://a.com/en-gb/blog/colour-grading")).is_true();
    assert_that(&english("https://a.com/fr/blog/montage")).is_false();
    assert_that(&english("https://a.com/recursos/video")).is_false();
    assert_that(&english("https://a.com/blog/caf%C3%A9")).is_false();
    assert_that(&english("https://a.com/blog/tips?lang=es")).is_false();
}

#[test]
fn english_heuristic_reads_bare_codes_only_as_leading_locale() {
    let english = |url: &str| is_english_url(&Url::parse(url).unwrap());

    assert_that(&english("https://a.com/uk/blog/video-tips")).is_true();
    assert_that(&english("https://a.com/topics/it/backup-guide")).is_true();
    assert_that(&english("https://a.com/blog/no/code-tools")).is_true();
    assert_that(&english("https://a.com/it/blog/montaggio")).is_false();
    assert_that(&english("https://a.com/blog/pt-br/dicas")).is_false();
}

#[test]
fn site_entry_splits_lowercased_segments() {
    let entry = SiteEntry::from_url(
        Url::parse("https://a.com/Blog//Video-Tips/").unwrap(),
        "a.com",
    );

    assert_that(&entry.slug_segments).is_equal_to(vec!["blog".to_owned(), "video-tips".to_owned()]);
    assert_that(&entry.is_content_page).is_true();
    assert_that(&entry.is_english).is_true();
}

#[test]
fn content_heuristic() {
    let segments = |path: &str| -> Vec<String> {
        path.split('/').filter(|s| !s.is_empty()).map(str::to_owned).collect()
    };

    assert_that(&is_content_path(&segments("/blog/video-tips"))).is_true();
    assert_that(&is_content_path(&segments("/"))).is_false();
    assert_that(&is_content_path(&segments("/account/settings"))).is_false();
    assert_that(&is_content_path(&segments("/category/news"))).is_false();
    assert_that(&is_content_path(&segments("/files/guide.pdf"))).is_false();
}

#[tokio::test]
async fn competitor_names_resolve_through_one_llm_call() {
    let model = ScriptedLlm::new().on(
        "Find the official primary website domain",
        "{\"CapCut\": \"https://www.capcut.com\", \"Nobody Inc\": \"not a domain\"}",
    );
    let context = context(&model);

    let resolution = resolve_domains(
        &context,
        &["CapCut".to_owned(), "veed.io".to_owned(), "Nobody Inc".to_owned()],
    )
    .await;

    let domains: Vec<String> = resolution.resolved.iter().map(|c| c.domain.clone()).collect();
    assert_that(&domains).is_equal_to(vec!["veed.io".to_owned(), "capcut.com".to_owned()]);
    assert_that(&resolution.unresolved).is_equal_to(vec!["Nobody Inc".to_owned()]);
    assert_that(&model.prompts()).has_length(1);
}

#[tokio::test]
async fn resolution_failure_leaves_names_unresolved() {
    let model = ScriptedLlm::new().fail_on("", "offline");
    let context = context(&model);

    let resolution = resolve_domains(&context, &["CapCut".to_owned()]).await;

    assert_that(&resolution.resolved).is_empty();
    assert_that(&resolution.unresolved).is_equal_to(vec!["CapCut".to_owned()]);
}

// tests/scraper_http.rs
//
// HttpScraper against a local mock server (wiremock).
//
// Covered:
// - changelog: first entry heading
// - blog: RSS feed preferred, HTML fallback when no feed answers
// - pricing: prices and plan names, stable across cosmetic changes
// - github: latest release, 404 as "nothing observed", 5xx as an error
// - 404 pages read as "nothing observed"

use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use competitor_tracker::config::{Locator, SourceKind};
use competitor_tracker::scrape::{HttpScraper, Scraper};

fn url(server: &MockServer, p: &str) -> Locator {
    Locator::Url(format!("{}{p}", server.uri()))
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/html; charset=utf-8")
        .set_body_string(body.to_string())
}

fn scraper(server: &MockServer) -> HttpScraper {
    HttpScraper::new()
        .expect("client")
        .with_github_api(&server.uri())
}

#[tokio::test]
async fn changelog_returns_first_entry_heading() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/changelog"))
        .respond_with(html(
            r#"<html><body><main>
                <article><h2>Linear 2.0 &ndash; new roadmaps</h2><p>Details</p></article>
                <article><h2>Older entry</h2></article>
            </main></body></html>"#,
        ))
        .mount(&server)
        .await;

    let got = scraper(&server)
        .fetch(SourceKind::Changelog, &url(&server, "/changelog"))
        .await
        .unwrap();
    assert_eq!(got.as_deref(), Some("Linear 2.0 – new roadmaps"));
}

#[tokio::test]
async fn blog_prefers_rss_feed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/blog/rss.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<?xml version="1.0"?><rss version="2.0"><channel><title>Blog</title>
               <item><title>Launch week</title><description>Five days of releases</description></item>
               </channel></rss>"#,
        ))
        .mount(&server)
        .await;

    let got = scraper(&server)
        .fetch(SourceKind::Blog, &url(&server, "/blog"))
        .await
        .unwrap();
    assert_eq!(got.as_deref(), Some("Launch week: Five days of releases"));
}

#[tokio::test]
async fn blog_falls_back_to_html_when_no_feed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/blog"))
        .respond_with(html(
            r#"<html><body><article><h1>Config 2026 recap</h1>
               <p class="post-excerpt">Everything we shipped on stage.</p></article></body></html>"#,
        ))
        .mount(&server)
        .await;
    // feed lookups hit the default 404

    let got = scraper(&server)
        .fetch(SourceKind::Blog, &url(&server, "/blog"))
        .await
        .unwrap();
    assert_eq!(got.as_deref(), Some("Config 2026 recap: Everything we shipped on stage."));
}

#[tokio::test]
async fn pricing_compares_extracted_facts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pricing"))
        .respond_with(html(
            r#"<html><body><main>
                <script>var t = "$999";</script>
                <h2>Free</h2><p>$0 forever</p>
                <h2>Pro</h2><p>$8 per user</p>
                <h2>Enterprise</h2><p>Contact sales</p>
            </main></body></html>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/pricing-v2"))
        .respond_with(html(
            r#"<html><body><main>
                <div class="hero">New look!</div>
                <h3>Free</h3><span>$0 forever</span>
                <h3>Pro</h3><span>$8 per user</span>
                <h3>Enterprise</h3><span>Talk to us</span>
            </main></body></html>"#,
        ))
        .mount(&server)
        .await;

    let s = scraper(&server);
    let a = s.fetch(SourceKind::Pricing, &url(&server, "/pricing")).await.unwrap();
    let b = s.fetch(SourceKind::Pricing, &url(&server, "/pricing-v2")).await.unwrap();
    let a = a.expect("pricing text");
    assert!(a.starts_with("Pricing info:"), "{a}");
    assert!(a.contains("$8"));
    assert!(!a.contains("$999"), "script text is ignored");
    assert_eq!(Some(a), b, "cosmetic changes do not alter pricing facts");
}

#[tokio::test]
async fn missing_page_is_nothing_observed() {
    let server = MockServer::start().await;
    let got = scraper(&server)
        .fetch(SourceKind::Changelog, &url(&server, "/gone"))
        .await
        .unwrap();
    assert!(got.is_none());
}

#[tokio::test]
async fn github_latest_release_is_name_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/linear/linear/releases/latest"))
        .and(header("accept", "application/vnd.github+json"))
        .and(header("authorization", "Bearer gh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "v1.4.0",
            "tag_name": "v1.4.0",
            "body": "Adds sub-issues"
        })))
        .mount(&server)
        .await;

    let got = scraper(&server)
        .with_github_token(Some("gh-token".into()))
        .fetch(
            SourceKind::GitHub,
            &Locator::GitHub {
                owner: "linear".into(),
                repo: "linear".into(),
            },
        )
        .await
        .unwrap();
    assert_eq!(got.as_deref(), Some("v1.4.0: Adds sub-issues"));
}

#[tokio::test]
async fn github_without_release_and_with_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/none/releases/latest"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/broken/releases/latest"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let s = scraper(&server);
    let gh = |repo: &str| Locator::GitHub {
        owner: "acme".into(),
        repo: repo.into(),
    };
    assert!(s.fetch(SourceKind::GitHub, &gh("none")).await.unwrap().is_none());
    assert!(s.fetch(SourceKind::GitHub, &gh("broken")).await.is_err());
}

//! Integration tests for the mirror engine
//!
//! These tests use wiremock to create mock HTTP servers and run full mirror
//! jobs end-to-end into temporary directories.

use site_mirror::config::Config;
use site_mirror::state::{FailureReason, SkipReason};
use site_mirror::{mirror, mirror_with_config, FetchError, MirrorError, ResourceState};
use std::fs;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration writing into `dir` with fast retries
fn create_test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.output.save_dir = dir.path().to_string_lossy().into_owned();
    config.fetch.backoff_base_ms = 1;
    config.fetch.backoff_max_ms = 5;
    config.fetch.request_timeout_secs = 5;
    config
}

fn html(body: impl Into<String>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.into(), "text/html")
}

async fn mount_get(server: &MockServer, route: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_mirror_same_origin_with_cross_origin_image() {
    let site = MockServer::start().await;
    let cdn = MockServer::start().await;
    let logo_url = format!("{}/logo.png", cdn.uri());

    mount_get(
        &site,
        "/",
        html(format!(
            r#"<html><head><title>Example</title><link rel="stylesheet" href="style.css"></head>
<body><img src="{}" alt="logo"></body></html>"#,
            logo_url
        )),
    )
    .await;
    mount_get(
        &site,
        "/style.css",
        ResponseTemplate::new(200).set_body_raw("body { color: black; }", "text/css"),
    )
    .await;

    // Out-of-scope resources are never requested
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&cdn)
        .await;

    let dir = TempDir::new().unwrap();
    let result = mirror(&format!("{}/", site.uri()), Some(dir.path()), false)
        .await
        .expect("mirror should succeed");

    assert_eq!(result.index_file, dir.path().join("index.html"));
    assert_eq!(result.title.as_deref(), Some("Example"));
    assert_eq!(result.fetched_count(), 2);
    assert_eq!(result.failed_count(), 0);
    assert_eq!(result.skipped_count(), 1);
    assert_eq!(result.skipped[0].url, logo_url);
    assert_eq!(result.skipped[0].reason, SkipReason::OutOfScope);

    let index = fs::read_to_string(dir.path().join("index.html")).unwrap();
    assert!(index.contains(r#"href="style.css""#));
    assert!(index.contains(&format!(r#"src="{}""#, logo_url)));

    let css = fs::read_to_string(dir.path().join("style.css")).unwrap();
    assert_eq!(css, "body { color: black; }");
}

#[tokio::test]
async fn test_mirror_cross_origin_enabled_uses_host_directory() {
    let site = MockServer::start().await;
    let cdn = MockServer::start().await;
    let logo_url = format!("{}/img/logo.png", cdn.uri());

    mount_get(
        &site,
        "/",
        html(format!(r#"<html><body><img src="{}"></body></html>"#, logo_url)),
    )
    .await;
    mount_get(
        &cdn,
        "/img/logo.png",
        ResponseTemplate::new(200).set_body_raw(vec![1u8, 2, 3], "image/png"),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir);
    config.scope.cross_origin = true;

    let result = mirror_with_config(
        &format!("{}/", site.uri()),
        &config,
        false,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    let port = url::Url::parse(&cdn.uri()).unwrap().port().unwrap();
    let expected = format!("127.0.0.1_{}/img/logo.png", port);

    assert_eq!(result.fetched_count(), 2);
    assert_eq!(result.skipped_count(), 0);
    assert_eq!(result.local_path_of(&logo_url), Some(expected.as_str()));
    assert_eq!(fs::read(dir.path().join(&expected)).unwrap(), vec![1u8, 2, 3]);

    let index = fs::read_to_string(dir.path().join("index.html")).unwrap();
    assert!(index.contains(&format!(r#"src="{}""#, expected)));
}

#[tokio::test]
async fn test_mirror_missing_image_is_recorded_not_fatal() {
    let site = MockServer::start().await;

    mount_get(
        &site,
        "/",
        html(r#"<html><body><img src="/missing.png"><img src="/ok.png"></body></html>"#),
    )
    .await;
    mount_get(&site, "/missing.png", ResponseTemplate::new(404)).await;
    mount_get(
        &site,
        "/ok.png",
        ResponseTemplate::new(200).set_body_raw(vec![0u8; 16], "image/png"),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir);
    let result = mirror_with_config(
        &format!("{}/", site.uri()),
        &config,
        false,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert!(result.index_file.is_file());
    assert_eq!(result.fetched_count(), 2);
    assert_eq!(result.failed_count(), 1);
    assert_eq!(result.failed[0].url, format!("{}/missing.png", site.uri()));
    assert_eq!(
        result.failed[0].reason,
        FailureReason::Fetch(FetchError::Status(404))
    );
    assert!(dir.path().join("ok.png").is_file());
    assert!(!dir.path().join("missing.png").exists());
}

#[tokio::test]
async fn test_mirror_root_failure_is_an_error() {
    let site = MockServer::start().await;
    mount_get(&site, "/", ResponseTemplate::new(404)).await;

    let dir = TempDir::new().unwrap();
    let err = mirror(&format!("{}/", site.uri()), Some(dir.path()), false)
        .await
        .unwrap_err();

    match err {
        MirrorError::RootFetchFailed { url, source } => {
            assert_eq!(url, format!("{}/", site.uri()));
            assert_eq!(source, FetchError::Status(404));
        }
        other => panic!("expected RootFetchFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_mirror_invalid_input_makes_no_requests() {
    let dir = TempDir::new().unwrap();

    for input in ["", "example.com", "ftp://example.com/file", "javascript:alert(1)"] {
        let err = mirror(input, Some(dir.path()), false).await.unwrap_err();
        assert!(
            matches!(err, MirrorError::InvalidInput(_)),
            "expected InvalidInput for {:?}, got {:?}",
            input,
            err
        );
    }

    // Nothing was written either
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_mirror_is_idempotent_on_layout() {
    let site = MockServer::start().await;
    mount_get(
        &site,
        "/",
        html(r#"<html><body><script src="/js/app.js"></script></body></html>"#),
    )
    .await;
    mount_get(
        &site,
        "/js/app.js",
        ResponseTemplate::new(200).set_body_raw("console.log(1);", "application/javascript"),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let root = format!("{}/", site.uri());

    let first = mirror(&root, Some(dir.path()), false).await.unwrap();
    let second = mirror(&root, Some(dir.path()), false).await.unwrap();

    assert_eq!(first.index_file, second.index_file);
    assert_eq!(
        first.local_path_of(&format!("{}/js/app.js", site.uri())),
        second.local_path_of(&format!("{}/js/app.js", site.uri()))
    );
    assert!(dir.path().join("js/app.js").is_file());
}

#[tokio::test]
async fn test_mirror_fetches_shared_resource_once() {
    let site = MockServer::start().await;
    let page = |n: u32| {
        html(format!(
            r#"<html><body><h1>{}</h1><img src="/shared.png"><img src="shared.png#x"></body></html>"#,
            n
        ))
    };

    mount_get(
        &site,
        "/",
        html(
            r#"<html><body>
<a href="/a#top">A</a><a href="/a#bottom">A again</a><a href="/b">B</a><a href="/c">C</a>
<img src="/shared.png"></body></html>"#,
        ),
    )
    .await;
    mount_get(&site, "/b", page(2)).await;
    mount_get(&site, "/c", page(3)).await;
    Mock::given(method("GET"))
        .and(path("/shared.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![7u8; 8], "image/png"))
        .expect(1)
        .mount(&site)
        .await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(page(1))
        .expect(1)
        .mount(&site)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir);
    config.mirror.max_page_depth = 1;
    config.mirror.concurrency = 8;

    let result = mirror_with_config(
        &format!("{}/", site.uri()),
        &config,
        false,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    // Root, three pages and one image
    assert_eq!(result.resources.len(), 5);
    assert_eq!(result.fetched_count(), 5);

    let index = fs::read_to_string(dir.path().join("index.html")).unwrap();
    assert!(index.contains(r#"href="a.html#top""#));
    assert!(index.contains(r#"href="a.html#bottom""#));

    let a = fs::read_to_string(dir.path().join("a.html")).unwrap();
    assert!(a.contains(r#"src="shared.png""#));
    assert!(a.contains(r#"src="shared.png#x""#));
}

#[tokio::test]
async fn test_mirror_depth_limit_keeps_links_absolute() {
    let site = MockServer::start().await;
    mount_get(
        &site,
        "/",
        html(r#"<html><body><a href="/about">About</a><iframe src="/frame"></iframe></body></html>"#),
    )
    .await;
    mount_get(&site, "/frame", html("<html><body>frame</body></html>")).await;
    Mock::given(method("GET"))
        .and(path("/about"))
        .respond_with(html("<html></html>"))
        .expect(0)
        .mount(&site)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir);
    let result = mirror_with_config(
        &format!("{}/", site.uri()),
        &config,
        false,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    let about = format!("{}/about", site.uri());
    assert_eq!(result.skipped_count(), 1);
    assert_eq!(result.skipped[0].url, about);
    assert_eq!(result.skipped[0].reason, SkipReason::DepthLimit);

    let index = fs::read_to_string(dir.path().join("index.html")).unwrap();
    assert!(index.contains(&format!(r#"href="{}""#, about)));
    assert!(index.contains(r#"src="frame.html""#));
    assert!(dir.path().join("frame.html").is_file());
}

#[tokio::test]
async fn test_mirror_retries_server_errors() {
    let site = MockServer::start().await;
    mount_get(&site, "/", html(r#"<html><body><img src="/flaky.png"></body></html>"#)).await;

    Mock::given(method("GET"))
        .and(path("/flaky.png"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&site)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![9u8; 4], "image/png"))
        .expect(1)
        .mount(&site)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir);
    let result = mirror_with_config(
        &format!("{}/", site.uri()),
        &config,
        false,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(result.failed_count(), 0);
    assert_eq!(fs::read(dir.path().join("flaky.png")).unwrap(), vec![9u8; 4]);
}

#[tokio::test]
async fn test_mirror_follows_redirects() {
    let site = MockServer::start().await;
    mount_get(
        &site,
        "/",
        html(r#"<html><head><link rel="stylesheet" href="/old.css"></head></html>"#),
    )
    .await;
    mount_get(
        &site,
        "/old.css",
        ResponseTemplate::new(301).insert_header("Location", "/assets/new.css"),
    )
    .await;
    mount_get(
        &site,
        "/assets/new.css",
        ResponseTemplate::new(200).set_body_raw("a{background:url(bg.png)}", "text/css"),
    )
    .await;
    mount_get(
        &site,
        "/assets/bg.png",
        ResponseTemplate::new(200).set_body_raw(vec![1u8], "image/png"),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let result = mirror(&format!("{}/", site.uri()), Some(dir.path()), false)
        .await
        .unwrap();

    assert_eq!(result.failed_count(), 0);
    assert_eq!(
        result.local_path_of(&format!("{}/assets/bg.png", site.uri())),
        Some("assets/bg.png")
    );

    // Saved under the requested URL, references resolved against the final one
    let css = fs::read_to_string(dir.path().join("old.css")).unwrap();
    assert_eq!(css, "a{background:url(assets/bg.png)}");
}

#[tokio::test]
async fn test_mirror_cancelled_before_root_completes() {
    let site = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html("<html></html>"))
        .expect(0)
        .mount(&site)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = mirror_with_config(&format!("{}/", site.uri()), &config, false, cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, MirrorError::Cancelled { .. }));
}

#[tokio::test]
async fn test_mirror_resource_limit_skips_extra_resources() {
    let site = MockServer::start().await;
    mount_get(
        &site,
        "/",
        html(r#"<html><body><img src="/1.png"><img src="/2.png"><img src="/3.png"></body></html>"#),
    )
    .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0u8], "image/png"))
        .mount(&site)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir);
    config.mirror.max_resources = 2;

    let result = mirror_with_config(
        &format!("{}/", site.uri()),
        &config,
        false,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(result.fetched_count(), 2);
    assert_eq!(result.skipped_count(), 2);
    assert!(result
        .skipped
        .iter()
        .all(|s| s.reason == SkipReason::ResourceLimit));
    assert!(result
        .resources
        .iter()
        .filter(|r| r.state == ResourceState::Fetched)
        .all(|r| r.local_path.is_some()));
}

#[tokio::test]
async fn test_mirror_fetches_assets_that_are_also_hyperlinked() {
    let site = MockServer::start().await;
    mount_get(
        &site,
        "/",
        html(
            r#"<html><head><link rel="stylesheet" href="/s.css"></head><body>
<a href="big.jpg"><img src="big.jpg"></a><a href="/s.css">css</a></body></html>"#,
        ),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/big.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0xffu8, 0xd8], "image/jpeg"))
        .expect(1)
        .mount(&site)
        .await;
    Mock::given(method("GET"))
        .and(path("/s.css"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("p{margin:0}", "text/css"))
        .expect(1)
        .mount(&site)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir);
    let result = mirror_with_config(
        &format!("{}/", site.uri()),
        &config,
        false,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(result.fetched_count(), 3);
    assert_eq!(result.skipped_count(), 0);
    assert!(dir.path().join("big.jpg").is_file());
    assert!(dir.path().join("s.css").is_file());

    let index = fs::read_to_string(dir.path().join("index.html")).unwrap();
    assert!(index.contains(r#"<img src="big.jpg">"#));
    assert!(index.contains(r#"<a href="big.jpg">"#));
    assert!(index.contains(r#"<link rel="stylesheet" href="s.css">"#));
    assert!(index.contains(r#"<a href="s.css">"#));
    assert!(!index.contains(&site.uri()));
}

#[tokio::test]
async fn test_mirror_job_timeout_returns_partial_result() {
    let site = MockServer::start().await;
    mount_get(
        &site,
        "/",
        html(r#"<html><body><img src="/a.png"><img src="/b.png"></body></html>"#),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/a.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(vec![1u8], "image/png")
                .set_delay(std::time::Duration::from_millis(1500)),
        )
        .expect(1)
        .mount(&site)
        .await;
    Mock::given(method("GET"))
        .and(path("/b.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![2u8], "image/png"))
        .expect(0)
        .mount(&site)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir);
    config.mirror.job_timeout_secs = 1;
    config.mirror.concurrency = 1;

    let result = mirror_with_config(
        &format!("{}/", site.uri()),
        &config,
        false,
        CancellationToken::new(),
    )
    .await
    .expect("a job cancelled after the root completed still succeeds");

    let a = format!("{}/a.png", site.uri());
    let b = format!("{}/b.png", site.uri());

    assert!(result.cancelled);
    assert!(result.index_file.is_file());
    assert_eq!(result.fetched_count(), 2);

    let a_state = result.resources.iter().find(|r| r.url == a).map(|r| &r.state);
    assert_eq!(a_state, Some(&ResourceState::Fetched));
    assert!(dir.path().join("a.png").is_file());

    assert_eq!(result.failed_count(), 1);
    assert_eq!(result.failed[0].url, b);
    assert_eq!(result.failed[0].reason, FailureReason::Cancelled);
    assert_eq!(result.cancelled_count(), 1);
    assert!(!dir.path().join("b.png").exists());
}

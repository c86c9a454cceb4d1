//! Discovery against a mock GitHub API.

use chrono::{DateTime, Utc};
use corpus_harvest::harvest::forge::Client;
use corpus_harvest::harvest::{
    AcceptanceCriteria, Clock, DiscoveryClient, DiscoverySettings, FetchError, FixedClock, Limiters, RateLimitConfig, RepoId,
    ScoringConfig,
};
use serde_json::{Value, json};
use std::sync::Arc;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-06-01T00:00:00Z").unwrap().with_timezone(&Utc)
}

fn discovery_client(server: &MockServer, max_retries: u32) -> DiscoveryClient {
    discovery_client_with(
        server,
        DiscoverySettings {
            max_retries,
            retry_delay_secs: 0,
            ..DiscoverySettings::default()
        },
    )
}

fn discovery_client_with(server: &MockServer, settings: DiscoverySettings) -> DiscoveryClient {
    let clock: Arc<dyn Clock> = Arc::new(FixedClock(now()));
    let rate_limit = RateLimitConfig {
        min_delay_ms: 0,
        max_delay_ms: 0,
        ..RateLimitConfig::default()
    };

    DiscoveryClient::new(
        Client::new(Some("test-token"), server.uri()).unwrap(),
        Limiters::new(&rate_limit, true, &clock),
        settings,
        AcceptanceCriteria::default(),
        ScoringConfig::default(),
        clock,
    )
}

fn repo_detail(full_name: &str, stars: u32, size_kb: u64) -> Value {
    json!({
        "full_name": full_name,
        "description": "An Erlang project",
        "stargazers_count": stars,
        "forks_count": stars / 10,
        "size": size_kb,
        "language": "Erlang",
        "created_at": "2018-01-01T00:00:00Z",
        "updated_at": "2024-05-01T00:00:00Z",
        "clone_url": format!("https://github.com/{full_name}.git"),
        "html_url": format!("https://github.com/{full_name}"),
        "archived": false,
        "has_wiki": true,
        "has_issues": true
    })
}

fn search_page(names: impl IntoIterator<Item = String>) -> Value {
    let items: Vec<Value> = names.into_iter().map(|name| json!({ "full_name": name })).collect();
    json!({ "total_count": 1000, "incomplete_results": false, "items": items })
}

async fn mount_repository(server: &MockServer, full_name: &str, stars: u32, size_kb: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/repos/{full_name}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(repo_detail(full_name, stars, size_kb)))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/repos/{full_name}/languages")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Erlang": 9000, "Makefile": 1000 })))
        .mount(server)
        .await;
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot run network tests")]
async fn test_search_follows_pages_until_short_page() {
    let server = MockServer::start().await;

    for (page, count) in [("1", 100), ("2", 100), ("3", 30)] {
        let names = (0..count).map(|i| format!("owner{page}/repo{i}"));
        Mock::given(method("GET"))
            .and(path("/search/repositories"))
            .and(query_param("page", page))
            .and(query_param("per_page", "100"))
            .and(query_param("sort", "stars"))
            .respond_with(ResponseTemplate::new(200).set_body_json(search_page(names)))
            .expect(1)
            .mount(&server)
            .await;
    }

    let client = discovery_client(&server, 3);
    let found = client.search_repositories("language:erlang", 250).await;

    assert_eq!(found.len(), 230);
    assert_eq!(found[0].to_string(), "owner1/repo0");
    assert_eq!(found[229].to_string(), "owner3/repo29");
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot run network tests")]
async fn test_search_stops_after_empty_page() {
    let server = MockServer::start().await;

    for page in ["1", "2"] {
        let names = (0..100).map(|i| format!("owner{page}/repo{i}"));
        Mock::given(method("GET"))
            .and(path("/search/repositories"))
            .and(query_param("page", page))
            .respond_with(ResponseTemplate::new(200).set_body_json(search_page(names)))
            .expect(1)
            .mount(&server)
            .await;
    }

    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .and(query_param("page", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_page(Vec::new())))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .and(query_param("page", "4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_page(Vec::new())))
        .expect(0)
        .mount(&server)
        .await;

    let client = discovery_client(&server, 3);
    let found = client.search_repositories("language:erlang", 1000).await;

    assert_eq!(found.len(), 200);
    assert_eq!(found[199].to_string(), "owner2/repo99");
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot run network tests")]
async fn test_search_stops_at_max_results() {
    let server = MockServer::start().await;

    for page in ["1", "2"] {
        let names = (0..100).map(|i| format!("owner{page}/repo{i}"));
        Mock::given(method("GET"))
            .and(path("/search/repositories"))
            .and(query_param("page", page))
            .respond_with(ResponseTemplate::new(200).set_body_json(search_page(names)))
            .expect(1)
            .mount(&server)
            .await;
    }

    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .and(query_param("page", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_page(Vec::new())))
        .expect(0)
        .mount(&server)
        .await;

    let client = discovery_client(&server, 3);
    let found = client.search_repositories("language:erlang", 150).await;

    assert_eq!(found.len(), 150);
    assert_eq!(found[149].to_string(), "owner2/repo49");
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot run network tests")]
async fn test_search_failure_keeps_earlier_pages() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_page((0..10).map(|i| format!("a/r{i}")))))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(422))
        .mount(&server)
        .await;

    let client = discovery_client(&server, 3);
    let found = client.search_repositories("language:erlang", 20).await;

    assert_eq!(found.len(), 10);
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot run network tests")]
async fn test_discover_all_merges_scores_and_filters() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(search_page(["acme/popular".to_string(), "tiny/toy".to_string()])),
        )
        .mount(&server)
        .await;

    mount_repository(&server, "acme/popular", 2_000, 20_000).await;
    mount_repository(&server, "acme/modest", 40, 1_000).await;
    mount_repository(&server, "tiny/toy", 2, 500).await;

    Mock::given(method("GET"))
        .and(path("/repos/gone/away"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let seeds: Vec<RepoId> = ["acme/modest", "gone/away", "acme/popular"]
        .into_iter()
        .map(|s| RepoId::parse(s).unwrap())
        .collect();

    let client = discovery_client(&server, 3);
    let records = client
        .discover_all(&seeds, &["language:erlang".to_string()], 100)
        .await;

    let names: Vec<String> = records.iter().map(|r| r.id().to_string()).collect();
    assert_eq!(names, ["acme/popular", "acme/modest"]);
    assert!(records[0].quality_score() > records[1].quality_score());
    assert!((records[0].target_language_fraction() - 0.9).abs() < 1e-9);
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot run network tests")]
async fn test_discover_all_continues_after_failed_query() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .and(query_param("q", "broken query"))
        .respond_with(ResponseTemplate::new(422))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .and(query_param("q", "language:erlang"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_page(["acme/popular".to_string()])))
        .expect(1)
        .mount(&server)
        .await;

    mount_repository(&server, "acme/popular", 2_000, 20_000).await;

    let client = discovery_client(&server, 3);
    let queries = ["broken query".to_string(), "language:erlang".to_string()];
    let records = client.discover_all(&[], &queries, 100).await;

    let names: Vec<String> = records.iter().map(|r| r.id().to_string()).collect();
    assert_eq!(names, ["acme/popular"]);
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot run network tests")]
async fn test_discover_all_stops_at_max_repositories() {
    let server = MockServer::start().await;

    mount_repository(&server, "acme/alpha", 500, 5_000).await;
    mount_repository(&server, "acme/beta", 400, 5_000).await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/gamma"))
        .respond_with(ResponseTemplate::new(200).set_body_json(repo_detail("acme/gamma", 300, 5_000)))
        .expect(0)
        .mount(&server)
        .await;

    let seeds: Vec<RepoId> = ["acme/gamma", "acme/beta", "acme/alpha"]
        .into_iter()
        .map(|s| RepoId::parse(s).unwrap())
        .collect();

    let client = discovery_client_with(
        &server,
        DiscoverySettings {
            max_repositories: 2,
            retry_delay_secs: 0,
            ..DiscoverySettings::default()
        },
    );
    let records = client.discover_all(&seeds, &[], 100).await;

    let names: Vec<String> = records.iter().map(|r| r.id().to_string()).collect();
    assert_eq!(names, ["acme/alpha", "acme/beta"]);
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot run network tests")]
async fn test_missing_languages_yield_empty_histogram() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/nolang"))
        .respond_with(ResponseTemplate::new(200).set_body_json(repo_detail("acme/nolang", 100, 1_000)))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/nolang/languages"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = discovery_client(&server, 3);
    let record = client.fetch_record(&RepoId::parse("acme/nolang").unwrap()).await.unwrap();

    assert!(record.metadata().languages.is_empty());
    assert!(record.target_language_fraction().abs() < f64::EPSILON);
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot run network tests")]
async fn test_throttled_and_transient_failures_are_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/flaky"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    mount_repository(&server, "acme/flaky", 100, 1_000).await;

    let client = discovery_client(&server, 3);
    let record = client.fetch_record(&RepoId::parse("acme/flaky").unwrap()).await.unwrap();

    assert_eq!(record.stars(), 100);
    let backoff = client.limiters().core.backoff();
    assert_eq!(backoff.throttles(), 1);
    assert_eq!(backoff.successes(), 2);
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot run network tests")]
async fn test_retries_exhausted() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/down"))
        .respond_with(ResponseTemplate::new(502))
        .expect(2)
        .mount(&server)
        .await;

    let client = discovery_client(&server, 2);
    let result = client.fetch_record(&RepoId::parse("acme/down").unwrap()).await;

    assert!(matches!(result, Err(FetchError::RetriesExhausted { attempts: 2, .. })), "{result:?}");
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot run network tests")]
async fn test_permanent_failure_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/odd"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .expect(1)
        .mount(&server)
        .await;

    let client = discovery_client(&server, 3);
    let result = client.fetch_record(&RepoId::parse("acme/odd").unwrap()).await;

    assert!(matches!(result, Err(FetchError::Permanent(_))), "{result:?}");
}

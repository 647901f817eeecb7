//! Integration tests using wiremock to simulate HTTP servers.

use apiary::{BearerToken, Client, EndpointKind, Error, Reply, StreamConfig, StreamState};
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> Client {
    client_with_backoff(server, Duration::from_millis(10))
}

fn client_with_backoff(server: &MockServer, initial_backoff: Duration) -> Client {
    Client::builder()
        .base_url(format!("{}/{{api}}/{{version}}", server.uri()))
        .unwrap()
        .stream_config(StreamConfig {
            initial_backoff,
            max_backoff: initial_backoff * 10,
            ..StreamConfig::default()
        })
        .build()
        .unwrap()
}

#[derive(Debug, Deserialize, PartialEq)]
struct User {
    id: u64,
    screen_name: String,
}

#[tokio::test]
async fn test_json_endpoint_is_decoded() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/1.1/users/show.json"))
        .and(query_param("screen_name", "rustlang"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"id": 1, "screen_name": "rustlang"}))
                .insert_header("x-rate-limit-remaining", "899"),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let user = client
        .api("api")
        .unwrap()
        .join("users")
        .join("show")
        .get()
        .param("screen_name", "rustlang")
        .fetch()
        .await
        .unwrap();

    assert_eq!(user["screen_name"], "rustlang");
    assert_eq!(user.len(), Some(2));
    assert_eq!(user.header("x-rate-limit-remaining"), Some("899"));
    assert_eq!(user.url.path(), "/api/1.1/users/show.json");
    assert_eq!(user.request.method, http::Method::GET);
    assert_eq!(
        user.deserialize::<User>().unwrap(),
        User {
            id: 1,
            screen_name: "rustlang".to_string()
        }
    );
}

#[tokio::test]
async fn test_envelope_iterates_list_payloads() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/1.1/statuses/home_timeline.json"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{"id": 1}, {"id": 2}, {"id": 3}])),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let timeline = client
        .api("api")
        .unwrap()
        .join("statuses")
        .join("home_timeline")
        .get()
        .fetch()
        .await
        .unwrap();

    let ids: Vec<u64> = timeline.iter().filter_map(|t| t["id"].as_u64()).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(timeline[1]["id"], 2);
}

#[tokio::test]
async fn test_non_json_endpoint_returns_text() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/1.1/robots"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *"))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let robots = client
        .api(("api", "1.1", ""))
        .unwrap()
        .join("robots")
        .get()
        .fetch()
        .await
        .unwrap();

    assert_eq!(robots.as_str(), Some("User-agent: *"));
}

#[tokio::test]
async fn test_json_override_forces_decoding() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/2/tweets"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"data": []}"#))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let tweets = client
        .api(("api", "2", ""))
        .unwrap()
        .join("tweets")
        .get()
        .json(true)
        .fetch()
        .await
        .unwrap();

    assert!(tweets["data"].is_array());
}

#[tokio::test]
async fn test_client_error_carries_raw_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/1.1/users/show.json"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_string(r#"{"errors":[{"code":50,"message":"User not found."}]}"#),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let result = client
        .api("api")
        .unwrap()
        .join("users")
        .join("show")
        .get()
        .fetch()
        .await;

    match result {
        Err(Error::ClientError {
            status,
            raw_response,
            ..
        }) => {
            assert_eq!(status.as_u16(), 404);
            assert!(raw_response.contains("User not found."));
        }
        other => panic!("Expected ClientError, got {:?}", other),
    }
}

#[tokio::test]
async fn test_server_error_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Over capacity"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let result = client.api("api").unwrap().join("ping").get().fetch().await;

    let error = result.unwrap_err();
    assert!(matches!(error, Error::ServerError { .. }));
    assert_eq!(error.raw_response(), Some("Over capacity"));
}

#[tokio::test]
async fn test_malformed_json_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/1.1/broken.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let result = client.api("api").unwrap().join("broken").get().fetch().await;

    match result {
        Err(Error::Malformed { raw_response, .. }) => assert_eq!(raw_response, "{not json"),
        other => panic!("Expected Malformed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_rate_limit_is_waited_out() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/1.1/search/tweets.json"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/1.1/search/tweets.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"statuses": []})))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let start = Instant::now();
    let result = client
        .api("api")
        .unwrap()
        .join("search")
        .join("tweets")
        .get()
        .param("q", "rust")
        .fetch()
        .await
        .unwrap();

    // reset_in of zero still waits the extra second
    assert!(start.elapsed() >= Duration::from_secs(1));
    assert!(result["statuses"].is_array());
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_error_handling_disabled_for_one_call() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(420).insert_header("retry-after", "30"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let result = client
        .api("api")
        .unwrap()
        .join("search")
        .get()
        .error_handling(false)
        .fetch()
        .await;

    let error = result.unwrap_err();
    assert!(matches!(error, Error::RateLimited { .. }));
    assert_eq!(error.reset_in(), Some(Duration::from_secs(30)));
}

#[tokio::test]
async fn test_error_handling_disabled_for_client() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "30"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = Client::builder()
        .base_url(format!("{}/{{api}}/{{version}}", mock_server.uri()))
        .unwrap()
        .error_handling(false)
        .build()
        .unwrap();

    let result = client.api("api").unwrap().join("search").get().fetch().await;
    assert!(matches!(result, Err(Error::RateLimited { .. })));
}

#[tokio::test]
async fn test_timeouts_are_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"slow": true}))
                .set_delay(Duration::from_millis(500)),
        )
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"slow": false})))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let result = client
        .api("api")
        .unwrap()
        .join("slow")
        .get()
        .timeout(Duration::from_millis(100))
        .fetch()
        .await
        .unwrap();

    assert_eq!(result["slow"], false);
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_timeout_without_error_handling() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let result = client
        .api("api")
        .unwrap()
        .join("slow")
        .get()
        .timeout(Duration::from_millis(50))
        .error_handling(false)
        .fetch()
        .await;

    assert!(matches!(result, Err(Error::Timeout)));
}

#[tokio::test]
async fn test_auth_headers_take_precedence() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(header("authorization", "Bearer secret"))
        .and(header("x-client", "tests"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = Client::builder()
        .base_url(format!("{}/{{api}}/{{version}}", mock_server.uri()))
        .unwrap()
        .auth(BearerToken::new("secret").unwrap())
        .default_header("X-Client", "tests")
        .unwrap()
        .build()
        .unwrap();

    client
        .api("api")
        .unwrap()
        .join("account")
        .join("verify_credentials")
        .get()
        .header("Authorization", "Bearer forged")
        .fetch()
        .await
        .unwrap();
}

#[tokio::test]
async fn test_get_params_go_in_query_string() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/1.1/users/lookup.json"))
        .and(query_param("user_id", "1,2,3"))
        .and(query_param("include_entities", "false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    client
        .api("api")
        .unwrap()
        .join("users")
        .join("lookup")
        .get()
        .param("user_id", vec![1, 2, 3])
        .param("include_entities", false)
        .fetch()
        .await
        .unwrap();
}

#[tokio::test]
async fn test_post_params_go_in_form_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/1.1/statuses/update.json"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("status=hello"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 10})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let tweet = client
        .api("api")
        .unwrap()
        .join("statuses")
        .join("update")
        .post()
        .param("status", "hello")
        .fetch()
        .await
        .unwrap();

    assert_eq!(tweet["id"], 10);
}

#[tokio::test]
async fn test_json_body_moves_params_to_query() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/1.1/direct_messages/events/new.json"))
        .and(query_param("dry_run", "true"))
        .and(header("content-type", "application/json"))
        .and(body_string_contains("message_create"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"event": {}})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    client
        .api("api")
        .unwrap()
        .join("direct_messages")
        .join("events")
        .join("new")
        .post()
        .param("dry_run", true)
        .json_body(&json!({"event": {"type": "message_create"}}))
        .fetch()
        .await
        .unwrap();
}

#[test]
fn test_access_keys_through_client() {
    let client = Client::builder().build().unwrap();

    let path = client.api("api").unwrap().join("statuses").join("show");
    assert_eq!(path.url(), "https://api.twitter.com/1.1/statuses/show.json");

    let branch = path.join("extra");
    assert_eq!(path.segments(), ["statuses", "show"]);
    assert_eq!(branch.segments(), ["statuses", "show", "extra"]);

    let upload = client.api(("upload", "1.1")).unwrap().join("media").join("upload");
    assert_eq!(upload.url(), "https://upload.twitter.com/1.1/media/upload.json");

    assert_eq!(client.api("userstream").unwrap().kind(), EndpointKind::Streaming);

    let set: HashSet<&str> = HashSet::from(["api"]);
    assert!(matches!(client.api(set), Err(Error::InvalidAccessKind(_))));
}

#[tokio::test]
async fn test_awaiting_a_call_dispatches_by_kind() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/1.1/help/configuration.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"photo_size_limit": 1})))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);

    let reply = client
        .api("api")
        .unwrap()
        .join("help")
        .join("configuration")
        .get()
        .await
        .unwrap();
    assert!(matches!(reply, Reply::Rest(_)));
    assert_eq!(reply.into_envelope().unwrap()["photo_size_limit"], 1);

    let reply = client
        .api("stream")
        .unwrap()
        .join("statuses")
        .join("sample")
        .get()
        .await
        .unwrap();
    let stream = reply.into_stream().unwrap();
    assert_eq!(stream.state(), StreamState::Idle);
}

#[tokio::test]
async fn test_stream_reconnects_without_duplicates() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/stream/1.1/statuses/sample.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("{\"id\":1}\r\n\r\n{\"id\":2}\r\n{\"id\":3}\r\n"),
        )
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/stream/1.1/statuses/sample.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"id\":4}\r\n"))
        .mount(&mock_server)
        .await;

    let client = client_with_backoff(&mock_server, Duration::from_millis(200));
    let mut stream = client
        .api("stream")
        .unwrap()
        .join("statuses")
        .join("sample")
        .get()
        .stream()
        .unwrap();

    let mut ids = Vec::new();
    while ids.len() < 3 {
        let record = stream.next().await.unwrap().unwrap();
        ids.push(record["id"].as_u64().unwrap());
    }
    assert_eq!(stream.backoff(), Duration::from_millis(200));

    // the body has ended, so the stream is now sleeping before reconnecting
    let pending = tokio::time::timeout(Duration::from_millis(100), stream.next()).await;
    assert!(pending.is_err());
    assert_eq!(stream.state(), StreamState::Reconnecting);
    assert_eq!(stream.reconnects(), 1);
    assert_eq!(stream.backoff(), Duration::from_millis(400));

    let record = stream.next().await.unwrap().unwrap();
    ids.push(record["id"].as_u64().unwrap());

    assert_eq!(ids, vec![1, 2, 3, 4]);
    assert_eq!(stream.reconnects(), 1);
    assert_eq!(stream.state(), StreamState::Streaming);
    assert_eq!(stream.backoff(), Duration::from_millis(200));
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 2);

    stream.close();
    assert_eq!(stream.state(), StreamState::Closed);
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn test_stream_keeps_unterminated_last_record() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"id\":1}\r\n{\"id\":2}"))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"id\":3}\r\n"))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let mut stream = client
        .api("stream")
        .unwrap()
        .join("statuses")
        .join("sample")
        .get()
        .stream()
        .unwrap();

    let mut ids = Vec::new();
    while ids.len() < 3 {
        let record = stream.next().await.unwrap().unwrap();
        ids.push(record["id"].as_u64().unwrap());
    }

    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(stream.reconnects(), 1);
}

#[tokio::test]
async fn test_rate_limit_headers_out_of_range() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("x-rate-limit-reset", u64::MAX.to_string().as_str()),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let result = client
        .api("api")
        .unwrap()
        .join("search")
        .get()
        .error_handling(false)
        .fetch()
        .await;

    let error = result.unwrap_err();
    assert!(matches!(error, Error::RateLimited { .. }));
    assert_eq!(error.reset_in(), Some(Duration::ZERO));
}

#[tokio::test]
async fn test_stream_skips_malformed_records() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_string_contains("track=rust"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("{\"id\":1}\r\n{\"id\":\r\n{\"id\":2}\r\n"),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let mut stream = client
        .api("stream")
        .unwrap()
        .join("statuses")
        .join("filter")
        .post()
        .param("track", "rust")
        .stream()
        .unwrap();

    let first = stream.next().await.unwrap().unwrap();
    let second = stream.next().await.unwrap().unwrap();
    assert_eq!(first["id"], 1);
    assert_eq!(second["id"], 2);
}

#[tokio::test]
async fn test_stream_recovers_from_server_errors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"id\":1}\r\n"))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let mut stream = client
        .api("stream")
        .unwrap()
        .join("statuses")
        .join("sample")
        .get()
        .stream()
        .unwrap();

    let record = stream.next().await.unwrap().unwrap();
    assert_eq!(record["id"], 1);
    assert_eq!(stream.reconnects(), 2);
    assert_eq!(stream.backoff(), Duration::from_millis(10));
}

#[tokio::test]
async fn test_stream_fails_on_client_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let mut stream = client
        .api("stream")
        .unwrap()
        .join("statuses")
        .join("sample")
        .get()
        .stream()
        .unwrap();

    match stream.next().await {
        Some(Err(Error::ClientError { status, .. })) => assert_eq!(status.as_u16(), 401),
        other => panic!("Expected ClientError, got {:?}", other),
    }
    assert_eq!(stream.state(), StreamState::Failed);
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn test_stream_reopen_starts_over() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"id\":7}\r\n"))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let mut stream = client
        .api("stream")
        .unwrap()
        .join("statuses")
        .join("sample")
        .get()
        .stream()
        .unwrap();

    assert!(matches!(stream.next().await, Some(Err(_))));
    assert!(stream.next().await.is_none());

    stream.reopen();
    assert_eq!(stream.state(), StreamState::Idle);
    let record = stream.next().await.unwrap().unwrap();
    assert_eq!(record["id"], 7);
    assert_eq!(stream.reconnects(), 0);
}

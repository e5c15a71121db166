//! Search against a mocked ranking proxy.

use roster::config::SearchConfig;
use roster::models::AttendeeProfile;
use roster::search::{search, HttpRankingClient, RankingModel, SearchError, SearchOutcome};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn profiles() -> Vec<AttendeeProfile> {
    serde_json::from_value(json!([
        {"id": "p1", "name": "Ada", "url": "u1",
         "experience": [{"title": "Engineer", "company": "Palantir Technologies"}]},
        {"id": "p2", "name": "Ben", "url": "u2",
         "experience": [{"title": "Analyst", "company": "Goldman Sachs"}]},
        {"id": "p3", "name": "Cy", "url": "u3", "headline": "Founder"},
        {"id": "p4", "name": "Di", "url": "u4", "school": "Yale University"},
        {"id": "p5", "name": "Ed", "url": "u5", "skills": ["Rust"]}
    ]))
    .unwrap()
}

fn config_for(server: &MockServer) -> SearchConfig {
    SearchConfig {
        endpoint: format!("{}/api/search", server.uri()),
        timeout_secs: 5,
        ..SearchConfig::default()
    }
}

fn envelope(answer: &str) -> serde_json::Value {
    json!({"content": [{"type": "text", "text": answer}]})
}

#[tokio::test]
async fn test_palantir_query_drops_matches_below_floor() {
    let server = MockServer::start().await;
    let answer = json!({
        "summary": "One attendee worked at Palantir.",
        "matches": [
            {"id": "p2", "score": 20, "relevance": "Finance background", "highlights": []},
            {"id": "p4", "score": 25, "relevance": "Yale alumna", "highlights": []},
            {"id": "p1", "score": 95, "relevance": "Engineer at Palantir",
             "highlights": [{"section": "experience", "index": 0, "field": "company",
                             "reason": "Palantir"}]}
        ]
    })
    .to_string();
    Mock::given(method("POST"))
        .and(path("/api/search"))
        .and(body_partial_json(json!({"model": "claude-sonnet", "query": "Palantir alumni"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(&answer)))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpRankingClient::new(5).unwrap();
    let outcome = search(
        &client,
        &config_for(&server),
        RankingModel::ClaudeSonnet,
        "Palantir alumni",
        &profiles(),
    )
    .await
    .unwrap();

    match outcome {
        SearchOutcome::Ranked {
            summary_text,
            matches,
            dropped_below_floor,
            ..
        } => {
            assert_eq!(summary_text, "One attendee worked at Palantir.");
            let names: Vec<_> = matches
                .iter()
                .map(|m| m.profile.name.as_deref().unwrap_or(""))
                .collect();
            assert_eq!(names, vec!["Ada", "Di"]);
            assert_eq!(matches[0].matched.score, 95.0);
            assert_eq!(matches[0].matched.highlights.len(), 1);
            assert_eq!(matches[1].matched.score, 25.0);
            assert_eq!(dropped_below_floor, 1);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test]
async fn test_empty_match_list_uses_default_summary() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(r#"{"matches": []}"#)))
        .mount(&server)
        .await;

    let client = HttpRankingClient::new(5).unwrap();
    let outcome = search(
        &client,
        &config_for(&server),
        RankingModel::GeminiPro,
        "astronauts",
        &profiles(),
    )
    .await
    .unwrap();

    assert_eq!(
        outcome,
        SearchOutcome::Ranked {
            summary_text: "No matches found for your query.".into(),
            matches: Vec::new(),
            dropped_below_floor: 0,
            show_clear: true,
        }
    );
}

#[tokio::test]
async fn test_thinking_block_skipped() {
    let server = MockServer::start().await;
    let body = json!({"content": [
        {"type": "thinking", "thinking": "{\"matches\": [{\"id\": \"p3\", \"score\": 99}]}"},
        {"type": "text", "text": "Here you go: {\"summary\": \"Founders\", \"matches\": [{\"id\": \"p3\", \"score\": 90, \"relevance\": \"Founder\"}]} hope that helps"}
    ]});
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;

    let client = HttpRankingClient::new(5).unwrap();
    let outcome = search(
        &client,
        &config_for(&server),
        RankingModel::GeminiFlash,
        "founders",
        &profiles(),
    )
    .await
    .unwrap();

    let SearchOutcome::Ranked { matches, .. } = outcome else {
        panic!("expected ranked outcome");
    };
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].matched.score, 90.0);
    assert_eq!(matches[0].matched.relevance, "Founder");
}

#[tokio::test]
async fn test_upstream_error_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "bad key"})))
        .mount(&server)
        .await;

    let client = HttpRankingClient::new(5).unwrap();
    let err = search(
        &client,
        &config_for(&server),
        RankingModel::Gpt4o,
        "anyone",
        &profiles(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, SearchError::Remote { status: 500, .. }));
    assert_eq!(
        err.user_message(),
        "Error: bad key. Please check your API key and try again."
    );
}

#[tokio::test]
async fn test_prose_answer_is_unparsed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(envelope("I could not find anyone.")),
        )
        .mount(&server)
        .await;

    let client = HttpRankingClient::new(5).unwrap();
    let outcome = search(
        &client,
        &config_for(&server),
        RankingModel::GeminiPro,
        "anyone",
        &profiles(),
    )
    .await
    .unwrap();

    assert_eq!(
        outcome,
        SearchOutcome::Unparsed {
            raw: "I could not find anyone.".into()
        }
    );
}

#[tokio::test]
async fn test_vector_model_sends_query_only() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/vector-search"))
        .and(body_partial_json(json!({"model": "claude", "query": "rust"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(
            r#"{"matches": [{"id": "p5", "score": 88, "relevance": "Rust skill"}]}"#,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let config = SearchConfig {
        index_endpoint: Some(format!("{}/api/vector-search", server.uri())),
        index_analysis_model: "claude".into(),
        ..config_for(&server)
    };
    let client = HttpRankingClient::new(5).unwrap();
    let outcome = search(&client, &config, RankingModel::Vector, "rust", &profiles())
        .await
        .unwrap();

    let SearchOutcome::Ranked { matches, .. } = outcome else {
        panic!("expected ranked outcome");
    };
    assert_eq!(matches[0].profile.name.as_deref(), Some("Ed"));

    let received = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    assert!(body.get("attendees").is_none());
}

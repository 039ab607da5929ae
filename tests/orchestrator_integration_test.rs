use chrono::NaiveDate;
use httpmock::prelude::*;
use nyc_answers::{build_orchestrator, AppConfig, Providers};
use serde_json::{json, Value};

fn config_for(server: &MockServer, mode: &str, production: bool) -> AppConfig {
    let toml = format!(
        r#"
[service]
city = "NYC"
production = {production}

[llm]
base_url = "{base}"
api_key = "sk-test"

[generation]
mode = "{mode}"

[search]
base_url = "{base}"
api_key = "tvly-test"

[weather]
base_url = "{weather}"
api_key = "vc-test"
"#,
        production = production,
        base = server.base_url(),
        mode = mode,
        weather = server.url("/timeline"),
    );
    AppConfig::from_toml_str(&toml).unwrap()
}

fn completion(content: &str) -> Value {
    json!({"choices": [{"message": {"role": "assistant", "content": content}}]})
}

fn wednesday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 20).unwrap()
}

#[tokio::test]
async fn test_weekend_query_uses_search_and_weather() {
    let server = MockServer::start();

    let classify = server.mock(|when, then| {
        when.method(POST)
            .path("/chat/completions")
            .header("authorization", "Bearer sk-test")
            .body_contains("Classify whether this query");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(completion(r#"{"route": "EXTERNAL_SEARCH", "confidence": 0.93}"#));
    });

    let recommendations = json!({
        "type": "recommendations",
        "content": "Two markets worth visiting this weekend.",
        "items": [
            {"title": "Smorgasburg", "tags": ["food", "outdoor"], "distance": "2 miles"},
            {"title": "Chelsea Market", "price": "$$"}
        ]
    });
    let generate = server.mock(|when, then| {
        when.method(POST)
            .path("/chat/completions")
            .body_contains("knowledgeable NYC guide")
            .body_contains("Weather forecast for NYC")
            .body_contains("Smorgasburg reopens Saturday");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(completion(&recommendations.to_string()));
    });

    let search = server.mock(|when, then| {
        when.method(POST)
            .path("/search")
            .header("authorization", "Bearer tvly-test")
            .body_contains("\"include_answer\":true");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(json!({
                "answer": "Smorgasburg reopens Saturday in Williamsburg.",
                "results": [
                    {"title": "Smorgasburg", "url": "https://www.smorgasburg.com", "content": "Saturdays 11-6"}
                ]
            }));
    });

    let weather = server.mock(|when, then| {
        when.method(GET)
            .path_contains("/timeline/")
            .path_contains("/2024-03-23/2024-03-24")
            .query_param("key", "vc-test");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(json!({
                "days": [
                    {"datetime": "2024-03-23", "tempmax": 58.0, "tempmin": 44.0, "conditions": "Clear", "description": "Sunny all day."},
                    {"datetime": "2024-03-24", "tempmax": 55.0, "tempmin": 41.0, "conditions": "Rain", "description": "Showers."}
                ]
            }));
    });

    let config = config_for(&server, "batch", false);
    let providers = Providers::from_config(&config).unwrap();
    let orchestrator = build_orchestrator(&config, &providers);

    let result = orchestrator
        .run_at("Any food markets this weekend?", wednesday())
        .await;

    classify.assert();
    generate.assert();
    search.assert();
    weather.assert();

    let body = serde_json::to_value(&result).unwrap();
    assert_eq!(body["type"], "recommendations");
    assert_eq!(body["content"], "Two markets worth visiting this weekend.");
    assert_eq!(body["items"][0]["tags"], json!(["food", "outdoor"]));
    assert_eq!(body["isExternalSearch"], true);
    assert_eq!(body["citations"][0]["url"], "https://www.smorgasburg.com");
    assert_eq!(body["debug"]["route"], "EXTERNAL_SEARCH");
    assert_eq!(body["debug"]["steps"]["weather"]["startDate"], "2024-03-23");
    assert_eq!(body["debug"]["steps"]["externalSearch"]["status"], "ok");
}

#[tokio::test]
async fn test_search_outage_degrades_to_uncited_answer() {
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(POST)
            .path("/chat/completions")
            .body_contains("Classify whether this query");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(completion(r#"{"route": "EXTERNAL_SEARCH", "confidence": 0.8}"#));
    });
    let generate = server.mock(|when, then| {
        when.method(POST)
            .path("/chat/completions")
            .body_contains("knowledgeable NYC guide");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(completion("The L train usually runs every 4 minutes at rush hour."));
    });
    let search = server.mock(|when, then| {
        when.method(POST).path("/search");
        then.status(503).body("unavailable");
    });

    let config = config_for(&server, "batch", false);
    let orchestrator = build_orchestrator(&config, &Providers::from_config(&config).unwrap());

    let result = orchestrator.run_at("Is the L train delayed now?", wednesday()).await;

    search.assert();
    generate.assert();
    let body = serde_json::to_value(&result).unwrap();
    assert_eq!(body["type"], "information");
    assert_eq!(
        body["content"],
        "The L train usually runs every 4 minutes at rush hour."
    );
    assert_eq!(body["isExternalSearch"], true);
    assert_eq!(body["citations"], json!([]));
    assert_eq!(body["debug"]["steps"]["externalSearch"]["status"], "unavailable");
}

#[tokio::test]
async fn test_streaming_generation_end_to_end() {
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(POST)
            .path("/chat/completions")
            .body_contains("\"stream\":false");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(completion(r#"{"route": "AI_ONLY", "confidence": 0.7}"#));
    });

    let fragments = [
        r#"{"type": "directions", "content": "Take the subway.", "#,
        r#""options": [{"type": "Fastest", "steps": "#,
        r#"[{"transport": "subway", "description": "A train to 190 St"}]}]}"#,
    ];
    let mut sse = String::new();
    for fragment in fragments {
        let chunk = json!({"choices": [{"delta": {"content": fragment}}]});
        sse.push_str(&format!("data: {}\n\n", chunk));
    }
    sse.push_str("data: [DONE]\n\n");

    let stream = server.mock(|when, then| {
        when.method(POST)
            .path("/chat/completions")
            .body_contains("\"stream\":true")
            .body_contains("\"max_tokens\":1000");
        then.status(200)
            .header("Content-Type", "text/event-stream")
            .body(sse);
    });

    let config = config_for(&server, "stream", false);
    let orchestrator = build_orchestrator(&config, &Providers::from_config(&config).unwrap());

    let result = orchestrator.run_at("How do I get to the Cloisters?", wednesday()).await;

    stream.assert();
    let body = serde_json::to_value(&result).unwrap();
    assert_eq!(body["type"], "directions");
    assert_eq!(body["options"][0]["type"], "Fastest");
    assert_eq!(body["options"][0]["steps"][0]["transport"], "subway");
    assert_eq!(body["isExternalSearch"], false);
    assert_eq!(body["debug"]["steps"]["finalResponse"]["partial"], false);
}

#[tokio::test]
async fn test_classifier_outage_in_production_mode() {
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(POST)
            .path("/chat/completions")
            .body_contains("Classify whether this query");
        then.status(500).body("internal error");
    });
    server.mock(|when, then| {
        when.method(POST)
            .path("/chat/completions")
            .body_contains("knowledgeable NYC guide");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(completion(
                r#"{"type": "reviews", "content": "Loved by locals.", "rating": 4.6, "reviewCount": 1200, "pros": ["pastrami"], "cons": ["lines"]}"#,
            ));
    });
    let search = server.mock(|when, then| {
        when.method(POST).path("/search");
        then.status(200).json_body(json!({"results": []}));
    });

    let config = config_for(&server, "batch", true);
    let orchestrator = build_orchestrator(&config, &Providers::from_config(&config).unwrap());

    let result = orchestrator.run_at("Is Katz's Deli any good?", wednesday()).await;

    assert_eq!(search.hits(), 0);
    let body = serde_json::to_value(&result).unwrap();
    assert_eq!(body["type"], "reviews");
    assert_eq!(body["reviewCount"], 1200);
    assert_eq!(body["isExternalSearch"], false);
    assert!(body.get("debug").is_none());
}

#[tokio::test]
async fn test_generator_failure_is_error_payload() {
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(POST)
            .path("/chat/completions")
            .body_contains("Classify whether this query");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(completion(r#"{"route": "AI_ONLY", "confidence": 0.6}"#));
    });
    server.mock(|when, then| {
        when.method(POST)
            .path("/chat/completions")
            .body_contains("knowledgeable NYC guide");
        then.status(401).body("invalid api key");
    });

    let config = config_for(&server, "batch", false);
    let orchestrator = build_orchestrator(&config, &Providers::from_config(&config).unwrap());

    let result = orchestrator.run_at("Best bagel in Manhattan?", wednesday()).await;

    assert!(result.is_error());
    let body = serde_json::to_value(&result).unwrap();
    assert_eq!(body["type"], "error");
    assert_eq!(body["context"]["errorCode"], "SEARCH_ERROR");
    assert_eq!(body["context"]["errorStatus"], 500);
    assert!(body["content"]
        .as_str()
        .unwrap()
        .starts_with("I encountered an error while processing your request:"));
}

#[tokio::test]
async fn test_null_generation_content_is_invalid_response() {
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(POST)
            .path("/chat/completions")
            .body_contains("Classify whether this query");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(completion(r#"{"route": "AI_ONLY", "confidence": 0.9}"#));
    });
    server.mock(|when, then| {
        when.method(POST)
            .path("/chat/completions")
            .body_contains("knowledgeable NYC guide");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(json!({"choices": [{"message": {"role": "assistant", "content": null}}]}));
    });

    let config = config_for(&server, "batch", true);
    let orchestrator = build_orchestrator(&config, &Providers::from_config(&config).unwrap());

    let result = orchestrator.run_at("Where is the Met?", wednesday()).await;

    let body = serde_json::to_value(&result).unwrap();
    assert_eq!(body["type"], "error");
    assert_eq!(body["context"]["errorCode"], "INVALID_RESPONSE");
    assert_eq!(body["context"]["errorStatus"], 500);
}

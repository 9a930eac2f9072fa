//! HttpWatchApi 통합 테스트 (mockito 서버 사용).

use futures::StreamExt;
use mockito::Matcher;
use serde_json::json;
use watchdesk_client::{BatchAnalysis, ClientError, HttpWatchApi, WatchApi};
use watchdesk_core::{AnalysisEvent, EntityDraft, SeriesKey, Suggestion};

fn api(server: &mockito::Server) -> HttpWatchApi {
    HttpWatchApi::with_base_url(server.url()).unwrap()
}

#[tokio::test]
async fn test_list_drops_malformed_records() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/stocks")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!([
                {"id": "p-1", "title": "Tech", "tickers": ["AAPL"]},
                {"title": "no id"},
                {"id": "p-2", "title": "Cars", "tickers": ["TSLA"], "snapshot": null}
            ])
            .to_string(),
        )
        .create_async()
        .await;

    let entities = api(&server).list_entities().await.unwrap();
    mock.assert_async().await;

    let ids: Vec<_> = entities.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["p-1", "p-2"]);
    assert!(entities[1].snapshot.is_empty());
}

#[tokio::test]
async fn test_not_found_maps_to_not_found() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/refresh-snapshot/missing")
        .with_status(404)
        .with_body(r#"{"message": "Not found"}"#)
        .create_async()
        .await;

    let err = api(&server).refresh_snapshot("missing").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_server_error_carries_message() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/summarize/p-1")
        .with_status(500)
        .with_body(r#"{"error": "model unavailable"}"#)
        .create_async()
        .await;

    match api(&server).summarize("p-1").await {
        Err(ClientError::ApiError { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "model unavailable");
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_analyze_all_splits_entities_and_failures() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/analyze-all")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!([
                {
                    "id": "p-1",
                    "title": "Tech",
                    "tickers": ["AAPL"],
                    "analysis": {"per_ticker": {"AAPL": {"suggestion": "Buy"}}, "summary": "ok"}
                },
                {"id": "p-2", "error": "No price data"},
                {"error": "Not found"},
                {"title": "neither"}
            ])
            .to_string(),
        )
        .create_async()
        .await;

    let results = api(&server).analyze_all().await.unwrap();
    mock.assert_async().await;

    assert_eq!(results.len(), 3);
    match &results[0] {
        BatchAnalysis::Analyzed(entity) => {
            assert_eq!(entity.id, "p-1");
            assert_eq!(entity.row_suggestion(), Suggestion::Buy);
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(
        results[1],
        BatchAnalysis::Failed {
            id: Some("p-2".to_string()),
            error: "No price data".to_string(),
        }
    );
    assert_eq!(results[2].id(), None);
}

#[tokio::test]
async fn test_refresh_snapshot_parses_body() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/refresh-snapshot/p-1")
        .with_status(200)
        .with_body(
            json!({
                "snapshot": {"AAPL": {"current": 191.5, "pct": 1.2}},
                "updatedAt": "2024-05-01T12:00:00Z"
            })
            .to_string(),
        )
        .create_async()
        .await;

    let refresh = api(&server).refresh_snapshot("p-1").await.unwrap();
    assert_eq!(refresh.snapshot["AAPL"].current, Some(191.5));
    assert!(refresh.updated_at.is_some());
}

#[tokio::test]
async fn test_create_posts_draft() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/stocks")
        .match_body(Matcher::PartialJson(json!({
            "title": "Tech",
            "tickers": ["AAPL", "MSFT"]
        })))
        .with_status(201)
        .with_body(json!({"id": "new-1", "title": "Tech", "tickers": ["AAPL", "MSFT"]}).to_string())
        .create_async()
        .await;

    let draft = EntityDraft::new("Tech", vec!["aapl".into(), "msft".into()])
        .prepare()
        .unwrap();
    let created = api(&server).create_entity(&draft).await.unwrap();

    mock.assert_async().await;
    assert_eq!(created.id, "new-1");
    assert_eq!(created.tickers, vec!["AAPL", "MSFT"]);
}

#[tokio::test]
async fn test_reorder_sends_order_body() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/stocks/reorder")
        .match_body(Matcher::Json(json!({"order": ["b", "a"]})))
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    api(&server)
        .reorder_entities(&["b".to_string(), "a".to_string()])
        .await
        .unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_delete_entity() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("DELETE", "/api/stocks/p-1")
        .with_status(204)
        .create_async()
        .await;

    api(&server).delete_entity("p-1").await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_fetch_chart_sends_query() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/chart")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("ticker".into(), "AAPL".into()),
            Matcher::UrlEncoded("period".into(), "6mo".into()),
            Matcher::UrlEncoded("interval".into(), "1d".into()),
        ]))
        .with_status(200)
        .with_body(
            json!({
                "timestamps": [1714521600, "2024-05-02", 1714694400000i64],
                "closes": [1.0, 2.0, 3.0]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let series = api(&server)
        .fetch_chart(&SeriesKey::daily("aapl"))
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(series.len(), 3);
    assert_eq!(series.timestamps()[0], 1_714_521_600_000);
    assert_eq!(series.timestamps()[1], 1_714_608_000_000);
    assert_eq!(series.last_close(), Some(3.0));
}

#[tokio::test]
async fn test_chart_length_mismatch_is_parse_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/chart")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"timestamps": [1, 2], "closes": [1.0]}"#)
        .create_async()
        .await;

    let err = api(&server)
        .fetch_chart(&SeriesKey::daily("AAPL"))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::ParseError(_)));
}

#[tokio::test]
async fn test_analysis_stream_decodes_events() {
    let mut server = mockito::Server::new_async().await;
    let body = concat!(
        ": keep-alive\n\n",
        "data: {\"type\":\"start\",\"id\":\"p-1\",\"tickers\":[\"AAPL\"]}\n\n",
        "data: not json\n\n",
        "data: {\"type\":\"ticker-done\",\"ticker\":\"AAPL\",\"suggestion\":\"Buy\",\"current\":190.0,\"pct\":2.5}\r\n\r\n",
        "data: {\"type\":\"done\",\"id\":\"p-1\"}\n\n",
    );
    server
        .mock("GET", "/api/analyze-stream/p-1")
        .match_header("accept", "text/event-stream")
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(body)
        .create_async()
        .await;

    let stream = api(&server).open_analysis_stream("p-1").await.unwrap();
    let items: Vec<_> = stream.collect().await;
    assert_eq!(items.len(), 4);

    assert!(matches!(items[0], Ok(AnalysisEvent::Start { .. })));
    assert!(matches!(items[1], Err(ClientError::ParseError(_))));
    match &items[2] {
        Ok(AnalysisEvent::TickerDone {
            ticker,
            suggestion,
            current,
            ..
        }) => {
            assert_eq!(ticker, "AAPL");
            assert_eq!(*suggestion, Suggestion::Buy);
            assert_eq!(*current, Some(190.0));
        }
        other => panic!("unexpected item: {:?}", other),
    }
    assert!(matches!(items[3], Ok(AnalysisEvent::Done { .. })));
}

#[tokio::test]
async fn test_analysis_stream_open_failure() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/analyze-stream/p-1")
        .with_status(503)
        .create_async()
        .await;

    let result = api(&server).open_analysis_stream("p-1").await;
    match result {
        Err(err) => assert!(err.is_transport()),
        Ok(_) => panic!("stream should not open"),
    }
}

use super::*;
use axum::body::to_bytes;

#[test]
fn parses_query_request_keys() {
    let upper: QueryRequest = parse_json(br#"{"Content": "hi"}"#).expect("should parse");
    let lower: QueryRequest = parse_json(br#"{"content": "hi"}"#).expect("should parse");

    assert_eq!(upper.content, "hi");
    assert_eq!(lower.content, "hi");
}

#[test]
fn parses_add_request() {
    let request: AddRequest =
        parse_json(br#"{"Documents": [{"Text": "a"}, {"text": "b"}]}"#).expect("should parse");

    assert_eq!(
        request.documents,
        vec![Document::new("a"), Document::new("b")]
    );
}

#[test]
fn missing_fields_are_malformed() {
    let query = parse_json::<QueryRequest>(b"{}").expect_err("should fail");
    assert!(matches!(query, RagError::MalformedRequest(_)));

    let add = parse_json::<AddRequest>(b"{}").expect_err("should fail");
    assert!(matches!(add, RagError::MalformedRequest(_)));
}

#[test]
fn invalid_json_is_malformed() {
    let err = parse_json::<QueryRequest>(b"{not json").expect_err("should fail");
    assert!(matches!(err, RagError::MalformedRequest(_)));
}

#[tokio::test]
async fn request_scope_returns_operation_result() {
    let result = with_request_scope(Duration::from_secs(5), |cancel| async move {
        assert!(!cancel.is_cancelled());
        Ok(7)
    })
    .await;

    assert_eq!(result.expect("should succeed"), 7);
}

#[tokio::test]
async fn request_scope_times_out_and_cancels() {
    let observed = CancellationToken::new();
    let observer = observed.clone();

    let result: Result<()> = with_request_scope(Duration::from_millis(20), |cancel| async move {
        let watcher = cancel.clone();
        tokio::spawn(async move {
            watcher.cancelled().await;
            observer.cancel();
        });
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(())
    })
    .await;

    assert!(matches!(result, Err(RagError::TimedOut(_))));
    tokio::time::timeout(Duration::from_secs(5), observed.cancelled())
        .await
        .expect("request token should be cancelled on timeout");
}

#[tokio::test]
async fn dropping_request_scope_cancels_token() {
    let (token_tx, token_rx) = tokio::sync::oneshot::channel();

    let handle = tokio::spawn(with_request_scope(
        Duration::from_secs(3600),
        |cancel| async move {
            let _ = token_tx.send(cancel);
            std::future::pending::<Result<()>>().await
        },
    ));

    let token = token_rx.await.expect("operation should hand out its token");
    assert!(!token.is_cancelled());

    handle.abort();
    assert!(handle.await.expect_err("task was aborted").is_cancelled());

    tokio::time::timeout(Duration::from_secs(5), token.cancelled())
        .await
        .expect("token should be cancelled when the request is dropped");
}

#[tokio::test]
async fn error_response_uses_status_and_message() {
    let response = RagError::MalformedRequest("bad body".to_string()).into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    assert_eq!(body, "Malformed request: bad body");

    let response = RagError::Generation("connection refused".to_string()).into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    assert_eq!(body, "generative model error");
}

#[tokio::test]
async fn timeout_maps_to_gateway_timeout() {
    let response = RagError::TimedOut(Duration::from_secs(1)).into_response();
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
}

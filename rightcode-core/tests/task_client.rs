mod support;

use axum::http::StatusCode;
use futures::StreamExt;
use rightcode_core::model::{Language, TaskEvent};
use rightcode_core::{TaskError, TaskService};
use serde_json::json;

use support::{FakeBackend, Script, frames};

#[tokio::test]
async fn submit_scan_uploads_multipart_and_returns_task_id() -> anyhow::Result<()> {
    let backend = FakeBackend::spawn(Script {
        scan_submission: json!({ "task_id": "abc", "status": "processing" }),
        ..Default::default()
    })
    .await?;
    let client = backend.client()?;

    let submitted = client
        .submit_scan(Language::Python, "T1", vec![0xff, 0xd8, 0xff, 0xe0])
        .await?;

    assert_eq!(submitted.task_id, "abc");
    assert_eq!(submitted.response.status, "processing");

    backend.recorded(|r| {
        assert_eq!(r.scan_uploads.len(), 1);
        let fields = &r.scan_uploads[0];
        let field = |name: &str| {
            fields
                .iter()
                .find(|f| f.name == name)
                .unwrap_or_else(|| panic!("missing field {name}"))
        };

        assert_eq!(field("title").text(), "T1");
        assert_eq!(field("language").text(), "python");
        let drawing = field("drawing");
        assert_eq!(drawing.file_name.as_deref(), Some("drawing"));
        assert_eq!(drawing.content_type.as_deref(), Some("image/jpeg"));
        assert_eq!(drawing.data, vec![0xff, 0xd8, 0xff, 0xe0]);
    });
    Ok(())
}

#[tokio::test]
async fn scan_submission_error_field_is_server_reported() -> anyhow::Result<()> {
    let backend = FakeBackend::spawn(Script {
        scan_submission: json!({ "status": "error", "error": "OCR model not loaded" }),
        ..Default::default()
    })
    .await?;

    let err = backend
        .client()?
        .submit_scan(Language::Python, "T1", vec![1])
        .await
        .unwrap_err();

    assert!(matches!(err, TaskError::ServerReported(ref m) if m == "OCR model not loaded"));
    Ok(())
}

#[tokio::test]
async fn scan_submission_needs_processing_status_and_task_id() -> anyhow::Result<()> {
    let not_processing = FakeBackend::spawn(Script {
        scan_submission: json!({ "task_id": "abc", "status": "completed", "result": "x" }),
        ..Default::default()
    })
    .await?;
    assert!(matches!(
        not_processing
            .client()?
            .submit_scan(Language::Java, "T1", vec![1])
            .await,
        Err(TaskError::Protocol(_))
    ));

    let missing_id = FakeBackend::spawn(Script {
        scan_submission: json!({ "status": "processing" }),
        ..Default::default()
    })
    .await?;
    assert!(matches!(
        missing_id
            .client()?
            .submit_scan(Language::Java, "T1", vec![1])
            .await,
        Err(TaskError::Protocol(_))
    ));
    Ok(())
}

#[tokio::test]
async fn scan_submission_with_wrong_shape_is_decode_error() -> anyhow::Result<()> {
    let backend = FakeBackend::spawn(Script {
        scan_submission: json!({ "task": "abc" }),
        ..Default::default()
    })
    .await?;

    assert!(matches!(
        backend
            .client()?
            .submit_scan(Language::Python, "T1", vec![1])
            .await,
        Err(TaskError::Decode(_))
    ));
    Ok(())
}

#[tokio::test]
async fn scan_stream_reassembles_lines_and_skips_bad_frames() -> anyhow::Result<()> {
    let chunks = vec![
        ": keepalive\n\n".to_string(),
        "data: {\"status\":\"pending\",\"task_id\":\"abc\",\"result\":null}\n\ndata: {\"status\":\"proc".to_string(),
        "essing\",\"task_id\":\"abc\",\"result\":{\"status\":\"Processing image...\"}}\n\n".to_string(),
        "data: {\"status\":\"processing\",\"task_id\":\n\n".to_string(),
        "data: {\"status\":\"completed\",\"task_id\":\"abc\",\"result\":{\"result\":\"print('hi')\"}}\r\n\r\n".to_string(),
    ];
    let backend = FakeBackend::spawn(Script::default().stream("ocr/abc", chunks)).await?;
    let client = backend.client()?;

    let events: Vec<_> = client
        .stream_scan("abc")
        .await?
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .collect::<Result<_, _>>()?;

    let statuses: Vec<&str> = events.iter().map(|e| e.status.as_str()).collect();
    assert_eq!(statuses, ["pending", "processing", "completed"]);
    assert!(events[2].is_terminal());
    assert_eq!(events[2].recognized_text(), Some("print('hi')"));

    backend.recorded(|r| {
        assert_eq!(
            r.stream_requests,
            vec![("ocr/abc".to_string(), Some("text/event-stream".to_string()))]
        );
    });
    Ok(())
}

#[tokio::test]
async fn frame_with_invalid_utf8_is_skipped() -> anyhow::Result<()> {
    let mut garbled =
        b"data: {\"status\":\"processing\",\"task_id\":\"abc\",\"result\":\"".to_vec();
    garbled.extend_from_slice(&[0xff, 0xfe]);
    garbled.extend_from_slice(b"\"}\n\n");

    let chunks = vec![
        b"data: {\"status\":\"pending\",\"task_id\":\"abc\"}\n\n".to_vec(),
        garbled,
        b"data: {\"status\":\"completed\",\"task_id\":\"abc\",\"result\":{\"result\":\"x = 1\"}}\n\n".to_vec(),
    ];
    let backend = FakeBackend::spawn(Script::default().stream("ocr/abc", chunks)).await?;

    let events: Vec<_> = backend
        .client()?
        .stream_scan("abc")
        .await?
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .collect::<Result<_, _>>()?;

    let statuses: Vec<&str> = events.iter().map(|e| e.status.as_str()).collect();
    assert_eq!(statuses, ["pending", "completed"]);
    assert_eq!(events[1].recognized_text(), Some("x = 1"));
    Ok(())
}

#[tokio::test]
async fn stream_handshake_failure_is_network_error() -> anyhow::Result<()> {
    let backend = FakeBackend::spawn(Script::default()).await?;
    let client = backend.client()?;

    assert!(matches!(
        client.stream_scan("missing").await,
        Err(TaskError::Network(_))
    ));
    assert!(matches!(
        client.stream_execution("missing").await,
        Err(TaskError::Network(_))
    ));
    Ok(())
}

#[tokio::test]
async fn execution_submission_posts_code_and_accepts_queued() -> anyhow::Result<()> {
    let backend = FakeBackend::spawn(Script {
        execution_submission: json!({ "task_id": "xyz", "status": "queued" }),
        ..Default::default()
    })
    .await?;

    let submitted = backend
        .client()?
        .submit_execution("print('hi')", Language::Python)
        .await?;

    assert_eq!(submitted.task_id, "xyz");
    backend.recorded(|r| {
        assert_eq!(
            r.executions,
            vec![json!({ "code": "print('hi')", "language": "python" })]
        );
    });
    Ok(())
}

#[tokio::test]
async fn execution_submission_rejects_non_ok_status() -> anyhow::Result<()> {
    let accepted = FakeBackend::spawn(Script {
        execution_status: Some(StatusCode::ACCEPTED),
        execution_submission: json!({ "task_id": "xyz", "status": "queued" }),
        ..Default::default()
    })
    .await?;
    assert!(matches!(
        accepted
            .client()?
            .submit_execution("1", Language::Python)
            .await,
        Err(TaskError::Protocol(_))
    ));

    let failing = FakeBackend::spawn(Script {
        execution_status: Some(StatusCode::INTERNAL_SERVER_ERROR),
        execution_submission: json!({ "detail": "boom" }),
        ..Default::default()
    })
    .await?;
    assert!(matches!(
        failing
            .client()?
            .submit_execution("1", Language::Python)
            .await,
        Err(TaskError::Network(_))
    ));
    Ok(())
}

#[tokio::test]
async fn execution_stream_delivers_result() -> anyhow::Result<()> {
    let backend = FakeBackend::spawn(Script::default().stream(
        "execute/xyz",
        frames(&[
            json!({ "status": "pending", "task_id": "xyz" }),
            json!({
                "status": "success",
                "task_id": "xyz",
                "result": { "success": true, "output": "hi\n", "exit_code": 0 }
            }),
        ]),
    ))
    .await?;
    let client = backend.client()?;

    let mut seen = Vec::new();
    let delivered = client
        .stream_execution_with("xyz", |event| seen.push(event))
        .await?;

    assert_eq!(delivered, 2);
    let result = seen[1].result.as_ref().expect("terminal event has a result");
    assert!(result.success);
    assert_eq!(result.stdout.as_deref(), Some("hi\n"));
    assert_eq!(result.exit_code, Some(0));
    Ok(())
}

#[tokio::test]
async fn dropping_a_stream_early_is_fine() -> anyhow::Result<()> {
    let backend = FakeBackend::spawn(Script::default().stream(
        "ocr/abc",
        frames(&[
            json!({ "status": "processing", "task_id": "abc" }),
            json!({ "status": "processing", "task_id": "abc" }),
        ]),
    ))
    .await?;
    let client = backend.client()?;

    let mut events = client.stream_scan("abc").await?;
    let first = events.next().await.expect("one event")?;
    assert_eq!(first.task_id, "abc");
    drop(events);

    // The client stays usable after a stream is abandoned.
    client.cancel_task("abc").await?;
    backend.recorded(|r| assert_eq!(r.cancelled, vec!["abc".to_string()]));
    Ok(())
}

#[tokio::test]
async fn polling_cancel_and_health_endpoints() -> anyhow::Result<()> {
    let backend = FakeBackend::spawn(Script {
        scan_poll: json!({
            "task_id": "abc",
            "status": "completed",
            "result": "print('hi')",
            "cached": true,
            "execution_time": 1.5
        }),
        execution_poll: Some(json!({
            "status": "success",
            "task_id": "xyz",
            "result": { "success": false, "errors": "Import 'os' is not allowed", "stage": "security_check" }
        })),
        health: json!({
            "status": "healthy",
            "timestamp": 1_700_000_000.0,
            "device": "cpu",
            "celery_workers": 2,
            "model_loaded": true
        }),
        ..Default::default()
    })
    .await?;
    let client = backend.client()?;

    let scan = client.poll_scan("abc").await?;
    assert_eq!(scan.result.as_deref(), Some("print('hi')"));
    assert_eq!(scan.cached, Some(true));

    let execution = client.poll_execution("xyz").await?;
    let result = execution.result.expect("result present");
    assert!(!result.success);
    assert_eq!(result.display_output(), Some("Import 'os' is not allowed"));

    let health = client.health().await?;
    assert!(health.is_healthy());
    assert_eq!(health.celery_workers, Some(2));

    client.cancel_task("abc").await?;
    backend.recorded(|r| assert_eq!(r.cancelled, vec!["abc".to_string()]));
    Ok(())
}

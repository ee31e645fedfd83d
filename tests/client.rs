//! Integration tests for `Doc2xClient` against a scripted in-memory transport.
//!
//! `MockTransport` replays queued responses and records every request, so the
//! tests can assert both outcomes and the exact number of network calls.

use async_trait::async_trait;
use edgequake_doc2x::{
    ClientConfig, ConvertStatus, Credential, Doc2xClient, Doc2xError, ExportFormat, HttpRequest,
    HttpResponse, JobState, JobUid, Method, RequestBody, Transport,
};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

#[derive(Default)]
struct MockTransport {
    responses: Mutex<VecDeque<Result<HttpResponse, Doc2xError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    fn with(responses: Vec<HttpResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().map(Ok).collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn request(&self, i: usize) -> HttpRequest {
        self.requests.lock().unwrap()[i].clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, Doc2xError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(HttpResponse::new(500, "mock exhausted")))
    }
}

const STAGED_AT: u64 = 1024;
const CEILING: u64 = 4096;

fn client(mock: &Arc<MockTransport>) -> Doc2xClient {
    let config = ClientConfig::builder()
        .base_url("http://mock.local/api")
        .staged_threshold_bytes(STAGED_AT)
        .max_file_bytes(CEILING)
        .max_retries(2)
        .retry_backoff_ms(0)
        .build()
        .expect("valid config");
    Doc2xClient::with_transport(Credential::new("test-key"), config, mock.clone())
}

fn fixture(dir: &tempfile::TempDir, name: &str, size: u64) -> PathBuf {
    let path = dir.path().join(name);
    let mut data = b"%PDF-1.7\n".to_vec();
    data.resize(size as usize, b'x');
    std::fs::write(&path, data).unwrap();
    path
}

fn ok(body: &str) -> HttpResponse {
    HttpResponse::new(200, body)
}

fn preupload_ok(uid: &str) -> HttpResponse {
    ok(&format!(
        r#"{{"code":"success","data":{{"url":"https://bucket.s3.local/","form":{{"key":"tmp/{uid}","policy":"p","x-amz-meta-uid":"{uid}"}}}}}}"#
    ))
}

// ── Upload: direct path ──────────────────────────────────────────────────────

#[tokio::test]
async fn small_file_uses_direct_upload() {
    let dir = tempfile::tempdir().unwrap();
    let path = fixture(&dir, "small.pdf", 100);
    let mock = MockTransport::with(vec![ok(r#"{"code":"success","data":{"uid":"u-direct"}}"#)]);

    let uid = client(&mock).upload(&path, true).await.unwrap();

    assert_eq!(uid.as_str(), "u-direct");
    assert_eq!(mock.calls(), 1);
    let req = mock.request(0);
    assert_eq!(req.method, Method::Post);
    assert_eq!(req.url, "http://mock.local/api/v2/parse/pdf");
    assert_eq!(req.bearer.as_deref(), Some("test-key"));
    assert_eq!(req.query, vec![("ocr".to_string(), "true".to_string())]);
    match req.body {
        RequestBody::Bytes { content_type, data } => {
            assert_eq!(content_type, "application/pdf");
            assert_eq!(data.len(), 100);
        }
        other => panic!("expected raw bytes, got {other:?}"),
    }
}

#[tokio::test]
async fn direct_upload_retries_rate_limit() {
    let dir = tempfile::tempdir().unwrap();
    let path = fixture(&dir, "small.pdf", 10);
    let mock = MockTransport::with(vec![
        HttpResponse::new(429, "too many requests"),
        ok(r#"{"code":"success","data":{"uid":"u-2"}}"#),
    ]);

    let uid = client(&mock).upload(&path, false).await.unwrap();

    assert_eq!(uid.as_str(), "u-2");
    assert_eq!(mock.calls(), 2);

    // Both attempts send the same buffer rather than a fresh copy.
    let buffer = |i: usize| match mock.request(i).body {
        RequestBody::Bytes { data, .. } => data,
        other => panic!("expected raw bytes, got {other:?}"),
    };
    let (first, second) = (buffer(0), buffer(1));
    assert_eq!(first.len(), 10);
    assert_eq!(first.as_ptr(), second.as_ptr());
}

#[tokio::test]
async fn rate_limit_exhausts_budget() {
    let dir = tempfile::tempdir().unwrap();
    let path = fixture(&dir, "small.pdf", 10);
    let mock = MockTransport::with(vec![
        HttpResponse::new(429, "slow"),
        HttpResponse::new(429, "slow"),
        HttpResponse::new(429, "slow"),
    ]);

    let err = client(&mock).upload(&path, true).await.unwrap_err();

    assert_eq!(mock.calls(), 3, "first attempt + 2 retries");
    match err {
        Doc2xError::RetryExhausted { attempts, last, .. } => {
            assert_eq!(attempts, 3);
            assert!(last.is_rate_limit());
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[tokio::test]
async fn business_code_in_success_envelope_is_not_retried() {
    let dir = tempfile::tempdir().unwrap();
    let path = fixture(&dir, "small.pdf", 10);
    let mock = MockTransport::with(vec![ok(r#"{"code":"parse_quota_limit","data":{}}"#)]);

    let err = client(&mock).upload(&path, true).await.unwrap_err();

    assert!(matches!(err, Doc2xError::Business { ref code, .. } if code == "parse_quota_limit"));
    assert_eq!(mock.calls(), 1);
}

#[tokio::test]
async fn bad_request_is_not_retried() {
    let dir = tempfile::tempdir().unwrap();
    let path = fixture(&dir, "small.pdf", 10);
    let mock = MockTransport::with(vec![HttpResponse::new(400, "bad file")]);

    let err = client(&mock).upload(&path, true).await.unwrap_err();

    assert!(matches!(err, Doc2xError::BadRequest { .. }));
    assert_eq!(mock.calls(), 1);
}

// ── Upload: staged path and input errors ─────────────────────────────────────

#[tokio::test]
async fn large_file_uses_staged_upload_only() {
    let dir = tempfile::tempdir().unwrap();
    let path = fixture(&dir, "a_rather_long_file_name_for_testing.pdf", STAGED_AT);
    let mock = MockTransport::with(vec![preupload_ok("u-staged"), HttpResponse::new(204, "")]);

    let uid = client(&mock).upload(&path, true).await.unwrap();

    assert_eq!(uid.as_str(), "u-staged");
    assert_eq!(mock.calls(), 2);

    let pre = mock.request(0);
    assert_eq!(pre.url, "http://mock.local/api/v2/parse/preupload");
    match pre.body {
        RequestBody::Json(v) => {
            assert_eq!(v["file_name"], "a_rather_long_file_n");
            assert_eq!(v["ocr"], true);
        }
        other => panic!("expected JSON, got {other:?}"),
    }

    let put = mock.request(1);
    assert_eq!(put.url, "https://bucket.s3.local/");
    assert!(put.bearer.is_none(), "pre-signed upload carries no token");
    match put.body {
        RequestBody::Multipart { fields, len, .. } => {
            assert_eq!(len, STAGED_AT);
            assert!(fields.contains(&("x-amz-meta-uid".to_string(), "u-staged".to_string())));
        }
        other => panic!("expected multipart, got {other:?}"),
    }

    // No direct-path call was attempted.
    for i in 0..mock.calls() {
        assert!(!mock.request(i).url.ends_with("v2/parse/pdf"));
    }
}

#[tokio::test]
async fn staged_upload_without_204_discards_uid() {
    let dir = tempfile::tempdir().unwrap();
    let path = fixture(&dir, "big.pdf", STAGED_AT + 1);
    let mock = MockTransport::with(vec![
        preupload_ok("u-bad"),
        HttpResponse::new(403, "<Error>AccessDenied</Error>"),
    ]);

    let err = client(&mock).upload(&path, true).await.unwrap_err();

    match err {
        Doc2xError::StagedUploadRejected { uid, status, .. } => {
            assert_eq!(uid, "u-bad");
            assert_eq!(status, 403);
        }
        other => panic!("unexpected: {other:?}"),
    }
    assert_eq!(mock.calls(), 2);
}

#[tokio::test]
async fn file_at_ceiling_is_rejected_without_network() {
    let dir = tempfile::tempdir().unwrap();
    let path = fixture(&dir, "huge.pdf", CEILING);
    let mock = MockTransport::with(vec![]);

    let err = client(&mock).upload(&path, true).await.unwrap_err();

    assert!(matches!(err, Doc2xError::FileTooLarge { .. }));
    assert!(err.is_input_error());
    assert_eq!(mock.calls(), 0);
}

#[tokio::test]
async fn missing_file_is_rejected_without_network() {
    let mock = MockTransport::with(vec![]);

    let err = client(&mock)
        .upload("/no/such/dir/missing.pdf", true)
        .await
        .unwrap_err();

    assert!(matches!(err, Doc2xError::FileNotFound { .. }));
    assert_eq!(mock.calls(), 0);
}

// ── Status polling ───────────────────────────────────────────────────────────

#[tokio::test]
async fn status_processing_then_success() {
    let mock = MockTransport::with(vec![
        ok(r#"{"code":"success","data":{"status":"processing","progress":35}}"#),
        ok(r#"{"code":"success","data":{"status":"success","progress":60,"result":{"pages":[
            {"md":"Euler: \\(e^{i\\pi}+1=0\\)","url":"https://cdn/p0.jpg","page_idx":0,"page_width":800,"page_height":1200},
            {"md":"\\[x\\]","page_idx":1}
        ]}}}"#),
    ]);
    let client = client(&mock);
    let uid = JobUid::new("u-1");

    let first = client.parse_status(&uid, true).await.unwrap();
    assert_eq!(first.progress, 35);
    assert_eq!(first.label, "Processing file");
    assert!(first.texts.is_empty());

    let done = client.parse_status(&uid, true).await.unwrap();
    assert_eq!(done.progress, 100);
    assert_eq!(done.state, JobState::Success);
    assert_eq!(done.texts, vec!["Euler: $e^{i\\pi}+1=0$", "$$x$$"]);
    assert_eq!(done.locations[0].page_width, 800);
    assert_eq!(done.locations[1].url, "");

    let req = mock.request(0);
    assert_eq!(req.method, Method::Get);
    assert_eq!(req.url, "http://mock.local/api/v2/parse/status");
    assert_eq!(req.query, vec![("uid".to_string(), "u-1".to_string())]);
}

#[tokio::test]
async fn status_failed_raises_once() {
    let mock = MockTransport::with(vec![ok(
        r#"{"code":"success","data":{"status":"failed","detail":"bad pdf"}}"#,
    )]);

    let err = client(&mock)
        .parse_status(&JobUid::new("u-f"), false)
        .await
        .unwrap_err();

    assert!(matches!(err, Doc2xError::ParseFailed { .. }));
    assert_eq!(mock.calls(), 1, "terminal failure is not retried");
}

#[tokio::test]
async fn status_invalid_json_is_retried() {
    let mock = MockTransport::with(vec![
        ok("<html>gateway</html>"),
        HttpResponse::new(503, "unavailable"),
        ok(r#"{"code":"success","data":{"status":"processing","progress":1}}"#),
    ]);

    let snap = client(&mock)
        .parse_status(&JobUid::new("u-r"), false)
        .await
        .unwrap();

    assert_eq!(snap.progress, 1);
    assert_eq!(mock.calls(), 3);
}

#[tokio::test]
async fn status_rate_limit_is_retried() {
    let mock = MockTransport::with(vec![
        HttpResponse::new(429, "slow"),
        ok(r#"{"code":"success","data":{"status":"success"}}"#),
    ]);

    let snap = client(&mock)
        .parse_status(&JobUid::new("u-s"), false)
        .await
        .unwrap();

    assert!(snap.is_done());
    assert!(snap.texts.is_empty());
    assert_eq!(mock.calls(), 2);
}

// ── Conversion ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn unsupported_format_makes_no_call() {
    let mock = MockTransport::with(vec![]);

    let err = client(&mock)
        .convert(&JobUid::new("u-1"), "pdf", None)
        .await
        .unwrap_err();

    assert!(matches!(err, Doc2xError::UnsupportedFormat(ref f) if f == "pdf"));
    assert_eq!(mock.calls(), 0);
}

#[tokio::test]
async fn convert_then_fetch_result() {
    let mock = MockTransport::with(vec![
        ok(r#"{"code":"success","data":{"status":"processing","url":""}}"#),
        ok(r#"{"code":"success","data":{"status":"success","url":"https://cdn/u-1.zip"}}"#),
    ]);
    let client = client(&mock);
    let uid = JobUid::new("u-1");

    let submitted = client.convert(&uid, "md", Some("paper")).await.unwrap();
    assert_eq!(submitted, ConvertStatus::Processing);

    let result = client.convert_result(&uid).await.unwrap();
    assert_eq!(result.url(), "https://cdn/u-1.zip");

    let req = mock.request(0);
    assert_eq!(req.url, "http://mock.local/api/v2/convert/parse");
    match req.body {
        RequestBody::Json(v) => {
            assert_eq!(v["uid"], "u-1");
            assert_eq!(v["to"], "md");
            assert_eq!(v["filename"], "paper");
        }
        other => panic!("expected JSON, got {other:?}"),
    }
    let req = mock.request(1);
    assert_eq!(req.url, "http://mock.local/api/v2/convert/parse/result");
    assert_eq!(req.query, vec![("uid".to_string(), "u-1".to_string())]);
}

#[tokio::test]
async fn docx_ignores_filename() {
    let mock = MockTransport::with(vec![ok(
        r#"{"code":"success","data":{"status":"processing"}}"#,
    )]);

    client(&mock)
        .convert_to(&JobUid::new("u-1"), ExportFormat::Docx, Some("paper"))
        .await
        .unwrap();

    match mock.request(0).body {
        RequestBody::Json(v) => assert!(v.get("filename").is_none()),
        other => panic!("expected JSON, got {other:?}"),
    }
}

#[tokio::test]
async fn conversion_failure_is_terminal() {
    let mock = MockTransport::with(vec![ok(
        r#"{"code":"success","data":{"status":"failed"}}"#,
    )]);

    let err = client(&mock)
        .convert_result(&JobUid::new("u-9"))
        .await
        .unwrap_err();

    assert!(matches!(err, Doc2xError::ConversionFailed { ref uid, .. } if uid == "u-9"));
    assert_eq!(mock.calls(), 1);
}

#[tokio::test]
async fn concurrent_polls_share_one_client() {
    let mock = MockTransport::with(vec![
        ok(r#"{"code":"success","data":{"status":"processing","progress":10}}"#),
        ok(r#"{"code":"success","data":{"status":"processing","progress":10}}"#),
    ]);
    let client = client(&mock);
    let (a, b) = (client.clone(), client.clone());

    let (ra, rb) = tokio::join!(
        async move { a.parse_status(&JobUid::new("u-a"), false).await },
        async move { b.parse_status(&JobUid::new("u-b"), false).await },
    );

    assert_eq!(ra.unwrap().progress, 10);
    assert_eq!(rb.unwrap().progress, 10);
    assert_eq!(mock.calls(), 2);
}

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use mq_app::{AppConfig, AppError, Gallery, JobEvent, JobOrchestrator, JobState, RemoteJobClient, SubmitRequest};
use mq_app::client::schemas::GenerationParams;
use mq_core::{MaskEditor, MaskRaster, PAINTED, RasterPoint, UNTOUCHED};
use serde_json::{Value, json};

const RESULT_BYTES: &[u8] = b"\x89PNG fake result";

#[derive(Default)]
struct FakeService {
    submitted: Mutex<Option<Value>>,
    queries: AtomicUsize,
    stops: AtomicUsize,
    never_finish: AtomicBool,
    stop_fails: AtomicBool,
}

async fn ping() -> &'static str {
    "pong"
}

async fn job_queue() -> Json<Value> {
    Json(json!({ "running_size": 0, "finished_size": 3, "last_job_id": "older" }))
}

async fn job_history() -> Json<Value> {
    Json(json!({ "queue": [{ "job_id": "job-e2e", "is_finished": false }], "history": [] }))
}

async fn submit(State(fake): State<Arc<FakeService>>, Json(body): Json<Value>) -> Json<Value> {
    *fake.submitted.lock().unwrap() = Some(body);
    Json(json!({ "job_id": "job-e2e" }))
}

async fn query_job(
    State(fake): State<Arc<FakeService>>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let n = fake.queries.fetch_add(1, Ordering::SeqCst);
    let job_id = params.get("job_id").cloned().unwrap_or_default();
    if n == 0 || fake.never_finish.load(Ordering::SeqCst) {
        return Json(json!({
            "job_id": job_id,
            "job_stage": "RUNNING",
            "job_progress": 50,
            "job_status": null,
        }));
    }
    // The service reports results under its own loopback origin.
    Json(json!({
        "job_id": job_id,
        "job_stage": "SUCCESS",
        "job_progress": 100,
        "job_status": "Finished",
        "job_result": [{ "url": "http://127.0.0.1:8888/files/r.png", "seed": "1" }],
    }))
}

async fn stop(State(fake): State<Arc<FakeService>>) -> impl IntoResponse {
    fake.stops.fetch_add(1, Ordering::SeqCst);
    if fake.stop_fails.load(Ordering::SeqCst) {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    }
}

async fn result_file() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "image/png")], RESULT_BYTES)
}

async fn spawn_fake(fake: Arc<FakeService>) -> String {
    let app = Router::new()
        .route("/ping", get(ping))
        .route("/v1/generation/job-queue", get(job_queue))
        .route("/v1/generation/job-history", get(job_history))
        .route("/v1/generation/query-job", get(query_job))
        .route("/v1/generation/stop", post(stop))
        .route("/v2/generation/image-inpaint-outpaint", post(submit))
        .route("/files/r.png", get(result_file))
        .with_state(fake);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn config(base_url: &str) -> AppConfig {
    AppConfig {
        api_url: base_url.to_string(),
        request_timeout: Duration::from_secs(5),
        poll_interval: Duration::from_millis(50),
        ..Default::default()
    }
}

fn request(mask: String) -> SubmitRequest {
    SubmitRequest {
        image: "SU1H".into(),
        mask: Some(mask),
        prompt: "x".into(),
        negative_prompt: String::new(),
        params: GenerationParams::default(),
    }
}

#[tokio::test]
async fn test_paint_submit_poll_materialize() {
    let fake = Arc::new(FakeService::default());
    let base_url = spawn_fake(fake.clone()).await;
    let conf = config(&base_url);

    let mut editor = MaskEditor::initialize(800, 600).unwrap();
    editor.begin_stroke(RasterPoint::new(400.0, 300.0));
    editor.end_stroke().unwrap();

    let client = RemoteJobClient::new(&conf).unwrap();
    let mut orch = JobOrchestrator::new(client, conf.poll_interval);
    assert_eq!(orch.state(), JobState::Idle);
    orch.probe().await.unwrap();

    let job_id = orch.submit(request(editor.encode().unwrap())).await.unwrap();
    assert_eq!(job_id, "job-e2e");
    assert_eq!(orch.state(), JobState::Polling);
    assert_eq!(orch.queue_estimate().position, 1);

    let body = fake.submitted.lock().unwrap().clone().unwrap();
    assert_eq!(body["prompt"], "x");
    assert_eq!(body["input_image"], "SU1H");
    assert_eq!(body["advanced_params"]["inpaint_strength"], json!(1.0));

    let mask = MaskRaster::from_base64_png(body["input_mask"].as_str().unwrap()).unwrap();
    assert_eq!(mask.dimensions(), (800, 600));
    assert_eq!(mask.get(420, 300), Some(PAINTED));
    assert_eq!(mask.get(400, 320), Some(PAINTED));
    assert_eq!(mask.get(421, 300), Some(UNTOUCHED));
    assert_eq!(mask.get(415, 315), Some(UNTOUCHED));
    for (x, y, pixel) in mask.as_image().enumerate_pixels() {
        let (dx, dy) = (x as i64 - 400, y as i64 - 300);
        let expected = if dx * dx + dy * dy <= 400 { PAINTED } else { UNTOUCHED };
        assert_eq!(pixel.0[0], expected, "pixel ({}, {})", x, y);
    }

    let mut gallery = Gallery::in_memory();
    match orch.poll_until_settled(&mut gallery).await {
        Some(JobEvent::Finished { job_id, inserted, warning, .. }) => {
            assert_eq!(job_id, "job-e2e");
            assert!(inserted);
            assert!(warning.is_none());
        }
        other => panic!("unexpected {:?}", other),
    }

    assert_eq!(orch.state(), JobState::Finished);
    assert!(!orch.is_polling());
    assert_eq!(fake.queries.load(Ordering::SeqCst), 2);

    assert_eq!(gallery.len(), 1);
    let image = &gallery.list()[0];
    assert_eq!(image.url, format!("{}/files/r.png", base_url));
    assert_eq!(image.job_id, "job-e2e");
    assert_eq!(image.prompt, "x");
    assert_eq!(image.bytes().as_deref(), Some(RESULT_BYTES));

    tokio::time::sleep(conf.poll_interval * 4).await;
    assert_eq!(fake.queries.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_failed_stop_still_halts_polling() {
    let fake = Arc::new(FakeService::default());
    fake.never_finish.store(true, Ordering::SeqCst);
    fake.stop_fails.store(true, Ordering::SeqCst);
    let base_url = spawn_fake(fake.clone()).await;
    let conf = config(&base_url);

    let editor = MaskEditor::initialize(64, 64).unwrap();
    let mut orch = JobOrchestrator::new(RemoteJobClient::new(&conf).unwrap(), conf.poll_interval);
    orch.probe().await.unwrap();
    orch.submit(request(editor.encode().unwrap())).await.unwrap();

    let mut gallery = Gallery::in_memory();
    let epoch = orch.next_tick().await.unwrap();
    assert!(matches!(orch.on_tick(epoch, &mut gallery).await, JobEvent::Progress { .. }));

    assert!(matches!(orch.cancel().await, Err(AppError::CancellationFailed(_))));
    assert_eq!(orch.state(), JobState::Stopped);
    assert_eq!(fake.stops.load(Ordering::SeqCst), 1);

    let seen = fake.queries.load(Ordering::SeqCst);
    tokio::time::sleep(conf.poll_interval * 4).await;
    assert_eq!(orch.next_tick().await, None);
    assert_eq!(fake.queries.load(Ordering::SeqCst), seen);
    assert!(gallery.is_empty());
}

#[tokio::test]
async fn test_unreachable_service_blocks_submit() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let conf = config(&format!("http://{}", addr));
    let mut orch = JobOrchestrator::new(RemoteJobClient::new(&conf).unwrap(), conf.poll_interval);

    assert!(matches!(orch.probe().await, Err(AppError::Unreachable(_))));
    let editor = MaskEditor::initialize(8, 8).unwrap();
    assert!(matches!(
        orch.submit(request(editor.encode().unwrap())).await,
        Err(AppError::PreconditionNotMet(_))
    ));
    assert_eq!(orch.state(), JobState::Idle);
}

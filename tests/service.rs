use std::sync::Arc;
use std::time::Duration;

use actix_web::{App, http::StatusCode, test, web};
use serde_json::{Value, json};
use surface_roughness::app_state::AppState;
use surface_roughness::routes;
use surface_roughness::task::TaskStore;
use surface_roughness::utils::parser_registry::ParserRegistry;

const TWO_COLUMNS: &str = "# vtk DataFile Version 3.0\n\
    two columns\n\
    ASCII\n\
    DATASET STRUCTURED_POINTS\n\
    DIMENSIONS 2 1 4\n\
    POINT_DATA 8\n\
    SCALARS phi float 1\n\
    LOOKUP_TABLE default\n\
    5 3 0 4 7 5 0 6\n";

fn app_state(resource_dir: &std::path::Path) -> web::Data<AppState> {
    web::Data::new(AppState {
        parser_registry: Arc::new(ParserRegistry::new()),
        resource_dir: resource_dir.to_str().unwrap().to_string(),
        task_store: Arc::new(TaskStore::new()),
    })
}

fn analyze_request(file: &str, nz: usize) -> Value {
    json!({
        "file": file,
        "grid": { "nx": 2, "ny": 1, "nz": nz, "dl": 2.0 },
        "chunk_size": 1,
    })
}

#[actix_web::test]
async fn health_lists_supported_extensions() {
    let dir = tempfile::tempdir().unwrap();
    let app = test::init_service(
        App::new()
            .app_data(app_state(dir.path()))
            .configure(routes::configure),
    )
    .await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["supported_extensions"], json!(["gz", "vtk"]));
}

#[actix_web::test]
async fn rejects_bad_requests() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("example.vtk"), TWO_COLUMNS).unwrap();
    std::fs::write(dir.path().join("CHGCAR.vasp"), "x").unwrap();
    let app = test::init_service(
        App::new()
            .app_data(app_state(dir.path()))
            .configure(routes::configure),
    )
    .await;

    let cases = [
        (analyze_request("example.vtk", 3), StatusCode::BAD_REQUEST),
        (analyze_request("CHGCAR.vasp", 4), StatusCode::BAD_REQUEST),
        (analyze_request("absent.vtk", 4), StatusCode::NOT_FOUND),
        (analyze_request("../example.vtk", 4), StatusCode::BAD_REQUEST),
        (analyze_request("example.vtk", 0), StatusCode::BAD_REQUEST),
        (
            json!({
                "file": "example.vtk",
                "grid": { "nx": (1u64 << 63) + 4, "ny": 1, "nz": 2, "dl": 1.0 },
                "chunk_size": 1,
            }),
            StatusCode::BAD_REQUEST,
        ),
    ];

    for (payload, expected) in cases {
        let req = test::TestRequest::post()
            .uri("/surface/analyze")
            .set_json(&payload)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), expected, "payload {payload}");
    }
}

#[actix_web::test]
async fn unknown_task_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = test::init_service(
        App::new()
            .app_data(app_state(dir.path()))
            .configure(routes::configure),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/surface/roughness?task_id=nope")
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get()
        .uri("/surface/chunk?task_id=nope&chunk_index=0")
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn analyze_then_fetch_roughness_and_chunks() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("example.vtk"), TWO_COLUMNS).unwrap();
    let app = test::init_service(
        App::new()
            .app_data(app_state(dir.path()))
            .configure(routes::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/surface/analyze")
        .set_json(analyze_request("example.vtk", 4))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let created: Value = test::read_body_json(resp).await;
    let task_id = created["task_id"].as_str().unwrap().to_string();
    assert_eq!(created["shape"], json!([1, 2]));
    assert_eq!(created["chunks"].as_array().unwrap().len(), 2);

    // 等待后台分析完成
    let mut report = Value::Null;
    for _ in 0..250 {
        let req = test::TestRequest::get()
            .uri(&format!("/surface/roughness?task_id={task_id}"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        if resp.status() == StatusCode::OK {
            report = test::read_body_json(resp).await;
            break;
        }
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        actix_web::rt::time::sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(report["status"], "completed");
    assert_eq!(report["report"]["point_count"], 8);
    assert_eq!(report["report"]["mean"], 1.0);
    assert_eq!(report["report"]["ra"], 1.0);
    assert_eq!(report["report"]["rq"], 1.0);
    assert_eq!(report["report"]["no_crossing_columns"], 1);

    let chunk_uri = format!("/surface/chunk?task_id={task_id}&chunk_index=0");
    let resp = test::call_service(&app, test::TestRequest::get().uri(&chunk_uri).to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    assert_eq!(body.len(), 8);
    let value = f64::from_le_bytes(body[..8].try_into().unwrap());
    assert_eq!(value, 2.0);

    // 每个 chunk 只能请求一次
    let resp = test::call_service(&app, test::TestRequest::get().uri(&chunk_uri).to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

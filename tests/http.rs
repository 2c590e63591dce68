//! Router-level tests: status codes, JSON bodies and multipart upload.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::Router;
use exoviz::api::AppState;
use exoviz::config::ServerConfig;
use exoviz::predict::{Classifier, ClassifierError, FeatureMatrix};
use exoviz::server::router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

struct Constant(f64);

impl Classifier for Constant {
    fn predict_proba(&self, features: &FeatureMatrix) -> Result<Vec<f64>, ClassifierError> {
        Ok(vec![self.0; features.rows.len()])
    }
}

const BOUNDARY: &str = "exoviz-test-boundary";

fn app() -> (TempDir, Router) {
    let dir = tempfile::tempdir().unwrap();
    let static_dir = dir.path().join("static");
    std::fs::create_dir_all(&static_dir).unwrap();
    std::fs::write(static_dir.join("index.html"), "<html>viewer</html>").unwrap();

    let config = ServerConfig {
        upload_dir: dir.path().join("uploads"),
        default_dataset_file: dir.path().join("uploads").join("default.csv"),
        static_dir,
        ..ServerConfig::default()
    };
    let state = Arc::new(AppState::new(config, Arc::new(Constant(0.75))));
    (dir, router(state))
}

fn multipart(filename: &str, contents: &str) -> Request<Body> {
    let body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
         Content-Type: text/csv\r\n\r\n\
         {contents}\r\n\
         --{BOUNDARY}--\r\n"
    );
    Request::post("/api/upload")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

const CATALOG: &str = "hostname,pl_name,dist,ra,dec,stellar_temp\n\
                       Kepler-90,Kepler-90 b,855,284.4,49.3,6080\n\
                       Kepler-90,Kepler-90 c,855,284.4,49.3,6080\n\
                       TRAPPIST-1,TRAPPIST-1 e,12.4,346.6,-5.0,2566";

#[tokio::test]
async fn health_reports_ok() {
    let (_dir, app) = app();
    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn upload_then_query_over_http() {
    let (_dir, app) = app();

    let (status, body) = send(&app, multipart("kepler.csv", CATALOG)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["dataset_name"], "kepler");
    assert_eq!(body["filters"]["stellar_temp"]["min"], 2566.0);

    let (status, body) = send(&app, get("/api/config")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["current_dataset"], "kepler");
    assert_eq!(body["available_datasets"][0], "kepler");

    let (status, body) = send(&app, get("/api/data/kepler")).await;
    assert_eq!(status, StatusCode::OK);
    let systems = body.as_array().unwrap();
    assert_eq!(systems.len(), 2);
    assert_eq!(systems[0]["star_name"], "Kepler-90");
    assert_eq!(systems[0]["num_planets"], 2);
    assert!(systems[0].get("prediction").is_none());

    let (_, body) = send(&app, get("/api/data/kepler?stellar_temp=2000,3000")).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["star_name"], "TRAPPIST-1");

    let (_, body) = send(&app, get("/api/data/kepler?max_stars=1")).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn upload_errors_are_bad_requests() {
    let (_dir, app) = app();

    let (status, body) = send(&app, multipart("catalog.txt", CATALOG)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid file format");

    let (status, body) = send(&app, multipart("partial.csv", "hostname,ra\nA,1")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "Missing columns: planet_name, distance_pc, declination"
    );
}

#[tokio::test]
async fn file_field_without_filename_is_not_a_file_part() {
    let (_dir, app) = app();
    let body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"file\"\r\n\r\n\
         star_name\r\n\
         --{BOUNDARY}--\r\n"
    );
    let request = Request::post("/api/upload")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No file part");
}

#[tokio::test]
async fn unknown_resources_are_not_found() {
    let (_dir, app) = app();

    let (status, body) = send(&app, get("/api/data/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Dataset not found");

    let (status, body) = send(&app, get("/api/data/default")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "No default dataset available");

    let (status, body) = send(&app, get("/api/star_system/Nobody")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Star not found");
}

#[tokio::test]
async fn predict_without_features_is_server_error() {
    let (_dir, app) = app();
    send(&app, multipart("kepler.csv", CATALOG)).await;

    let request = Request::post("/api/predict")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"dataset": "kepler"}"#))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Prediction failed: missing feature columns: period"));

    let request = Request::post("/api/predict").body(Body::from("{not json")).unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn predict_with_empty_body_uses_active_dataset() {
    let (_dir, app) = app();
    let mut csv = String::from(
        "star_name,planet_name,distance_pc,right_ascens,declination,period,trans_duration,\
         trans_depth,planet_radius,planet_insolation,planet_temp,stellar_temp,stellar_logg,\
         stellar_radius,stellar_mass\n",
    );
    csv.push_str("A,A b,10,45,10,3,0.1,500,1.2,1,400,5000,4.4,1,1\n");
    csv.push_str("A,A c,10,45,10,9,0.2,800,2.0,1,350,5000,4.4,1,1");
    send(&app, multipart("features.csv", &csv)).await;

    let (status, body) = send(&app, Request::post("/api/predict").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["predictions"], serde_json::json!([0.75, 0.75]));
    assert_eq!(body["stats"]["std"], 0.0);

    let (_, body) = send(&app, get("/api/data/features")).await;
    assert_eq!(body[0]["prediction"], 0.75);

    let (status, body) = send(&app, get("/api/star_system/A")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["num_planets"], 2);
    assert_eq!(body["star_color"], "#ffff88");
    assert_eq!(body["planets"][1]["prediction"], 0.75);
}

#[tokio::test]
async fn other_paths_serve_static_files() {
    let (_dir, app) = app();
    let response = app.clone().oneshot(get("/index.html")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"<html>viewer</html>");
}

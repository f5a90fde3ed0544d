use plate_ocr::api;
use plate_ocr::db::SqliteRepository;
use plate_ocr::{DatFileRepository, PlateIndex, RecognitionService};
use serde_json::{json, Value};
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;
use warp::http::StatusCode;

const PLATES: &str = "\
img1.jpg 1 0 0 10 0 10 10 0 10 3 A 0.1 0.1 0.05 0.05 B 0.5 0.1 0.05 0.05 1 0.3 0.1 0.05 0.05
low.jpg 2 5 5 20 5 20 15 5 15 2 x 0.2 0.1 0.05 0.05 Y 0.1 0.1 0.05 0.05
broken.jpg 1 0 0 10
MD7193.jpg 1 100 200 180 200 180 240 100 240 2 7 55 12 9 18 D 40 12 9 18
";

fn data_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(PLATES.as_bytes()).unwrap();
    file
}

fn service(file: &NamedTempFile) -> Arc<RecognitionService> {
    let repository = DatFileRepository::open(file.path()).unwrap();
    Arc::new(RecognitionService::new(Arc::new(repository)))
}

fn body(response: &warp::http::Response<bytes::Bytes>) -> Value {
    serde_json::from_slice(response.body()).unwrap()
}

#[tokio::test]
async fn recognize_returns_plate_number() {
    let file = data_file();
    let routes = api::routes(service(&file), None);
    let response = warp::test::request()
        .method("POST")
        .path("/ocr/recognize")
        .json(&json!({"image_name": "img1.jpg"}))
        .reply(&routes)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body(&response),
        json!({"plate_number": "A1B", "image_name": "img1.jpg"})
    );
}

#[tokio::test]
async fn recognize_detailed_exposes_all_fields() {
    let file = data_file();
    let routes = api::routes(service(&file), None);
    let response = warp::test::request()
        .method("POST")
        .path("/ocr/recognize/detailed")
        .json(&json!({"image_name": "MD7193.jpg"}))
        .reply(&routes)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body(&response);
    assert_eq!(body["plate_number"], "D7");
    assert_eq!(body["num_characters"], 2);
    assert_eq!(body["num_plates_in_image"], 1);
    assert_eq!(body["is_valid"], true);
    assert_eq!(body["characters"][0]["char"], "7");
    assert_eq!(body["characters"][0]["left"], 55.0);
    assert_eq!(body["coordinates"]["top_left"], json!([100, 200]));
    assert_eq!(body["coordinates"]["bottom_right"], json!([180, 240]));
    assert_eq!(body["coordinates"]["bottom_left"], json!([100, 240]));
}

#[tokio::test]
async fn unknown_image_is_404_and_invalid_is_400() {
    let file = data_file();
    let routes = api::routes(service(&file), None);

    for path in &["/ocr/recognize", "/ocr/recognize/detailed"] {
        let missing = warp::test::request()
            .method("POST")
            .path(path)
            .json(&json!({"image_name": "nope.jpg"}))
            .reply(&routes)
            .await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let invalid = warp::test::request()
            .method("POST")
            .path(path)
            .json(&json!({"image_name": "low.jpg"}))
            .reply(&routes)
            .await;
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(&invalid)["invalid_characters"], json!(["x"]));
    }

    let malformed = warp::test::request()
        .method("POST")
        .path("/ocr/recognize")
        .json(&json!({"name": "img1.jpg"}))
        .reply(&routes)
        .await;
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn exists_ignores_validity() {
    let file = data_file();
    let routes = api::routes(service(&file), None);
    for (name, expected) in &[("low.jpg", true), ("img1.jpg", true), ("broken.jpg", false)] {
        let response = warp::test::request()
            .path(&format!("/ocr/exists/{}", name))
            .reply(&routes)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body(&response),
            json!({"image_name": name, "exists": expected})
        );
    }
}

#[tokio::test]
async fn lists_plates_with_limit() {
    let file = data_file();
    let routes = api::routes(service(&file), None);

    let response = warp::test::request()
        .path("/ocr/plates")
        .reply(&routes)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let all = body(&response);
    assert_eq!(all["total"], 3);
    assert_eq!(all["showing"], 3);
    assert_eq!(all["plates"][1]["image_name"], "low.jpg");
    assert_eq!(all["plates"][1]["plate_number"], "Yx");

    let response = warp::test::request()
        .path("/ocr/plates?limit=1")
        .reply(&routes)
        .await;
    let limited = body(&response);
    assert_eq!(limited["total"], 3);
    assert_eq!(limited["showing"], 1);
    assert_eq!(limited["plates"][0]["image_name"], "img1.jpg");

    let response = warp::test::request()
        .path("/ocr/plates?limit=0")
        .reply(&routes)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn image_redirects_to_hosted_copy() {
    let file = data_file();
    let routes = api::routes(
        service(&file),
        Some("https://cdn.example.com/plates/".to_string()),
    );
    let response = warp::test::request()
        .path("/ocr/image/MD7193.jpg")
        .reply(&routes)
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers()["location"],
        "https://cdn.example.com/plates/MD7193.jpg"
    );

    let response = warp::test::request()
        .path("/ocr/image/nope.jpg")
        .reply(&routes)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let unconfigured = api::routes(service(&file), None);
    let response = warp::test::request()
        .path("/ocr/image/MD7193.jpg")
        .reply(&unconfigured)
        .await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn health() {
    let file = data_file();
    let routes = api::routes(service(&file), None);
    let response = warp::test::request().path("/health").reply(&routes).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(&response)["status"], "healthy");
}

#[tokio::test]
async fn sqlite_backend_behaves_like_the_file() {
    let file = data_file();
    let index = PlateIndex::load(file.path()).unwrap();
    let repository = SqliteRepository::open_in_memory().unwrap();
    repository
        .import(index.plates().iter().map(|p| &**p))
        .unwrap();
    let service = Arc::new(RecognitionService::new(Arc::new(repository)));
    let routes = api::routes(service, None);

    let response = warp::test::request()
        .method("POST")
        .path("/ocr/recognize")
        .json(&json!({"image_name": "MD7193.jpg"}))
        .reply(&routes)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(&response)["plate_number"], "D7");

    let response = warp::test::request()
        .method("POST")
        .path("/ocr/recognize")
        .json(&json!({"image_name": "low.jpg"}))
        .reply(&routes)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

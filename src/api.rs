use crate::service::{RecognitionService, RecognizeError};
use crate::types::Plate;
use log::{error, info};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use warp::http::{self, header, StatusCode};
use warp::reply::Response;
use warp::{Filter, Reply};

/// Largest accepted `limit` on the plate listing.
pub const MAX_LIST_LIMIT: usize = 10_000;

#[derive(Clone)]
struct Context {
    service: Arc<RecognitionService>,
    image_base_url: Option<String>,
}

pub async fn run(
    service: Arc<RecognitionService>,
    image_base_url: Option<String>,
    addr: SocketAddr,
) {
    info!("Listening on {}", addr);
    warp::serve(routes(service, image_base_url)).run(addr).await;
}

pub fn routes(
    service: Arc<RecognitionService>,
    image_base_url: Option<String>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let context = Context {
        service,
        image_base_url,
    };
    let with_context = warp::any().map(move || context.clone());

    let recognize = warp::post()
        .and(warp::path!("ocr" / "recognize"))
        .and(warp::body::content_length_limit(16 * 1024))
        .and(warp::body::json())
        .and(with_context.clone())
        .and_then(|body, context| handle_recognize(body, context, false));
    let detailed = warp::post()
        .and(warp::path!("ocr" / "recognize" / "detailed"))
        .and(warp::body::content_length_limit(16 * 1024))
        .and(warp::body::json())
        .and(with_context.clone())
        .and_then(|body, context| handle_recognize(body, context, true));
    let exists = warp::get()
        .and(warp::path!("ocr" / "exists" / String))
        .and(with_context.clone())
        .and_then(handle_exists);
    let plates = warp::get()
        .and(warp::path!("ocr" / "plates"))
        .and(warp::query::<HashMap<String, String>>())
        .and(with_context.clone())
        .and_then(handle_list);
    let image = warp::get()
        .and(warp::path!("ocr" / "image" / String))
        .and(with_context)
        .and_then(handle_image);
    let health = warp::get()
        .and(warp::path!("health"))
        .map(|| warp::reply::json(&json!({"status": "healthy", "service": "plate-ocr"})));

    recognize
        .or(detailed)
        .or(exists)
        .or(plates)
        .or(image)
        .or(health)
}

fn reply(status: StatusCode, body: &Value) -> Response {
    warp::reply::with_status(warp::reply::json(body), status).into_response()
}

fn error_reply(status: StatusCode, message: String) -> Response {
    reply(status, &json!({ "error": message }))
}

/// Full JSON view of a plate, as served by `/ocr/recognize/detailed`.
pub fn plate_details(plate: &Plate) -> Value {
    let characters: Vec<Value> = plate
        .characters()
        .iter()
        .map(|c| {
            json!({
                "char": c.char,
                "left": c.left,
                "top": c.top,
                "width": c.width,
                "height": c.height,
            })
        })
        .collect();
    let coords = plate.coordinates();
    json!({
        "plate_number": plate.plate_number(),
        "image_name": plate.image_name(),
        "num_characters": plate.num_characters(),
        "num_plates_in_image": plate.num_plates_in_image(),
        "characters": characters,
        "coordinates": {
            "top_left": [coords.top_left.0, coords.top_left.1],
            "top_right": [coords.top_right.0, coords.top_right.1],
            "bottom_right": [coords.bottom_right.0, coords.bottom_right.1],
            "bottom_left": [coords.bottom_left.0, coords.bottom_left.1],
        },
        "is_valid": plate.is_valid(),
    })
}

async fn handle_recognize(body: Value, context: Context, detailed: bool) -> Result<Response, Infallible> {
    let image_name = match body["image_name"].as_str() {
        Some(name) => name,
        None => {
            return Ok(error_reply(
                StatusCode::BAD_REQUEST,
                "Missing image_name field".to_string(),
            ))
        }
    };
    info!("Recognizing plate for {}", image_name);
    Ok(match context.service.recognize(image_name) {
        Ok(Some(plate)) if detailed => reply(StatusCode::OK, &plate_details(&plate)),
        Ok(Some(plate)) => reply(
            StatusCode::OK,
            &json!({
                "plate_number": plate.plate_number(),
                "image_name": plate.image_name(),
            }),
        ),
        Ok(None) => error_reply(
            StatusCode::NOT_FOUND,
            format!("OCR data not found for: {}", image_name),
        ),
        Err(RecognizeError::Invalid(e)) => reply(
            StatusCode::BAD_REQUEST,
            &json!({
                "error": e.to_string(),
                "invalid_characters": e.invalid_characters,
            }),
        ),
        Err(RecognizeError::Index(e)) => {
            error!("Error recognizing plate for {}: {}", image_name, e);
            error_reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Internal error: {}", e),
            )
        }
    })
}

async fn handle_exists(image_name: String, context: Context) -> Result<Response, Infallible> {
    Ok(match context.service.exists(&image_name) {
        Ok(exists) => reply(
            StatusCode::OK,
            &json!({ "image_name": image_name, "exists": exists }),
        ),
        Err(e) => {
            error!("Error checking {}: {}", image_name, e);
            error_reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Internal error: {}", e),
            )
        }
    })
}

fn parse_limit(query: &HashMap<String, String>) -> Result<Option<usize>, String> {
    match query.get("limit") {
        None => Ok(None),
        Some(raw) => match raw.parse::<usize>() {
            Ok(limit) if limit >= 1 && limit <= MAX_LIST_LIMIT => Ok(Some(limit)),
            _ => Err(format!(
                "limit must be an integer between 1 and {}, got '{}'",
                MAX_LIST_LIMIT, raw
            )),
        },
    }
}

async fn handle_list(
    query: HashMap<String, String>,
    context: Context,
) -> Result<Response, Infallible> {
    let limit = match parse_limit(&query) {
        Ok(limit) => limit,
        Err(message) => return Ok(error_reply(StatusCode::BAD_REQUEST, message)),
    };
    let plates = match context.service.all_plates() {
        Ok(plates) => plates,
        Err(e) => {
            error!("Error listing plates: {}", e);
            return Ok(error_reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Internal error: {}", e),
            ));
        }
    };
    let shown: Vec<Value> = plates
        .iter()
        .take(limit.unwrap_or_else(|| plates.len()))
        .map(|p| {
            json!({
                "image_name": p.image_name(),
                "plate_number": p.plate_number(),
                "num_characters": p.num_characters(),
            })
        })
        .collect();
    Ok(reply(
        StatusCode::OK,
        &json!({
            "total": plates.len(),
            "showing": shown.len(),
            "plates": shown,
        }),
    ))
}

async fn handle_image(image_name: String, context: Context) -> Result<Response, Infallible> {
    match context.service.exists(&image_name) {
        Ok(true) => {}
        Ok(false) => {
            return Ok(error_reply(
                StatusCode::NOT_FOUND,
                format!("Image not found: {}", image_name),
            ))
        }
        Err(e) => {
            error!("Error checking {}: {}", image_name, e);
            return Ok(error_reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Internal error: {}", e),
            ));
        }
    }
    let base = match context.image_base_url {
        Some(base) => base,
        None => {
            return Ok(error_reply(
                StatusCode::SERVICE_UNAVAILABLE,
                "Image hosting is not configured".to_string(),
            ))
        }
    };
    let stem = Path::new(&image_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(&image_name);
    let location = format!("{}{}.jpg", base, stem);
    let response = http::Response::builder()
        .status(StatusCode::FOUND)
        .header(header::LOCATION, location.as_str())
        .body(String::new());
    Ok(match response {
        Ok(response) => response.into_response(),
        Err(e) => {
            error!("Invalid redirect location {}: {}", location, e);
            error_reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Internal error: {}", e),
            )
        }
    })
}

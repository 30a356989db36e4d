use super::types::{ChatRequest, ChatResponse, ErrorResponse, HealthResponse, PredictRequest};
use crate::{
    Error, Result,
    pipeline::{InferenceResponse, ServiceContext, UploadedImage},
};
use axum::{
    Json,
    extract::{FromRequest, Multipart, Request, State, rejection::JsonRejection},
    http::{StatusCode, header::CONTENT_TYPE},
};
use std::sync::Arc;
use tracing::{error, info, warn};

pub const IMAGE_FIELD: &str = "image";
const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

#[derive(Clone)]
pub struct AppState {
    pub context: Arc<ServiceContext>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

pub async fn predict(
    State(state): State<AppState>,
    request: Request,
) -> std::result::Result<Json<InferenceResponse>, ApiError> {
    let upload = read_upload(request).await.map_err(into_api_error)?;
    info!(
        "Received prediction request ({} bytes, {:?})",
        upload.bytes().len(),
        upload.format()
    );

    match state.context.predict(upload).await {
        Ok(response) => Ok(Json(response)),
        Err(e) => Err(into_api_error(e)),
    }
}

/// Generation failures still answer 200 with the fallback reply in `reply`;
/// only a missing message is a client error.
pub async fn chat(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ChatRequest>, JsonRejection>,
) -> std::result::Result<Json<ChatResponse>, ApiError> {
    let message = payload
        .ok()
        .and_then(|Json(request)| request.message)
        .filter(|message| !message.trim().is_empty());

    let Some(message) = message else {
        return Err(bad_request("No message provided"));
    };

    info!("Received chat message ({} chars)", message.len());
    let reply = state.context.chat(&message).await;
    Ok(Json(ChatResponse { reply }))
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Accepts either a multipart form with an `image` file field or a JSON body
/// with a base64 `image` string.
async fn read_upload(request: Request) -> Result<UploadedImage> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.starts_with("multipart/form-data") {
        let mut multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| Error::invalid_input(e.body_text()))?;

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| Error::invalid_input(e.body_text()))?
        {
            if field.name() == Some(IMAGE_FIELD) {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| Error::invalid_input(e.body_text()))?;
                return UploadedImage::decode(bytes.to_vec()).await;
            }
        }
        Err(Error::invalid_input("No image provided"))
    } else if content_type.starts_with("application/json") {
        let Json(body) = Json::<PredictRequest>::from_request(request, &())
            .await
            .map_err(|e| Error::invalid_input(e.body_text()))?;
        match body.image {
            Some(image) if !image.trim().is_empty() => UploadedImage::decode_base64(image).await,
            _ => Err(Error::invalid_input("No image provided")),
        }
    } else {
        Err(Error::invalid_input("No image provided"))
    }
}

fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// Client mistakes keep their message; anything else is logged and hidden.
fn into_api_error(e: Error) -> ApiError {
    match e {
        Error::InvalidInput(message) => {
            warn!("Rejected request: {}", message);
            bad_request(message)
        }
        other => {
            error!("Prediction error: {}", other);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: INTERNAL_ERROR_MESSAGE.to_string(),
                }),
            )
        }
    }
}

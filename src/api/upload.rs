//! Image upload endpoint.

use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    Json,
};

use crate::error::{AppError, Result};
use crate::metrics::UploadMetrics;
use crate::server::AppState;
use crate::upload::{StoredImage, UploadError};

/// Multipart field carrying the image
const IMAGE_FIELD: &str = "image";

fn multipart_error(state: &AppState, e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        UploadError::TooLarge {
            limit: state.image_store.max_size_bytes(),
        }
        .into()
    } else {
        AppError::Validation(e.body_text())
    }
}

/// POST /api/mail-templates/upload-image - Store an image, return its URL
#[tracing::instrument(name = "http.upload_image", skip(state, multipart))]
pub async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<StoredImage>> {
    let result = store_first_image(&state, &mut multipart).await;
    if result.is_err() {
        UploadMetrics::record_rejected();
    }
    result.map(Json)
}

async fn store_first_image(state: &AppState, multipart: &mut Multipart) -> Result<StoredImage> {
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(state, e))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        // The guard inside `upload` removes the partial file on any early return
        let mut upload = state.image_store.begin(field.content_type()).await?;
        let mut bytes: u64 = 0;
        while let Some(chunk) = field.chunk().await.map_err(|e| multipart_error(state, e))? {
            bytes += chunk.len() as u64;
            upload.write(&chunk).await?;
        }

        let stored = upload.finish().await?;
        UploadMetrics::record_accepted(bytes);
        return Ok(stored);
    }

    Err(UploadError::Missing.into())
}

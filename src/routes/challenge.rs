use axum::{
    Router,
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    routing::get,
};

use crate::{
    challenge,
    error::{AppError, AppResult},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/challenge-image/{token}/{hash}", get(challenge_image))
}

#[utoipa::path(
    get,
    path = "/challenge-image/{token}/{hash}",
    params(
        ("token" = String, Path, description = "Session token of the form"),
        ("hash" = String, Path, description = "Challenge hash issued with the form"),
    ),
    responses(
        (status = 200, description = "JPEG picture the customer must name"),
        (status = 404, description = "Hash does not belong to this session"),
    ),
    tag = "Storefront"
)]
pub async fn challenge_image(
    State(state): State<AppState>,
    Path((token, hash)): Path<(String, String)>,
) -> AppResult<impl IntoResponse> {
    let config = &state.config.challenge;
    let image = challenge::image_for(&token, &hash, &config.salt).ok_or(AppError::NotFound)?;

    let path = config.image_dir.join(format!("{image}.jpg"));
    let bytes = tokio::fs::read(&path).await.map_err(|err| {
        tracing::warn!(path = %path.display(), error = %err, "challenge image unreadable");
        AppError::NotFound
    })?;

    Ok((
        [
            (header::CONTENT_TYPE, "image/jpeg"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        bytes,
    ))
}

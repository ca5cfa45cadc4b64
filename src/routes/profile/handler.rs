use axum::{
    extract::{Extension, Json, State},
    http::StatusCode,
};

use crate::{
    AppState,
    error::AppError,
    models::UserProfile,
    result::ApiResponse,
    utils::{Claims, success_to_api_response},
};

use super::model::ProfileView;

type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), AppError>;

#[axum::debug_handler]
pub async fn get_profile(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
) -> ApiResult<ProfileView> {
    let profile = state.profiles().load_profile(&claims.sub).await?;
    Ok((StatusCode::OK, success_to_api_response(profile.into())))
}

#[axum::debug_handler]
pub async fn update_profile(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Json(req): Json<UserProfile>,
) -> ApiResult<ProfileView> {
    let saved = state.profiles().save_profile(&claims.sub, req).await?;
    Ok((StatusCode::OK, success_to_api_response(saved.into())))
}

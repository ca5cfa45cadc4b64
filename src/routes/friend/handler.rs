use axum::{
    extract::{Extension, Json, Path, Query, State},
    http::StatusCode,
};

use crate::{
    AppState,
    error::{AppError, FriendError},
    friends::UserSummary,
    models::FriendLink,
    result::ApiResponse,
    utils::{Claims, success_to_api_response},
};

use super::model::{AddFriendRequest, FriendRemovedResponse, SearchUserQuery};

type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), AppError>;

#[axum::debug_handler]
pub async fn list_friends(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
) -> ApiResult<Vec<FriendLink>> {
    let friends = state.friends().list_friends(&claims.sub).await?;
    Ok((StatusCode::OK, success_to_api_response(friends)))
}

/// 按用户名添加好友
#[axum::debug_handler]
pub async fn add_friend(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Json(req): Json<AddFriendRequest>,
) -> ApiResult<FriendLink> {
    if req.username.trim().is_empty() {
        return Err(AppError::Validation(
            "Introduce un nombre de usuario".to_string(),
        ));
    }

    let link = state
        .friends()
        .add_friend_by_username(&claims.sub, &req.username)
        .await?;
    Ok((StatusCode::CREATED, success_to_api_response(link)))
}

#[axum::debug_handler]
pub async fn remove_friend(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Path(friend_id): Path<String>,
) -> ApiResult<FriendRemovedResponse> {
    state.friends().remove_friend(&claims.sub, &friend_id).await?;
    Ok((
        StatusCode::OK,
        success_to_api_response(FriendRemovedResponse { friend_id }),
    ))
}

#[axum::debug_handler]
pub async fn search_users(
    Extension(_claims): Extension<Claims>,
    State(state): State<AppState>,
    Query(query): Query<SearchUserQuery>,
) -> ApiResult<UserSummary> {
    let user = state
        .friends()
        .search_user(&query.username)
        .await?
        .ok_or_else(|| FriendError::UserNotFound(query.username.trim().to_string()))?;
    Ok((StatusCode::OK, success_to_api_response(user)))
}

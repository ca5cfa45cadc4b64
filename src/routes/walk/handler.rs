use std::sync::Arc;

use axum::{
    extract::{Extension, Json, State},
    http::StatusCode,
};

use crate::{
    AppState,
    error::AppError,
    identity::IdentityProvider,
    models::Coordinates,
    result::ApiResponse,
    session::{DeviceHello, WalkSession},
    utils::{Claims, success_to_api_response},
};

use super::model::{
    MapRegion, OpenSessionRequest, PositionAccepted, RosterView, SessionClosedResponse,
    UpdateStatusRequest, WalkSessionView, WalkView,
};

type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), AppError>;

async fn current_session(state: &AppState, claims: &Claims) -> Result<Arc<WalkSession>, AppError> {
    state
        .sessions
        .get(&claims.sub)
        .await
        .ok_or(AppError::NoSession)
}

fn session_view(session: &WalkSession) -> WalkSessionView {
    let tracker_state = session.tracker.state();
    WalkSessionView {
        session_id: session.session_id,
        state: tracker_state,
        walking: tracker_state.is_walking(),
    }
}

/// 进入散步页面
#[axum::debug_handler]
pub async fn open_session(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Json(req): Json<OpenSessionRequest>,
) -> ApiResult<WalkSessionView> {
    let identity: Arc<dyn IdentityProvider> = Arc::new(claims);
    let session = state
        .sessions
        .open(
            identity,
            DeviceHello {
                permission: req.location_permission,
                position: req.position,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, success_to_api_response(session_view(&session))))
}

/// 离开散步页面，不改变 walking 标记
#[axum::debug_handler]
pub async fn close_session(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
) -> ApiResult<SessionClosedResponse> {
    let closed = state.sessions.close(&claims.sub).await;
    Ok((StatusCode::OK, success_to_api_response(SessionClosedResponse { closed })))
}

/// 散步开关
#[axum::debug_handler]
pub async fn update_status(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Json(req): Json<UpdateStatusRequest>,
) -> ApiResult<WalkSessionView> {
    let session = current_session(&state, &claims).await?;

    if let Some(permission) = req.location_permission {
        session.feed.set_permission(permission);
    }
    if req.walking {
        session.tracker.enable().await?;
    } else {
        session.tracker.disable().await?;
    }

    Ok((StatusCode::OK, success_to_api_response(session_view(&session))))
}

/// 设备推送 GPS 定位
#[axum::debug_handler]
pub async fn push_position(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Json(coords): Json<Coordinates>,
) -> ApiResult<PositionAccepted> {
    let session = current_session(&state, &claims).await?;
    session.report_position(coords)?;

    Ok((
        StatusCode::OK,
        success_to_api_response(PositionAccepted {
            latitude: coords.latitude,
            longitude: coords.longitude,
        }),
    ))
}

/// 散步页面的完整视图：开关状态、地图区域、好友名单
#[axum::debug_handler]
pub async fn get_walk(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
) -> ApiResult<WalkView> {
    let session = current_session(&state, &claims).await?;
    let tracker = &session.tracker;
    let own_location = tracker.own_location();
    let tracker_state = tracker.state();

    Ok((
        StatusCode::OK,
        success_to_api_response(WalkView {
            session_id: session.session_id,
            state: tracker_state,
            walking: tracker_state.is_walking(),
            own_location,
            region: MapRegion::around(own_location),
            roster: RosterView::from(&tracker.roster()),
        }),
    ))
}

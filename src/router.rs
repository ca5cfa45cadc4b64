use axum::{
    Router,
    routing::{delete, get, post, put},
};

use crate::{
    AppState,
    middleware::{auth_middleware, log_errors},
    routes,
};

/// 公开路由
fn public_routes() -> Router<AppState> {
    Router::new().route("/ping", get(routes::ping))
}

/// 需要 Bearer 令牌的路由
fn protected_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        // 散步会话
        .route(
            "/walk/session",
            post(routes::walk::open_session).delete(routes::walk::close_session),
        )
        .route("/walk/status", put(routes::walk::update_status))
        .route("/walk/position", post(routes::walk::push_position))
        .route("/walk", get(routes::walk::get_walk))
        // 好友
        .route(
            "/friends",
            get(routes::friend::list_friends).post(routes::friend::add_friend),
        )
        .route("/friends/{friend_id}", delete(routes::friend::remove_friend))
        .route("/users/search", get(routes::friend::search_users))
        // 资料
        .route(
            "/profile",
            get(routes::profile::get_profile).put(routes::profile::update_profile),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
}

/// 创建主路由，挂在 `api_base_uri` 下。限流和 CORS 由启动代码按环境再套上。
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .merge(public_routes())
        .merge(protected_routes(&state));

    let base = state.config.api_base_uri.trim_end_matches('/');
    let router = if base.is_empty() {
        api
    } else {
        Router::new().nest(base, api)
    };

    router
        .layer(axum::middleware::from_fn(log_errors))
        .with_state(state)
}

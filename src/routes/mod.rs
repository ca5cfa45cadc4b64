use axum::{Json, http::StatusCode};
use serde::Serialize;

use crate::{result::ApiResponse, utils::success_to_api_response};

pub mod friend;
pub mod profile;
pub mod walk;

#[derive(Debug, Serialize)]
pub struct PingResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn ping() -> (StatusCode, Json<ApiResponse<PingResponse>>) {
    (
        StatusCode::OK,
        success_to_api_response(PingResponse {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}

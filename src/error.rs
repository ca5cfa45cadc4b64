use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::utils::{error_codes, error_to_api_response};

/// 文档存储错误
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// 临时性读写失败，下一个周期会重试
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("invalid document path: {0}")]
    InvalidPath(String),

    #[error("document codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

/// 设备定位错误
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LocationError {
    #[error("location permission revoked")]
    PermissionRevoked,

    #[error("invalid coordinates ({0}, {1})")]
    InvalidCoordinates(f64, f64),

    #[error("location unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PresenceError {
    #[error("no authenticated user")]
    NotAuthenticated,

    #[error("location permission denied")]
    PermissionDenied,

    #[error("walk session already closed")]
    SessionClosed,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Location(#[from] LocationError),
}

#[derive(Debug, thiserror::Error)]
pub enum FriendError {
    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("cannot add yourself as a friend")]
    SelfReference,

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("{0}")]
    Validation(&'static str),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// HTTP 层错误，统一转成 ApiResponse 信封
#[derive(Debug)]
pub enum AppError {
    Unauthorized,
    NoSession,
    PermissionDenied,
    Validation(String),
    NotFound(String),
    StoreUnavailable(String),
    InternalServerError,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, msg) = match self {
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                error_codes::AUTH_FAILED,
                "Acceso no autorizado".to_string(),
            ),
            AppError::NoSession => (
                StatusCode::CONFLICT,
                error_codes::NO_SESSION,
                "No hay ninguna sesión de paseo abierta".to_string(),
            ),
            AppError::PermissionDenied => (
                StatusCode::FORBIDDEN,
                error_codes::PERMISSION_DENIED,
                "Permiso denegado para la ubicación".to_string(),
            ),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, error_codes::VALIDATION_ERROR, msg)
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, error_codes::NOT_FOUND, msg),
            AppError::StoreUnavailable(detail) => (
                StatusCode::SERVICE_UNAVAILABLE,
                error_codes::STORE_UNAVAILABLE,
                format!("Almacén no disponible: {}", detail),
            ),
            AppError::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_codes::INTERNAL_ERROR,
                "Error interno del servidor".to_string(),
            ),
        };

        (status, error_to_api_response::<()>(code, msg)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(detail) => AppError::StoreUnavailable(detail),
            StoreError::InvalidPath(path) => AppError::Validation(format!("Ruta inválida: {}", path)),
            StoreError::Codec(e) => {
                tracing::error!("Document codec failure: {}", e);
                AppError::InternalServerError
            }
        }
    }
}

impl From<PresenceError> for AppError {
    fn from(err: PresenceError) -> Self {
        match err {
            PresenceError::NotAuthenticated => AppError::Unauthorized,
            PresenceError::PermissionDenied => AppError::PermissionDenied,
            PresenceError::SessionClosed => AppError::NoSession,
            PresenceError::Store(e) => e.into(),
            PresenceError::Location(e) => e.into(),
        }
    }
}

impl From<LocationError> for AppError {
    fn from(err: LocationError) -> Self {
        match err {
            LocationError::PermissionRevoked => AppError::PermissionDenied,
            other => AppError::Validation(other.to_string()),
        }
    }
}

impl From<FriendError> for AppError {
    fn from(err: FriendError) -> Self {
        match err {
            FriendError::UserNotFound(_) => AppError::NotFound(
                "No se ha encontrado ningún usuario con ese nombre.".to_string(),
            ),
            FriendError::SelfReference => {
                AppError::Validation("No puedes añadirte a ti mismo".to_string())
            }
            FriendError::Store(e) => e.into(),
        }
    }
}

impl From<ProfileError> for AppError {
    fn from(err: ProfileError) -> Self {
        match err {
            ProfileError::Validation(msg) => AppError::Validation(msg.to_string()),
            ProfileError::Store(e) => e.into(),
        }
    }
}

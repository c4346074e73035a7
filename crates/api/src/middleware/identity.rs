//! Caller identity and presence connection extractors.
//!
//! There is no authentication: the caller states who they are with headers.
//!
//! | Header            | Required | Meaning                                  |
//! |-------------------|----------|------------------------------------------|
//! | `x-user-id`       | yes      | stable user id                           |
//! | `x-display-name`  | no       | name shown to others (defaults to the id)|
//! | `x-avatar-ref`    | no       | avatar reference                         |
//! | `x-connection-id` | for locks| presence connection from `session.ready` |

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderName;
use shelfroom_core::collaboration::Requester;
use shelfroom_db::ConnectionId;

use crate::error::AppError;

pub const USER_ID_HEADER: HeaderName = HeaderName::from_static("x-user-id");
pub const DISPLAY_NAME_HEADER: HeaderName = HeaderName::from_static("x-display-name");
pub const AVATAR_REF_HEADER: HeaderName = HeaderName::from_static("x-avatar-ref");
pub const CONNECTION_ID_HEADER: HeaderName = HeaderName::from_static("x-connection-id");

/// The caller, as described by the identity headers.
///
/// ```ignore
/// async fn my_handler(Identity(requester): Identity) -> AppResult<Json<()>> {
///     tracing::info!(user_id = %requester.user_id, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Identity(pub Requester);

/// The presence connection a lock operation is scoped to.
#[derive(Debug, Clone)]
pub struct Connection(pub ConnectionId);

fn header(parts: &Parts, name: &HeaderName) -> Result<Option<String>, AppError> {
    match parts.headers.get(name) {
        Some(value) => value
            .to_str()
            .map(|v| Some(v.trim().to_string()))
            .map_err(|_| AppError::BadRequest(format!("Header {name} is not valid text"))),
        None => Ok(None),
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header(parts, &USER_ID_HEADER)?
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::BadRequest(format!("Missing {USER_ID_HEADER} header")))?;
        let display_name = header(parts, &DISPLAY_NAME_HEADER)?
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| user_id.clone());
        let avatar_ref = header(parts, &AVATAR_REF_HEADER)?.filter(|v| !v.is_empty());

        let requester = Requester::new(user_id, display_name, avatar_ref);
        requester.validate()?;
        Ok(Identity(requester))
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Connection {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        header(parts, &CONNECTION_ID_HEADER)?
            .filter(|v| !v.is_empty())
            .map(|v| Connection(ConnectionId::from(v)))
            .ok_or_else(|| AppError::BadRequest(format!("Missing {CONNECTION_ID_HEADER} header")))
    }
}

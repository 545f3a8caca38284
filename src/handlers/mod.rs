pub mod bookings;
pub mod cars;
pub mod damage;
pub mod health;
pub mod maintenance;
pub mod reviews;

use axum::http::HeaderMap;

use crate::errors::AppError;
use crate::models::Actor;

/// The gateway in front of this service authenticates callers and injects
/// their identity as headers; marshaling those into an explicit `Actor` is
/// the only auth concern the handlers have.
pub(crate) fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, AppError> {
    let id = headers
        .get("x-actor-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .trim();
    if id.is_empty() {
        return Err(AppError::Unauthorized);
    }

    let is_staff = headers
        .get("x-actor-role")
        .and_then(|v| v.to_str().ok())
        .map(|role| role.eq_ignore_ascii_case("staff"))
        .unwrap_or(false);

    Ok(if is_staff {
        Actor::staff(id)
    } else {
        Actor::customer(id)
    })
}

pub(crate) fn require_staff(headers: &HeaderMap) -> Result<Actor, AppError> {
    let actor = actor_from_headers(headers)?;
    if !actor.is_staff {
        return Err(AppError::Forbidden);
    }
    Ok(actor)
}

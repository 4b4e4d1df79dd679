use std::future::{ready, Ready};

use actix_web::http::header::HeaderMap;
use actix_web::{dev::Payload, error::ErrorUnauthorized, FromRequest, HttpRequest};
use uuid::Uuid;

use crate::domain::order::ActorRole;

// ============================================================================
// Caller Identity
// ============================================================================
//
// The gateway in front of this service authenticates requests and forwards
// the verified identity in headers. This service trusts those headers and
// does nothing cryptographic itself.
//
// ============================================================================

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Debug, Clone, Copy)]
pub struct Caller {
    pub id: Uuid,
    pub role: ActorRole,
}

impl Caller {
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, actix_web::Error> {
        let id = headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v).ok())
            .ok_or_else(|| ErrorUnauthorized("Missing or malformed x-user-id header"))?;

        let role = headers
            .get(USER_ROLE_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<ActorRole>().ok())
            .ok_or_else(|| ErrorUnauthorized("Missing or malformed x-user-role header"))?;

        Ok(Self { id, role })
    }
}

impl FromRequest for Caller {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Caller::from_headers(req.headers()))
    }
}

use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

pub mod roles {
    pub const SUPERADMIN: &str = "superadmin";
    pub const ADMIN: &str = "admin";
    pub const CANDIDATE: &str = "candidate";
}

/// JWT claims issued by the external identity service. This service only
/// verifies; it never mints tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub role: Option<String>,
    pub tenant_id: Option<String>,
}

/// The calling principal, parsed out of verified claims.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub role: String,
    pub tenant_id: Option<Uuid>,
}

impl CurrentUser {
    pub fn from_claims(claims: &Claims) -> crate::error::Result<Self> {
        let id = Uuid::parse_str(&claims.sub)
            .map_err(|_| crate::error::Error::Unauthorized("Invalid subject claim".to_string()))?;
        let tenant_id = match &claims.tenant_id {
            Some(raw) => Some(Uuid::parse_str(raw).map_err(|_| {
                crate::error::Error::Unauthorized("Invalid tenant claim".to_string())
            })?),
            None => None,
        };
        Ok(Self {
            id,
            role: claims.role.clone().unwrap_or_default(),
            tenant_id,
        })
    }

    pub fn is_candidate(&self) -> bool {
        self.role == roles::CANDIDATE
    }

    pub fn is_admin(&self) -> bool {
        self.role == roles::ADMIN || self.role == roles::SUPERADMIN
    }

    pub fn is_superadmin(&self) -> bool {
        self.role == roles::SUPERADMIN
    }
}

fn decode_bearer(req: &Request) -> Result<Claims, Response> {
    let Some(auth_header) = req.headers().get(axum::http::header::AUTHORIZATION) else {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error":"missing_authorization"})),
        )
            .into_response());
    };
    let Ok(auth_str) = auth_header.to_str() else {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error":"bad_authorization"})),
        )
            .into_response());
    };
    let Some(token) = auth_str.strip_prefix("Bearer ") else {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error":"unsupported_scheme"})),
        )
            .into_response());
    };

    let config = crate::config::get_config();
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|_| {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error":"invalid_token"})),
        )
            .into_response()
    })
}

pub async fn require_bearer_auth(mut req: Request, next: Next) -> Response {
    match decode_bearer(&req) {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Err(resp) => resp,
    }
}

pub async fn require_admin(mut req: Request, next: Next) -> Response {
    match decode_bearer(&req) {
        Ok(claims) => {
            let role = claims.role.clone().unwrap_or_default();
            if role != roles::ADMIN && role != roles::SUPERADMIN {
                return (StatusCode::FORBIDDEN, Json(json!({"error":"forbidden"}))).into_response();
            }
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Err(resp) => resp,
    }
}

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{event, Level};

use crate::domain::Role;
use crate::dtos::MessageResponse;
use crate::repositories::{ProductRepository, UserRepository};
use crate::state::AppState;

pub const TOKEN_VALIDITY_DAYS: i64 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub email: String,
    pub iat: usize,
    pub exp: usize,
}

pub struct TokenService {
    secret: String,
}

impl TokenService {
    pub fn new(secret: String) -> TokenService {
        TokenService { secret }
    }

    pub fn sign(&self, email: &str) -> Result<String, String> {
        let now = Utc::now();
        let expires_at = now + Duration::days(TOKEN_VALIDITY_DAYS);
        let claims = Claims {
            email: String::from(email),
            iat: now.timestamp() as usize,
            exp: expires_at.timestamp() as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| format!("Failed to sign token: {}", e))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, String> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|e| format!("Invalid or expired token: {}", e))
    }
}

// Stops the request with a soft message body when the bearer token is missing or
// does not verify; otherwise stashes the decoded claims for downstream layers.
pub async fn verify_token<U, P>(
    State(state): State<Arc<AppState<U, P>>>,
    mut request: Request,
    next: Next,
) -> Response
where
    U: UserRepository + 'static,
    P: ProductRepository + 'static,
{
    let header = match request.headers().get(AUTHORIZATION) {
        Some(header) => header,
        None => return Json(MessageResponse::new("No Token")).into_response(),
    };

    // 'Bearer <token>'
    let token = header
        .to_str()
        .ok()
        .and_then(|value| value.split_whitespace().last())
        .unwrap_or("");

    match state.token_service.verify(token) {
        Ok(claims) => {
            request.extensions_mut().insert(claims);
            next.run(request).await
        }
        Err(e) => {
            event!(Level::DEBUG, error = %e, "rejected bearer token");
            Json(MessageResponse::new("Invalid Token")).into_response()
        }
    }
}

// Runs behind verify_token: looks the requester up and only lets sellers through.
pub async fn verify_seller<U, P>(
    State(state): State<Arc<AppState<U, P>>>,
    request: Request,
    next: Next,
) -> Response
where
    U: UserRepository + 'static,
    P: ProductRepository + 'static,
{
    let email = match request.extensions().get::<Claims>() {
        Some(claims) if !claims.email.is_empty() => claims.email.clone(),
        _ => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(MessageResponse::new("Unauthorized access")),
            )
                .into_response()
        }
    };

    match state.user_repository.find_by_email(&email).await {
        Ok(Some(user)) if user.role == Role::Seller => next.run(request).await,
        Ok(_) => (
            StatusCode::FORBIDDEN,
            Json(MessageResponse::new("Forbidden access")),
        )
            .into_response(),
        Err(e) => {
            event!(Level::ERROR, error = %e, "seller check failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(MessageResponse::new("Internal Server Error")),
            )
                .into_response()
        }
    }
}

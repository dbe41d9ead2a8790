use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use common::format_validation_errors;
use db::models::user::{Model as UserModel, UserRole};
use serde::{Deserialize, Serialize};
use util::state::AppState;
use validator::Validate;

use crate::auth::generate_jwt;
use crate::response::ApiResponse;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 255, message = "Name is required"))]
    pub name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize, Default)]
pub struct AuthResponse {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: String,
    pub token: String,
    pub expires_at: String,
}

impl AuthResponse {
    fn for_user(user: &UserModel) -> Self {
        let (token, expires_at) = generate_jwt(user.id, user.is_admin());
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role.to_string(),
            token,
            expires_at,
        }
    }
}

/// POST /api/auth/register
///
/// Register a new customer account.
///
/// ### Request Body
/// ```json
/// {
///   "name": "Amira",
///   "email": "user@example.com",
///   "password": "strongpassword"
/// }
/// ```
///
/// ### Responses
/// - `201 Created` with profile, token and expiry
/// - `400 Bad Request` (validation failure)
/// - `409 Conflict` (duplicate email)
/// - `500 Internal Server Error`
pub async fn register(
    State(app_state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> impl IntoResponse {
    if let Err(validation_errors) = req.validate() {
        let error_message = format_validation_errors(&validation_errors);
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<AuthResponse>::error(error_message)),
        );
    }

    let db = app_state.db();

    match UserModel::find_by_email(db, &req.email).await {
        Ok(Some(_)) => {
            return (
                StatusCode::CONFLICT,
                Json(ApiResponse::error("A user with this email already exists")),
            );
        }
        Ok(None) => {}
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(format!("Database error: {e}"))),
            );
        }
    }

    match UserModel::create(db, &req.name, &req.email, &req.password, UserRole::Customer).await {
        Ok(user) => (
            StatusCode::CREATED,
            Json(ApiResponse::success(
                AuthResponse::for_user(&user),
                "User registered successfully",
            )),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(format!("Database error: {e}"))),
        ),
    }
}

/// POST /api/auth/login
///
/// Exchange email + password for a JWT.
///
/// ### Responses
/// - `200 OK` with profile, token and expiry
/// - `401 Unauthorized` on unknown email or wrong password (indistinguishable
///   on purpose)
pub async fn login(
    State(app_state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> impl IntoResponse {
    if let Err(validation_errors) = req.validate() {
        let error_message = format_validation_errors(&validation_errors);
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<AuthResponse>::error(error_message)),
        );
    }

    let db = app_state.db();

    let user = match UserModel::find_by_email(db, &req.email).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(ApiResponse::error("Invalid email or password")),
            );
        }
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(format!("Database error: {e}"))),
            );
        }
    };

    if !user.verify_password(&req.password) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(ApiResponse::error("Invalid email or password")),
        );
    }

    (
        StatusCode::OK,
        Json(ApiResponse::success(
            AuthResponse::for_user(&user),
            "Login successful",
        )),
    )
}

use axum::{
    extract::{rejection::JsonRejection, FromRef, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        password::{hash_password_blocking, verify_password_blocking},
        JwtKeys,
    },
    error::ApiError,
    state::AppState,
    users::{
        dto::{CreatedResponse, LoginRequest, LoginResponse, PublicUser, RegisterRequest},
        repo::StoreError,
        repo_types::NewUser,
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(register))
        .route("/users/:id", get(get_user))
}

pub fn login_routes() -> Router<AppState> {
    Router::new().route("/login", post(login))
}

fn require(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::BadRequest(format!("{field} is required")));
    }
    Ok(())
}

#[instrument(skip(state))]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<PublicUser>>, ApiError> {
    let users = state.users.list().await?;
    Ok(Json(users.into_iter().map(PublicUser::from).collect()))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let Json(payload) = payload?;
    require("name", &payload.name)?;
    require("email", &payload.email)?;
    require("password", &payload.password)?;

    if state.users.find_by_email(&payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::Conflict);
    }

    let password_hash = hash_password_blocking(payload.password).await?;

    let user = state
        .users
        .insert(NewUser {
            name: payload.name,
            email: payload.email,
            password_hash,
        })
        .await
        .map_err(|e| {
            if let StoreError::DuplicateEmail = e {
                warn!("email registered concurrently");
            }
            ApiError::from(e)
        })?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            message: "User created successfully",
            user_id: user.id,
        }),
    ))
}

/// Ids that do not parse as UUIDs cannot name a stored user and are reported
/// as not found.
#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PublicUser>, ApiError> {
    let Ok(id) = Uuid::parse_str(&id) else {
        warn!(%id, "malformed user id");
        return Err(ApiError::NotFound);
    };

    let user = state.users.find_by_id(id).await?.ok_or(ApiError::NotFound)?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(payload) = payload?;
    require("email", &payload.email)?;
    require("password", &payload.password)?;

    let Some(user) = state.users.find_by_email(&payload.email).await? else {
        warn!(email = %payload.email, "login unknown email");
        return Err(ApiError::NotFound);
    };

    let ok = verify_password_blocking(payload.password, user.password_hash.clone()).await?;
    if !ok {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::Unauthorized);
    }

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user.id)?;

    info!(user_id = %user.id, "user logged in");
    Ok(Json(LoginResponse {
        message: "Login successful",
        token,
    }))
}

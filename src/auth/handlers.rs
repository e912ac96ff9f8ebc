use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthResponse, ChangePasswordRequest, LoginRequest, MeResponse, PublicUser,
            RefreshRequest, RegisterRequest, SetRoleRequest,
        },
        extractors::{AdminUser, AuthUser},
        jwt::JwtKeys,
        repo_types::{User, UserSummary},
        roles::{Area, Role},
    },
    config::Environment,
    error::{ApiError, AuthError},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me))
        .route("/me/password", post(change_password))
        .route("/areas/:area", get(check_area))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/users", get(list_users))
        .route("/admin/users/:username/role", put(set_role))
}

fn reject(env: Environment) -> impl Fn(AuthError) -> ApiError {
    move |e| e.into_api(env)
}

fn issue_tokens(state: &AppState, user: &User) -> Result<AuthResponse, ApiError> {
    let keys = JwtKeys::from_ref(state);
    let sign = |access: bool| {
        let signed = if access {
            keys.sign_access(user)
        } else {
            keys.sign_refresh(user)
        };
        signed.map_err(|e| {
            error!(error = %e, user_id = %user.id, "jwt sign failed");
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "failed to issue token")
        })
    };
    Ok(AuthResponse {
        access_token: sign(true)?,
        refresh_token: sign(false)?,
        user: PublicUser::from(user),
    })
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let env = state.config.environment;
    let role = payload.role.unwrap_or(Role::User);
    if role == Role::Admin && !state.config.allow_admin_signup {
        warn!("admin self-registration refused");
        return Err(reject(env)(AuthError::Forbidden {
            required: Role::Admin,
        }));
    }

    let user = state
        .auth
        .register(&payload.username, &payload.password, role)
        .await
        .map_err(reject(env))?;

    let body = issue_tokens(&state, &user)?;
    Ok((StatusCode::CREATED, Json(body)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let user = state
        .auth
        .login(&payload.username, &payload.password)
        .await
        .map_err(reject(state.config.environment))?;
    Ok(Json(issue_tokens(&state, &user)?))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|e| ApiError::unauthorized(e.to_string()))?;

    // Role may have changed since the refresh token was issued.
    let user = match state.auth.get_user_by_id(claims.sub).await {
        Ok(u) => u,
        Err(AuthError::UserNotFound) => return Err(ApiError::unauthorized("User not found")),
        Err(e) => return Err(e.into_api(state.config.environment)),
    };
    Ok(Json(issue_tokens(&state, &user)?))
}

#[instrument(skip(state, user), fields(user_id = %user.0.sub))]
pub async fn get_me(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<MeResponse>, ApiError> {
    let record = match state.auth.get_user_by_id(user.0.sub).await {
        Ok(u) => u,
        Err(AuthError::UserNotFound) => {
            error!(user_id = %user.0.sub, "user not found");
            return Err(ApiError::unauthorized("User not found"));
        }
        Err(e) => return Err(e.into_api(state.config.environment)),
    };

    Ok(Json(MeResponse {
        access_level: record.role.access_level(),
        areas: record.role.accessible_areas(),
        user: PublicUser::from(&record),
    }))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.0.sub))]
pub async fn change_password(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .auth
        .change_password(
            &user.0.username,
            &payload.current_password,
            &payload.new_password,
        )
        .await
        .map_err(reject(state.config.environment))?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, user), fields(user_id = %user.0.sub))]
pub async fn check_area(
    State(state): State<AppState>,
    user: AuthUser,
    Path(area): Path<String>,
) -> Result<StatusCode, ApiError> {
    let area: Area = area
        .parse()
        .map_err(|e: String| ApiError::new(StatusCode::NOT_FOUND, e))?;
    user.require(area).map_err(reject(state.config.environment))?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, admin), fields(admin = %admin.0.username))]
pub async fn list_users(
    State(state): State<AppState>,
    admin: AdminUser,
) -> Result<Json<Vec<UserSummary>>, ApiError> {
    let users = state
        .auth
        .list_users()
        .await
        .map_err(reject(state.config.environment))?;
    Ok(Json(users))
}

#[instrument(skip(state, admin, payload), fields(admin = %admin.0.username))]
pub async fn set_role(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(username): Path<String>,
    Json(payload): Json<SetRoleRequest>,
) -> Result<StatusCode, ApiError> {
    let env = state.config.environment;
    let username = username.trim();
    if username == admin.0.username && payload.role != Role::Admin {
        return Err(reject(env)(AuthError::invalid(
            "Admins cannot remove their own admin role.",
        )));
    }
    state
        .auth
        .set_role(username, payload.role)
        .await
        .map_err(reject(env))?;
    info!(%username, role = %payload.role, "role changed by admin");
    Ok(StatusCode::NO_CONTENT)
}

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{
            LoginRequest, LoginResponse, PublicUser, RegisterRequest, RegisteredResponse,
            ResendCodeRequest, VerifyRequest, VerifyResponse,
        },
        extractors::{SessionToken, SessionUser},
        password::{hash_password, verify_password},
        services::{deliver_code, is_valid_email, new_verification_code, normalize_email},
    },
    state::AppState,
    users::{NewUser, UserStoreError},
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/verify", post(verify_email))
        .route("/auth/resend-code", post(resend_code))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisteredResponse>), (StatusCode, String)> {
    payload.username = payload.username.trim().to_string();
    payload.email = normalize_email(&payload.email);
    payload.telefono = payload.telefono.trim().to_string();

    if payload.username.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Username required".into()));
    }
    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err((StatusCode::BAD_REQUEST, "Invalid email".into()));
    }
    if payload.password.len() < 8 {
        warn!("password too short");
        return Err((StatusCode::BAD_REQUEST, "Password too short".into()));
    }

    // The store does not enforce uniqueness; this check is best effort.
    if state.users.find_by_username(&payload.username).await.is_some() {
        warn!("username already registered");
        return Err((StatusCode::CONFLICT, "Username already registered".into()));
    }
    if state.users.find_by_email(&payload.email).await.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err((StatusCode::CONFLICT, "Email already registered".into()));
    }

    let hash = hash_password(&payload.password).map_err(|e| {
        error!(error = %e, "hash_password failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;

    let code = new_verification_code();
    state
        .users
        .create_user(NewUser::new(
            payload.username.clone(),
            payload.email.clone(),
            hash,
            payload.telefono,
            code.clone(),
        ))
        .await;
    deliver_code(&payload.email, &code);

    info!(email = %payload.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(RegisteredResponse {
            username: payload.username,
            email: payload.email,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn verify_email(
    State(state): State<AppState>,
    Json(payload): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>, (StatusCode, String)> {
    let email = normalize_email(&payload.email);
    let code = payload.code.trim();

    // Silent on mismatch, so read back the record holding this exact code.
    state.users.verify_email_code(&email, code).await;
    match state.users.find_by_email_code(&email, code).await {
        Some(user) if user.email_verificado => Ok(Json(VerifyResponse {
            email,
            email_verificado: true,
        })),
        _ => {
            warn!(%email, "verification failed");
            Err((
                StatusCode::BAD_REQUEST,
                "Invalid verification code".into(),
            ))
        }
    }
}

#[instrument(skip(state, payload))]
pub async fn resend_code(
    State(state): State<AppState>,
    Json(payload): Json<ResendCodeRequest>,
) -> StatusCode {
    let email = normalize_email(&payload.email);
    let code = new_verification_code();
    state.users.rotate_verification_code(&email, &code).await;
    // Same answer whether or not the account exists.
    if state.users.find_by_email(&email).await.is_some() {
        deliver_code(&email, &code);
    }
    StatusCode::ACCEPTED
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, (StatusCode, String)> {
    let username = payload.username.trim();

    let user = match state.users.find_by_username(username).await {
        Some(u) => u,
        None => {
            warn!("login unknown username");
            return Err((StatusCode::UNAUTHORIZED, "Invalid credentials".into()));
        }
    };

    let ok = verify_password(&payload.password, &user.password_hash).map_err(|e| {
        error!(error = %e, user_id = %user.id, "verify_password failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    if !ok {
        warn!(user_id = %user.id, "login invalid password");
        return Err((StatusCode::UNAUTHORIZED, "Invalid credentials".into()));
    }

    if !user.email_verificado {
        warn!(user_id = %user.id, "login before email verification");
        return Err((StatusCode::FORBIDDEN, "Email not verified".into()));
    }

    let token = match state
        .users
        .assign_token_if_missing(&user.id, user.token_sesion.as_deref())
        .await
    {
        Ok(t) => t,
        Err(UserStoreError::UserNotFound) => {
            warn!(user_id = %user.id, "user vanished during login");
            return Err((StatusCode::UNAUTHORIZED, "User not found".into()));
        }
    };

    info!(user_id = %user.id, "user logged in");
    Ok(Json(LoginResponse {
        token_sesion: token,
        user: user.into(),
    }))
}

#[instrument(skip_all)]
pub async fn logout(
    State(state): State<AppState>,
    SessionToken(token): SessionToken,
) -> StatusCode {
    state.users.clear_token(&token).await;
    StatusCode::NO_CONTENT
}

#[instrument(skip_all)]
pub async fn get_me(SessionUser(user): SessionUser) -> Json<PublicUser> {
    Json(user.into())
}

#[cfg(test)]
mod handler_tests {
    use super::*;

    fn register_body(username: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.into(),
            email: email.into(),
            password: password.into(),
            telefono: "555-0100".into(),
        }
    }

    async fn stored_code(state: &AppState, username: &str) -> String {
        state
            .users
            .find_by_username(username)
            .await
            .expect("registered")
            .codigo_verificacion
    }

    #[tokio::test]
    async fn register_verify_login_me_logout() {
        let state = AppState::fake();

        let (status, Json(reg)) = register(
            State(state.clone()),
            Json(register_body("alice", "  A@X.com ", "correct-horse")),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(reg.email, "a@x.com");

        // unverified accounts cannot log in
        let err = login(
            State(state.clone()),
            Json(LoginRequest {
                username: "alice".into(),
                password: "correct-horse".into(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::FORBIDDEN);

        let code = stored_code(&state, "alice").await;
        let Json(v) = verify_email(
            State(state.clone()),
            Json(VerifyRequest {
                email: "a@x.com".into(),
                code,
            }),
        )
        .await
        .unwrap();
        assert!(v.email_verificado);

        let Json(first) = login(
            State(state.clone()),
            Json(LoginRequest {
                username: "alice".into(),
                password: "correct-horse".into(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(first.user.username, "alice");

        // a live session is reused
        let Json(second) = login(
            State(state.clone()),
            Json(LoginRequest {
                username: "alice".into(),
                password: "correct-horse".into(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(second.token_sesion, first.token_sesion);

        let me = state.users.find_by_token(&first.token_sesion).await.unwrap();
        let Json(public) = get_me(SessionUser(me)).await;
        assert_eq!(public.email, "a@x.com");
        assert!(public.email_verificado);

        let status = logout(State(state.clone()), SessionToken(first.token_sesion.clone())).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(state.users.find_by_token(&first.token_sesion).await.is_none());
    }

    #[tokio::test]
    async fn register_rejects_bad_input_and_duplicates() {
        let state = AppState::fake();

        let err = register(State(state.clone()), Json(register_body("bob", "not-an-email", "longenough")))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);

        let err = register(State(state.clone()), Json(register_body("bob", "b@x.com", "short")))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);

        let err = register(State(state.clone()), Json(register_body("  ", "b@x.com", "longenough")))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);

        register(State(state.clone()), Json(register_body("bob", "b@x.com", "longenough")))
            .await
            .unwrap();

        let err = register(State(state.clone()), Json(register_body("bob", "other@x.com", "longenough")))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::CONFLICT);

        let err = register(State(state.clone()), Json(register_body("bobby", "B@x.com", "longenough")))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn wrong_code_and_resend() {
        let state = AppState::fake();
        state
            .users
            .create_user(NewUser::new("carol", "c@x.com", "unused", "555-0102", "123456"))
            .await;

        let err = verify_email(
            State(state.clone()),
            Json(VerifyRequest {
                email: "c@x.com".into(),
                code: "000000".into(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);

        let status = resend_code(
            State(state.clone()),
            Json(ResendCodeRequest {
                email: "c@x.com".into(),
            }),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        let rotated = stored_code(&state, "carol").await;
        assert_eq!(rotated.len(), 6);

        let status = resend_code(
            State(state.clone()),
            Json(ResendCodeRequest {
                email: "ghost@x.com".into(),
            }),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn verify_answers_for_the_record_holding_the_code() {
        let state = AppState::fake();
        state
            .users
            .create_user(NewUser::new("erin", "e@x.com", "unused", "555-0104", "111111"))
            .await;
        state
            .users
            .create_user(NewUser::new("erin2", "e@x.com", "unused", "555-0105", "222222"))
            .await;

        let Json(v) = verify_email(
            State(state.clone()),
            Json(VerifyRequest {
                email: "e@x.com".into(),
                code: "222222".into(),
            }),
        )
        .await
        .unwrap();
        assert!(v.email_verificado);
        assert!(state.users.find_by_username("erin2").await.unwrap().email_verificado);
        assert!(!state.users.find_by_username("erin").await.unwrap().email_verificado);

        // an already verified account still needs its own code
        let err = verify_email(
            State(state.clone()),
            Json(VerifyRequest {
                email: "e@x.com".into(),
                code: "999999".into(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn login_rejects_unknown_user() {
        let state = AppState::fake();
        let err = login(
            State(state),
            Json(LoginRequest {
                username: "nobody".into(),
                password: "whatever1".into(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn public_user_hides_credentials() {
        let rec = NewUser::new("dave", "d@x.com", "secret-hash", "555-0103", "424242")
            .into_record("abcdefghi".into());
        let json = serde_json::to_string(&PublicUser::from(rec)).unwrap();
        assert!(json.contains("d@x.com"));
        assert!(!json.contains("secret-hash"));
        assert!(!json.contains("424242"));
    }
}

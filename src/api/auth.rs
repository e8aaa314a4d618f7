use crate::api::AppState;
use crate::api::middleware::AuthUser;
use crate::api::schemas::auth::{
    Ack, AuthSession, ChangePassword, EmailOnly, ResetPassword, Signin, Signup, VerifyOtp,
};
use crate::error::Result;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

/// Registers an unverified account and mails its verification code.
///
/// # Errors
/// Returns `AppError::BadRequest` for missing fields or a malformed email.
/// Returns `AppError::Conflict` if the email is taken.
pub async fn signup(State(state): State<AppState>, Json(payload): Json<Signup>) -> Result<impl IntoResponse> {
    let user = state.account_service.signup(&payload.full_name, &payload.email, &payload.password).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// # Errors
/// Returns `AppError::NotFound` for an unknown email and `AppError::BadRequest` for a wrong or expired code.
pub async fn verify_otp(State(state): State<AppState>, Json(payload): Json<VerifyOtp>) -> Result<impl IntoResponse> {
    let session = state.account_service.verify_otp(&payload.email, &payload.otp).await?;
    Ok(Json(AuthSession::from(session)))
}

/// # Errors
/// Returns `AppError::NotFound`, `AppError::Forbidden` (unverified) or `AppError::AuthError` (bad password).
pub async fn signin(State(state): State<AppState>, Json(payload): Json<Signin>) -> Result<impl IntoResponse> {
    let session = state.account_service.signin(&payload.email, &payload.password).await?;
    Ok(Json(AuthSession::from(session)))
}

pub async fn resend_otp(State(state): State<AppState>, Json(payload): Json<EmailOnly>) -> Result<impl IntoResponse> {
    state.account_service.resend_otp(&payload.email).await?;
    Ok(Json(Ack::new("OTP resent successfully")))
}

pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<EmailOnly>,
) -> Result<impl IntoResponse> {
    state.account_service.forgot_password(&payload.email).await?;
    Ok(Json(Ack::new("Reset link sent successfully")))
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPassword>,
) -> Result<impl IntoResponse> {
    state
        .account_service
        .reset_password(&payload.token, &payload.new_password, &payload.confirm_password)
        .await?;
    Ok(Json(Ack::new("Password reset successfully")))
}

pub async fn signout(auth_user: AuthUser, State(state): State<AppState>) -> Result<impl IntoResponse> {
    state.account_service.signout(auth_user.user_id).await?;
    Ok(Json(Ack::new("Logout successful")))
}

pub async fn change_password(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<ChangePassword>,
) -> Result<impl IntoResponse> {
    state.account_service.change_password(auth_user.user_id, &payload.old_password, &payload.new_password).await?;
    Ok(Json(Ack::new("Password changed successfully")))
}

pub async fn user_details(auth_user: AuthUser, State(state): State<AppState>) -> Result<impl IntoResponse> {
    let user = state.account_service.details(auth_user.user_id).await?;
    Ok(Json(user))
}

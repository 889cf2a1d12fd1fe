//! Client OTP sign-in.

use atrium_core::auth::otp::{ChallengeIssued, Delivery};
use axum::Json;
use axum::extract::State;
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;

use crate::AppState;
use crate::error::AppResult;
use crate::extract::AppJson;
use crate::models::{OtpRequest, OtpSentResponse, OtpVerifyRequest, SessionResponse};
use crate::services::auth::session_response;
use crate::services::cookies::attach_session;

fn sent_response(issued: &ChallengeIssued) -> OtpSentResponse {
    let message = match &issued.delivery {
        Delivery::Sent { .. } => "OTP sent successfully",
        Delivery::Failed { .. } => "OTP generated but SMS delivery failed",
        Delivery::Skipped => "Use the demo OTP to sign in",
    };
    OtpSentResponse {
        success: true,
        message: message.to_string(),
        sms_sent: issued.sms_sent(),
    }
}

/// `POST /api/v1/auth/client/otp/request`
pub async fn request_otp_handler(
    State(state): State<AppState>,
    AppJson(body): AppJson<OtpRequest>,
) -> AppResult<Json<OtpSentResponse>> {
    let issued = state
        .otp
        .request_challenge(&body.phone_number, Utc::now())
        .await?;
    Ok(Json(sent_response(&issued)))
}

/// `POST /api/v1/auth/client/otp/resend`
pub async fn resend_otp_handler(
    State(state): State<AppState>,
    AppJson(body): AppJson<OtpRequest>,
) -> AppResult<Json<OtpSentResponse>> {
    let issued = state
        .otp
        .resend_challenge(&body.phone_number, Utc::now())
        .await?;
    Ok(Json(sent_response(&issued)))
}

/// `POST /api/v1/auth/client/otp/verify`: on success, sets the session cookie.
pub async fn verify_otp_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    AppJson(body): AppJson<OtpVerifyRequest>,
) -> AppResult<(CookieJar, Json<SessionResponse>)> {
    let session = state
        .otp
        .verify_challenge(&body.phone_number, &body.otp, Utc::now())
        .await?;
    let jar = attach_session(
        jar,
        session.principal.kind,
        &session.token,
        state.config.auth.session_ttl.num_seconds(),
        state.config.auth.is_production,
    );
    Ok((jar, Json(session_response(&session))))
}

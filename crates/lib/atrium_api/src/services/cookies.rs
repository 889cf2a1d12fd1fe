//! Session cookies.
//!
//! `token` mirrors the bearer token for every channel. Sales logins also set
//! `sales_token` so the sales front end can hold its own session.

use atrium_core::models::auth::IssuedToken;
use atrium_core::models::principal::PrincipalKind;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration;

/// Primary session cookie.
pub const SESSION_COOKIE: &str = "token";
/// Secondary cookie for the sales channel.
pub const SALES_COOKIE: &str = "sales_token";

/// Build an httpOnly session cookie.
pub fn session_cookie(name: &'static str, token: &str, max_age_secs: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((name, token.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(Duration::seconds(max_age_secs))
        .build()
}

/// Build an expired cookie that clears `name`.
pub fn clear_cookie(name: &'static str, secure: bool) -> Cookie<'static> {
    Cookie::build((name, String::new()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(Duration::ZERO)
        .build()
}

/// Add the cookies for a new session to `jar`.
pub fn attach_session(
    jar: CookieJar,
    kind: PrincipalKind,
    token: &IssuedToken,
    max_age_secs: i64,
    secure: bool,
) -> CookieJar {
    let jar = jar.add(session_cookie(SESSION_COOKIE, &token.token, max_age_secs, secure));
    if kind == PrincipalKind::Sales {
        jar.add(session_cookie(SALES_COOKIE, &token.token, max_age_secs, secure))
    } else {
        jar
    }
}

/// Expire every session cookie.
pub fn clear_session(jar: CookieJar, secure: bool) -> CookieJar {
    jar.add(clear_cookie(SESSION_COOKIE, secure))
        .add(clear_cookie(SALES_COOKIE, secure))
}

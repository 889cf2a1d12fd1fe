//! Route paths.

pub const GET_HEALTH: &str = "/health";

pub const POST_AUTH_CLIENT_OTP_REQUEST: &str = "/api/v1/auth/client/otp/request";
pub const POST_AUTH_CLIENT_OTP_RESEND: &str = "/api/v1/auth/client/otp/resend";
pub const POST_AUTH_CLIENT_OTP_VERIFY: &str = "/api/v1/auth/client/otp/verify";
pub const POST_AUTH_CHANNEL_LOGIN: &str = "/api/v1/auth/{channel}/login";
pub const POST_AUTH_LOGOUT: &str = "/api/v1/auth/logout";
pub const GET_AUTH_ME: &str = "/api/v1/auth/me";

pub const GET_WELCOME: &str = "/api/v1/welcome";
pub const GET_PRINCIPAL: &str = "/api/v1/principals/{kind}/{id}";

pub const POST_ADMIN_STAFF: &str = "/api/v1/admin/staff";
pub const PATCH_ADMIN_PRINCIPAL_ACTIVE: &str = "/api/v1/admin/principals/{kind}/{id}/active";
pub const POST_ADMIN_PRINCIPAL_UNLOCK: &str = "/api/v1/admin/principals/{kind}/{id}/unlock";

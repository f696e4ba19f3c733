use serde::{Deserialize, Serialize};

use crate::users::UserRecord;

/// Request body for account registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub telefono: String,
}

#[derive(Debug, Serialize)]
pub struct RegisteredResponse {
    pub username: String,
    pub email: String,
}

/// Request body for email verification.
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub email: String,
    pub email_verificado: bool,
}

#[derive(Debug, Deserialize)]
pub struct ResendCodeRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token_sesion: String,
    pub user: PublicUser,
}

/// Account fields safe to hand back to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: String,
    pub username: String,
    pub email: String,
    pub telefono: String,
    pub email_verificado: bool,
}

impl From<UserRecord> for PublicUser {
    fn from(u: UserRecord) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            telefono: u.telefono,
            email_verificado: u.email_verificado,
        }
    }
}

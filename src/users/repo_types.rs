use serde::{Deserialize, Serialize};

/// Key under which the whole user collection lives.
pub const USERS_DB_KEY: &str = "users_db";

/// One registered account as persisted under [`USERS_DB_KEY`].
///
/// Field names are part of the stored format and must not be renamed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    pub email: String,
    pub telefono: String,
    pub password_hash: String,       // precomputed by the caller, never checked here
    pub codigo_verificacion: String, // current email code
    #[serde(default)]
    pub email_verificado: bool,
    #[serde(default)]
    pub token_sesion: Option<String>, // at most one live session
}

/// Input for [`crate::users::UserStore::create_user`].
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub telefono: String,
    pub code: String,
}

impl NewUser {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
        telefono: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            telefono: telefono.into(),
            code: code.into(),
        }
    }

    pub(crate) fn into_record(self, id: String) -> UserRecord {
        UserRecord {
            id,
            username: self.username,
            email: self.email,
            telefono: self.telefono,
            password_hash: self.password_hash,
            codigo_verificacion: self.code,
            email_verificado: false,
            token_sesion: None,
        }
    }
}

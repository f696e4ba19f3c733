mod error;
mod ids;
mod repo;
mod repo_types;

pub use error::UserStoreError;
pub use ids::{new_session_token, new_user_id, SESSION_TOKEN_LEN, USER_ID_LEN};
pub use repo::UserStore;
pub use repo_types::{NewUser, UserRecord, USERS_DB_KEY};

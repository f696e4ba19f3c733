use thiserror::Error;

/// The only failure the user store reports. Every other miss is an absent
/// result or a silent no-op.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UserStoreError {
    #[error("User not found")]
    UserNotFound,
}

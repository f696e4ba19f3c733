//! User accounts for the local-persistence demo app: a whole-collection user
//! store over a pluggable key-value medium, plus the small HTTP API that
//! drives it (register, verify email, login, session lookup, logout).

pub mod app;
pub mod auth;
pub mod config;
pub mod state;
pub mod storage;
pub mod users;

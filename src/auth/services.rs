use lazy_static::lazy_static;
use rand::{rngs::OsRng, Rng};
use regex::Regex;
use tracing::info;

pub const VERIFICATION_CODE_LEN: usize = 6;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Six decimal digits, leading zeros kept.
pub fn new_verification_code() -> String {
    let n: u32 = OsRng.gen_range(0..1_000_000);
    format!("{:06}", n)
}

/// Hands a code to the user. There is no mail transport; the code goes to the log.
pub(crate) fn deliver_code(email: &str, code: &str) {
    info!(%email, %code, "verification code issued");
}

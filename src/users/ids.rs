use rand::{rngs::OsRng, Rng};

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

pub const USER_ID_LEN: usize = 9;
pub const SESSION_TOKEN_LEN: usize = 20;

fn base36(len: usize) -> String {
    let mut rng = OsRng;
    (0..len)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect()
}

/// Opaque record id, 9 base-36 characters.
pub fn new_user_id() -> String {
    base36(USER_ID_LEN)
}

/// Opaque session token, 20 base-36 characters.
pub fn new_session_token() -> String {
    base36(SESSION_TOKEN_LEN)
}

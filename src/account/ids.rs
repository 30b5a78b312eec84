//! Opaque identifier generation

use rand::distributions::Alphanumeric;
use rand::Rng;

/// Length of every generated account, token and label id
pub const ID_LEN: usize = 20;

/// Generate an unguessable alphanumeric identifier
pub fn generate() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_LEN)
        .map(char::from)
        .collect()
}

//! Session identifier generation.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use warden_core::SessionId;

/// Prefix carried by every generated session id.
pub const SESSION_ID_PREFIX: &str = "sess-";

/// Random bytes per id; 256 bits keeps collisions cryptographically negligible.
const SESSION_ID_BYTES: usize = 32;

/// Generate a fresh session id from the thread-local CSPRNG.
///
/// The result is `sess-` followed by 43 URL-safe base64 characters, which
/// stays inside the visible-ASCII range transports require.
pub fn generate_session_id() -> SessionId {
    let mut rng = rand::rng();
    let mut bytes = [0u8; SESSION_ID_BYTES];
    rng.fill_bytes(&mut bytes);
    SessionId::new(format!("{SESSION_ID_PREFIX}{}", URL_SAFE_NO_PAD.encode(bytes)))
}

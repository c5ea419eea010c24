//! Room tokens, session ids and derived guest identities.

use rand::Rng;
use rand::distr::Alphanumeric;
use sha2::{Digest, Sha256};

/// Lowercase alphanumerics without the easily confused `l`, `0` and `1`.
const TOKEN_ALPHABET: &[u8] = b"abcdefghijkmnopqrstuvwxyz23456789";

/// Tokens that collide with route segments.
const RESERVED_TOKENS: [&str; 2] = ["settings", "backend"];

/// 255 alphanumerics carry well over 256 bits of entropy.
pub const SESSION_ID_LENGTH: usize = 255;

pub fn room_token<R: Rng + ?Sized>(rng: &mut R, length: usize, digits_only: bool) -> String {
    if digits_only {
        return digit_token(rng, length);
    }
    (0..length)
        .map(|_| TOKEN_ALPHABET[rng.random_range(0..TOKEN_ALPHABET.len())] as char)
        .collect()
}

/// Dial-in friendly: no leading zero and no digit repeated back to back.
fn digit_token<R: Rng + ?Sized>(rng: &mut R, length: usize) -> String {
    let mut out = String::with_capacity(length);
    let mut prev = 0u8;
    for i in 0..length {
        let digit = loop {
            let d = rng.random_range(if i == 0 { 1..10 } else { 0..10 });
            if i == 0 || d != prev {
                break d;
            }
        };
        prev = digit;
        out.push(char::from(b'0' + digit));
    }
    out
}

pub fn is_reserved(token: &str) -> bool {
    RESERVED_TOKENS.contains(&token)
}

pub fn session_id() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_ID_LENGTH)
        .map(char::from)
        .collect()
}

/// Guests have no account; their actor id is the hash of their first session.
pub fn guest_actor_id(session_id: &str) -> String {
    hex::encode(Sha256::digest(session_id.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_token_alphabet() {
        let mut rng = rand::rng();
        for _ in 0..200 {
            let token = room_token(&mut rng, 8, false);
            assert_eq!(token.len(), 8);
            assert!(!token.contains(['l', '0', '1']));
            assert!(token.bytes().all(|b| TOKEN_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn test_digit_tokens() {
        let mut rng = rand::rng();
        for _ in 0..200 {
            let token = room_token(&mut rng, 10, true);
            let bytes = token.as_bytes();
            assert_eq!(bytes.len(), 10);
            assert_ne!(bytes[0], b'0');
            assert!(bytes.windows(2).all(|w| w[0] != w[1]));
            assert!(bytes.iter().all(u8::is_ascii_digit));
        }
    }

    #[test]
    fn test_session_and_guest_ids() {
        let a = session_id();
        let b = session_id();
        assert_eq!(a.len(), SESSION_ID_LENGTH);
        assert_ne!(a, b);

        let guest = guest_actor_id(&a);
        assert_eq!(guest.len(), 64);
        assert_eq!(guest, guest_actor_id(&a));
        assert!(is_reserved("settings"));
        assert!(!is_reserved("abcdefgh"));
    }
}

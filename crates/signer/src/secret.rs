use hookwire_core::WebhookSecret;
use rand_core::{OsRng, RngCore};

/// Length of generated secrets, in characters.
pub const SECRET_LEN: usize = 64;

const ALPHABET: &[u8; 62] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

// Largest multiple of the alphabet size that fits in a byte. Bytes at or
// above it are discarded so every character is equally likely.
const ACCEPT_BELOW: u8 = 248;

/// Generate a fresh endpoint secret from the OS CSPRNG.
pub fn generate_secret() -> WebhookSecret {
    let mut out = String::with_capacity(SECRET_LEN);
    let mut buf = [0u8; 64];
    while out.len() < SECRET_LEN {
        OsRng.fill_bytes(&mut buf);
        for &b in buf.iter().filter(|&&b| b < ACCEPT_BELOW) {
            if out.len() == SECRET_LEN {
                break;
            }
            out.push(char::from(ALPHABET[usize::from(b) % ALPHABET.len()]));
        }
    }
    buf.fill(0);
    WebhookSecret::new(out)
}

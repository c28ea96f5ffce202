use rand::Rng;

/// Generate a secure random session token (32 bytes, hex encoded = 64 characters).
///
/// `thread_rng` is a ChaCha-based CSPRNG reseeded from the OS.
pub fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    hex::encode(bytes)
}

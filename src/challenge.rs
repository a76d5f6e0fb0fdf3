use password_hash::rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};

/// Ids of the challenge pictures; each maps to `{id}.jpg` in the image dir.
pub const CHALLENGE_IMAGES: [&str; 16] = [
    "anchor", "apple", "bell", "boat", "cactus", "candle", "cat", "cloud", "fish", "kite", "leaf",
    "moon", "owl", "pear", "shell", "tree",
];

/// Hex SHA-256 over session token, image id and salt.
pub fn challenge_hash(session_id: &str, image_id: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(session_id.as_bytes());
    hasher.update(image_id.as_bytes());
    hasher.update(salt.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn random_image() -> &'static str {
    let index = OsRng.next_u32() as usize % CHALLENGE_IMAGES.len();
    CHALLENGE_IMAGES[index]
}

/// Finds the image a challenge hash was issued for.
pub fn image_for(session_id: &str, hash: &str, salt: &str) -> Option<&'static str> {
    CHALLENGE_IMAGES
        .into_iter()
        .find(|image| challenge_hash(session_id, image, salt) == hash)
}

/// Checks the answer a customer typed against the hash issued with the form.
pub fn verify(session_id: &str, answer: &str, hash: &str, salt: &str) -> bool {
    !hash.is_empty() && challenge_hash(session_id, answer.trim(), salt) == hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_hex_sha256_of_concatenation() {
        let mut hasher = Sha256::new();
        hasher.update(b"tokenowlpepper");
        let expected = hex::encode(hasher.finalize());
        assert_eq!(challenge_hash("token", "owl", "pepper"), expected);
        assert_eq!(expected.len(), 64);
    }

    #[test]
    fn image_lookup_matches_issued_hash() {
        let hash = challenge_hash("abc", "kite", "salt");
        assert_eq!(image_for("abc", &hash, "salt"), Some("kite"));
        assert_eq!(image_for("other", &hash, "salt"), None);
        assert_eq!(image_for("abc", &hash, "pepper"), None);
    }

    #[test]
    fn verify_requires_matching_answer() {
        let hash = challenge_hash("abc", "moon", "salt");
        assert!(verify("abc", "moon", &hash, "salt"));
        assert!(verify("abc", " moon ", &hash, "salt"));
        assert!(!verify("abc", "sun", &hash, "salt"));
        assert!(!verify("abc", "moon", "", "salt"));
    }

    #[test]
    fn random_image_comes_from_the_set() {
        for _ in 0..32 {
            assert!(CHALLENGE_IMAGES.contains(&random_image()));
        }
    }
}

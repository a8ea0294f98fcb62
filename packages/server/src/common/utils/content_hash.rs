use sha2::{Digest, Sha256};

/// SHA256 of raw bytes, lowercase hex.
///
/// Used as the storage key for uploaded blobs so identical images share one file.
pub fn generate_content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// File extension for a stored blob's content type.
pub fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "bin",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_bytes_same_hash() {
        assert_eq!(
            generate_content_hash(b"sticker"),
            generate_content_hash(b"sticker")
        );
    }

    #[test]
    fn test_different_bytes_different_hash() {
        assert_ne!(
            generate_content_hash(b"sticker-a"),
            generate_content_hash(b"sticker-b")
        );
    }

    #[test]
    fn test_hash_is_hex_sha256() {
        let hash = generate_content_hash(b"");
        assert_eq!(
            hash,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_extension_for() {
        assert_eq!(extension_for("image/png"), "png");
        assert_eq!(extension_for("image/jpg"), "jpg");
        assert_eq!(extension_for("application/octet-stream"), "bin");
    }
}

#[cfg(test)]
mod tests {
    use sectify_core::constants::{BLOB_OVERHEAD, MAC_LEN, SALT_LEN};
    use sectify_core::{CipherError, ProtectedBlob};

    #[test]
    fn test_assemble_then_split_is_identity() {
        let salt = [0x11u8; SALT_LEN];
        let mac = [0x22u8; MAC_LEN];
        let ciphertext = vec![0x33u8; 17];

        let encoded = ProtectedBlob::assemble(&salt, &mac, &ciphertext);
        assert_eq!(encoded.len(), BLOB_OVERHEAD + 17);

        let blob = ProtectedBlob::split(&encoded).expect("split");
        assert_eq!(blob.salt, &salt[..]);
        assert_eq!(blob.mac, &mac[..]);
        assert_eq!(blob.ciphertext, &ciphertext[..]);
    }

    #[test]
    fn test_zero_length_ciphertext_is_valid() {
        let encoded = ProtectedBlob::assemble(&[0u8; SALT_LEN], &[0u8; MAC_LEN], &[]);
        let blob = ProtectedBlob::split(&encoded).expect("split");
        assert!(blob.ciphertext.is_empty());
    }

    #[test]
    fn test_short_input_is_malformed() {
        for len in [0usize, 1, 32, 63] {
            let bytes = vec![0u8; len];
            match ProtectedBlob::split(&bytes) {
                Err(CipherError::MalformedBlob { actual, min }) => {
                    assert_eq!(actual, len);
                    assert_eq!(min, BLOB_OVERHEAD);
                }
                other => panic!("len {len}: expected MalformedBlob, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_fixed_offsets_are_byte_exact() {
        let mut encoded = Vec::new();
        encoded.extend_from_slice(&[0xAA; SALT_LEN]);
        encoded.extend_from_slice(&[0xBB; MAC_LEN]);
        encoded.extend_from_slice(b"ct");

        let blob = ProtectedBlob::split(&encoded).expect("split");
        assert!(blob.salt.iter().all(|&b| b == 0xAA));
        assert!(blob.mac.iter().all(|&b| b == 0xBB));
        assert_eq!(blob.ciphertext, b"ct");
    }
}

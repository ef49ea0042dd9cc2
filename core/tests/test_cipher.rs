#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use sectify_core::constants::{BLOB_OVERHEAD, MAX_PLAINTEXT_LEN};
    use sectify_core::{ChaoticCipher, CipherError, PerformanceMode};

    const PASSWORD: &str = "Str0ng-Pass!";

    // --- Round-trip ---

    #[test]
    fn test_roundtrip_all_modes() {
        let plaintext = b"The quick brown fox jumps over the lazy dog";
        for mode in [PerformanceMode::Fast, PerformanceMode::Balanced, PerformanceMode::Secure] {
            let cipher = ChaoticCipher::new(mode);
            let blob = cipher.encrypt(plaintext, PASSWORD).expect("encrypt");
            assert_eq!(blob.len(), BLOB_OVERHEAD + plaintext.len());
            let recovered = cipher.decrypt(&blob, PASSWORD).expect("decrypt");
            assert_eq!(recovered, plaintext);
        }
    }

    #[test]
    fn test_hello_blob_is_69_bytes() {
        let cipher = ChaoticCipher::new(PerformanceMode::Balanced);
        let blob = cipher.encrypt(b"hello", PASSWORD).expect("encrypt");
        assert_eq!(blob.len(), 69);
        assert_eq!(cipher.decrypt(&blob, PASSWORD).expect("decrypt"), b"hello");
    }

    #[test]
    fn test_empty_plaintext_roundtrip() {
        let cipher = ChaoticCipher::new(PerformanceMode::Fast);
        let blob = cipher.encrypt(b"", PASSWORD).expect("encrypt");
        assert_eq!(blob.len(), BLOB_OVERHEAD);
        assert_eq!(cipher.decrypt(&blob, PASSWORD).expect("decrypt"), b"");
    }

    #[test]
    fn test_fresh_salt_per_encryption() {
        let cipher = ChaoticCipher::new(PerformanceMode::Fast);
        let b1 = cipher.encrypt(b"same input", PASSWORD).expect("encrypt");
        let b2 = cipher.encrypt(b"same input", PASSWORD).expect("encrypt");
        assert_ne!(b1, b2, "salts must be fresh, so blobs must differ");
    }

    // --- Authenticity: any single-byte flip fails before plaintext ---

    #[test]
    fn test_tamper_detected_in_every_region() {
        let cipher = ChaoticCipher::new(PerformanceMode::Balanced);
        let blob = cipher.encrypt(b"hello", PASSWORD).expect("encrypt");

        // One offset inside the salt, the MAC, and the ciphertext each.
        for offset in [0usize, 31, 32, 63, 64, 68] {
            let mut tampered = blob.clone();
            tampered[offset] ^= 0x01;
            match cipher.decrypt(&tampered, PASSWORD) {
                Err(CipherError::IntegrityFailure) => {}
                other => panic!("offset {offset}: expected IntegrityFailure, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_wrong_password_is_integrity_failure() {
        let cipher = ChaoticCipher::new(PerformanceMode::Fast);
        let blob = cipher.encrypt(b"secret audio", PASSWORD).expect("encrypt");
        match cipher.decrypt(&blob, "0ther-Passw0rd!") {
            Err(CipherError::IntegrityFailure) => {}
            other => panic!("expected IntegrityFailure, got {other:?}"),
        }
    }

    // --- Key-strength gating ---

    #[test]
    fn test_weak_key_rejected_before_derivation() {
        let cipher = ChaoticCipher::new(PerformanceMode::Secure);
        // Missing diversity.
        for weak in ["weakpass", "weakpassword", "UPPERCASEONLY", "123456789012"] {
            assert!(matches!(cipher.encrypt(b"data", weak), Err(CipherError::WeakKey)), "{weak}");
            assert!(matches!(cipher.decrypt(&[0u8; 64], weak), Err(CipherError::WeakKey)), "{weak}");
        }
        // Too short despite diversity.
        assert!(matches!(cipher.encrypt(b"data", "Ab1!"), Err(CipherError::WeakKey)));
    }

    // --- Size cap ---

    #[test]
    fn test_oversize_plaintext_rejected() {
        let cipher = ChaoticCipher::new(PerformanceMode::Fast);
        let oversize = vec![0u8; MAX_PLAINTEXT_LEN + 1];
        match cipher.encrypt(&oversize, PASSWORD) {
            Err(CipherError::InputTooLarge { actual, limit }) => {
                assert_eq!(actual, MAX_PLAINTEXT_LEN + 1);
                assert_eq!(limit, MAX_PLAINTEXT_LEN);
            }
            other => panic!("expected InputTooLarge, got {:?}", other.map(|b| b.len())),
        }
    }

    // --- Malformed input ---

    #[test]
    fn test_short_blob_rejected() {
        let cipher = ChaoticCipher::new(PerformanceMode::Fast);
        match cipher.decrypt(&[0u8; 63], PASSWORD) {
            Err(CipherError::MalformedBlob { actual, min }) => {
                assert_eq!(actual, 63);
                assert_eq!(min, 64);
            }
            other => panic!("expected MalformedBlob, got {other:?}"),
        }
    }

    // --- Progress instrumentation ---

    #[test]
    fn test_encrypt_progress_monotonic_to_total() {
        let cipher = ChaoticCipher::new(PerformanceMode::Balanced);
        let plaintext = vec![0xA5u8; 10_000];
        let mut seen = Vec::new();
        let blob = cipher
            .encrypt_with_progress(&plaintext, PASSWORD, &mut |emitted, total| {
                assert_eq!(total, 10_000);
                seen.push(emitted);
            })
            .expect("encrypt");

        assert_eq!(seen.last(), Some(&10_000));
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(cipher.decrypt(&blob, PASSWORD).expect("decrypt"), plaintext);
    }

    // Property-based fuzzing: arbitrary plaintexts survive the round trip
    // in the development profile.
    proptest! {
        #[test]
        fn prop_roundtrip_fast(plaintext in proptest::collection::vec(any::<u8>(), 0..2048)) {
            let cipher = ChaoticCipher::new(PerformanceMode::Fast);
            let blob = cipher.encrypt(&plaintext, PASSWORD).unwrap();
            prop_assert_eq!(cipher.decrypt(&blob, PASSWORD).unwrap(), plaintext);
        }
    }
}

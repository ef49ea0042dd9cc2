#[cfg(test)]
mod tests {
    use std::time::Duration;

    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
    use sectify_service::token::{create_track_token, verify_track_token, TrackClaims, TRACK_TOKEN_TTL};
    use sectify_service::ServiceError;

    const SECRET: &str = "unit-test-secret";

    #[test]
    fn test_roundtrip_with_full_binding() {
        let token = create_track_token(
            SECRET,
            "trk-1",
            Some("203.0.113.7"),
            Some("bytes=0-1023"),
            TRACK_TOKEN_TTL,
        )
        .unwrap();

        verify_track_token(SECRET, &token, "trk-1", Some("203.0.113.7"), Some("bytes=0-1023"))
            .expect("exact binding must verify");
    }

    #[test]
    fn test_unbound_token_ignores_caller_context() {
        let token = create_track_token(SECRET, "trk-1", None, None, TRACK_TOKEN_TTL).unwrap();
        verify_track_token(SECRET, &token, "trk-1", Some("198.51.100.1"), Some("bytes=0-"))
            .expect("no claims bound, nothing to mismatch");
    }

    #[test]
    fn test_track_mismatch_is_forbidden() {
        let token = create_track_token(SECRET, "trk-1", None, None, TRACK_TOKEN_TTL).unwrap();
        match verify_track_token(SECRET, &token, "trk-2", None, None) {
            Err(ServiceError::Forbidden(_)) => {}
            other => panic!("expected Forbidden, got {other:?}"),
        }
    }

    #[test]
    fn test_ip_binding_is_exact() {
        let token =
            create_track_token(SECRET, "trk-1", Some("203.0.113.7"), None, TRACK_TOKEN_TTL).unwrap();

        // No session-style /24 tolerance here: per-request means exact.
        for caller in [Some("203.0.113.8"), None] {
            match verify_track_token(SECRET, &token, "trk-1", caller, None) {
                Err(ServiceError::Forbidden(_)) => {}
                other => panic!("caller {caller:?}: expected Forbidden, got {other:?}"),
            }
        }
        verify_track_token(SECRET, &token, "trk-1", Some("203.0.113.7"), None).unwrap();
    }

    #[test]
    fn test_range_binding_is_byte_exact() {
        let token =
            create_track_token(SECRET, "trk-1", None, Some("bytes=0-1023"), TRACK_TOKEN_TTL)
                .unwrap();

        for caller in [Some("bytes=0-1024"), Some("BYTES=0-1023"), None] {
            match verify_track_token(SECRET, &token, "trk-1", None, caller) {
                Err(ServiceError::Forbidden(_)) => {}
                other => panic!("range {caller:?}: expected Forbidden, got {other:?}"),
            }
        }
        verify_track_token(SECRET, &token, "trk-1", None, Some("bytes=0-1023")).unwrap();
    }

    #[test]
    fn test_garbage_and_wrong_key_are_unauthenticated() {
        match verify_track_token(SECRET, "not-a-jwt", "trk-1", None, None) {
            Err(ServiceError::Unauthenticated(_)) => {}
            other => panic!("expected Unauthenticated, got {other:?}"),
        }

        let token = create_track_token("other-secret", "trk-1", None, None, TRACK_TOKEN_TTL).unwrap();
        match verify_track_token(SECRET, &token, "trk-1", None, None) {
            Err(ServiceError::Unauthenticated(_)) => {}
            other => panic!("expected Unauthenticated, got {other:?}"),
        }
    }

    #[test]
    fn test_stale_token_is_rejected() {
        // Hand-roll claims already past their exp; verification runs with
        // zero leeway.
        let claims = TrackClaims {
            track_id: "trk-1".to_string(),
            exp: chrono::Utc::now().timestamp() - 30,
            ip: None,
            rng: None,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        match verify_track_token(SECRET, &token, "trk-1", None, None) {
            Err(ServiceError::Unauthenticated(_)) => {}
            other => panic!("expected Unauthenticated, got {other:?}"),
        }
    }

    #[test]
    fn test_default_ttl_is_two_minutes() {
        assert_eq!(TRACK_TOKEN_TTL, Duration::from_secs(120));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use sectify_service::session::{SessionManager, MAX_SESSIONS_PER_USER};
    use sectify_service::store::{KeyValueStore, MemoryStore};

    const SECRET: &str = "unit-test-secret";
    const UA: &str = "Mozilla/5.0 (X11; Linux x86_64) unit-test";
    const IP: &str = "192.168.1.10";

    fn manager() -> SessionManager {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        SessionManager::new(store, SECRET, 30)
    }

    #[tokio::test]
    async fn test_create_and_validate_roundtrip() {
        let manager = manager();
        let id = manager.create_session("alice", IP, UA, None).await.unwrap();
        assert_eq!(id.len(), 64);

        let record = manager.validate_session(&id, IP, UA, true).await.unwrap().expect("valid");
        assert_eq!(record.user_id, "alice");
        assert_eq!(record.access_count, 1);
        assert!(record.is_active);

        // Counters move on every use.
        let record = manager.validate_session(&id, IP, UA, true).await.unwrap().expect("valid");
        assert_eq!(record.access_count, 2);
    }

    #[tokio::test]
    async fn test_unknown_session_is_rejected() {
        let manager = manager();
        assert!(manager.validate_session("no-such-id", IP, UA, true).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_session_cap_evicts_oldest() {
        let manager = manager();

        let mut ids = Vec::new();
        for _ in 0..MAX_SESSIONS_PER_USER {
            ids.push(manager.create_session("alice", IP, UA, None).await.unwrap());
        }
        assert_eq!(manager.user_session_count("alice").await.unwrap(), MAX_SESSIONS_PER_USER);

        // The (N+1)-th session succeeds and the oldest stops validating.
        let newest = manager.create_session("alice", IP, UA, None).await.unwrap();
        assert_eq!(manager.user_session_count("alice").await.unwrap(), MAX_SESSIONS_PER_USER);

        assert!(manager.validate_session(&ids[0], IP, UA, true).await.unwrap().is_none());
        assert!(manager.validate_session(&ids[1], IP, UA, true).await.unwrap().is_some());
        assert!(manager.validate_session(&newest, IP, UA, true).await.unwrap().is_some());

        let info = manager.get_session_info(&ids[0]).await.unwrap().expect("audit record");
        assert_eq!(info.revoke_reason.as_deref(), Some("session_limit_exceeded"));
    }

    #[tokio::test]
    async fn test_ip_tolerance_last_octet_only() {
        let manager = manager();
        let id = manager.create_session("alice", "192.168.1.10", UA, None).await.unwrap();

        // Mobile-network tolerance: the 4th octet may change.
        assert!(manager
            .validate_session(&id, "192.168.1.200", UA, true)
            .await
            .unwrap()
            .is_some());
        // Any earlier octet change is rejected.
        assert!(manager.validate_session(&id, "192.168.9.10", UA, true).await.unwrap().is_none());
        // Unless the caller opted out of IP binding.
        assert!(manager.validate_session(&id, "10.0.0.1", UA, false).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_user_agent_change_is_not_fatal() {
        let manager = manager();
        let id = manager.create_session("alice", IP, UA, None).await.unwrap();
        // A browser update changes the UA hash; the session survives.
        assert!(manager
            .validate_session(&id, IP, "Mozilla/5.0 entirely different", true)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_revoked_session_cannot_validate() {
        let manager = manager();
        let id = manager.create_session("alice", IP, UA, None).await.unwrap();

        manager.revoke_session(&id, "manual").await.unwrap();
        assert!(manager.validate_session(&id, IP, UA, true).await.unwrap().is_none());

        // The tombstone stays readable for audit, fingerprint redacted.
        let info = manager.get_session_info(&id).await.unwrap().expect("audit record");
        assert!(!info.is_active);
        assert_eq!(info.revoke_reason.as_deref(), Some("manual"));
        assert!(info.device_fingerprint.is_none());
    }

    #[tokio::test]
    async fn test_revoke_all_except_one() {
        let manager = manager();
        let keep = manager.create_session("alice", IP, UA, None).await.unwrap();
        let drop1 = manager.create_session("alice", IP, UA, None).await.unwrap();
        let drop2 = manager.create_session("alice", IP, UA, None).await.unwrap();
        let other_user = manager.create_session("bob", IP, UA, None).await.unwrap();

        assert_eq!(manager.revoke_user_sessions("alice", Some(&keep)).await.unwrap(), 2);

        assert!(manager.validate_session(&keep, IP, UA, true).await.unwrap().is_some());
        assert!(manager.validate_session(&drop1, IP, UA, true).await.unwrap().is_none());
        assert!(manager.validate_session(&drop2, IP, UA, true).await.unwrap().is_none());
        assert!(manager.validate_session(&other_user, IP, UA, true).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_short_ttl_session_slides_forward() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        // 10-minute TTL sits inside the 30-minute renewal window, so every
        // validation slides the expiry.
        let manager = SessionManager::new(store, SECRET, 10);
        let id = manager.create_session("alice", IP, UA, None).await.unwrap();

        let before = manager.get_session_info(&id).await.unwrap().unwrap().expires_at;
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        let record = manager.validate_session(&id, IP, UA, true).await.unwrap().unwrap();
        assert!(record.expires_at > before, "expiry must slide forward");
    }

    #[tokio::test]
    async fn test_fingerprint_stored_but_redacted_in_info() {
        let manager = manager();
        let id = manager.create_session("alice", IP, UA, Some("fp-123")).await.unwrap();
        let info = manager.get_session_info(&id).await.unwrap().unwrap();
        assert!(info.device_fingerprint.is_none());
    }
}

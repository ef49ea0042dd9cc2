#[cfg(test)]
mod tests {
    use sectify_core::PerformanceMode;
    use sectify_service::config::DEFAULT_MASTER_SECRET;
    use sectify_service::{Config, ServiceError};

    fn production_config() -> Config {
        Config {
            master_secret: "a-real-deployment-secret".to_string(),
            performance_mode: PerformanceMode::Balanced,
            is_production: true,
            ..Config::default()
        }
    }

    #[test]
    fn test_defaults_match_contract() {
        let config = Config::default();
        assert_eq!(config.master_secret, DEFAULT_MASTER_SECRET);
        assert_eq!(config.performance_mode, PerformanceMode::Balanced);
        assert_eq!(config.redis_url, "redis://localhost:6379");
        assert_eq!(config.algorithm, "HS256");
        assert_eq!(config.access_token_expire_minutes, 30);
        assert!(!config.is_production);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_production_refuses_fast_mode() {
        let config = Config { performance_mode: PerformanceMode::Fast, ..production_config() };
        match config.validate() {
            Err(ServiceError::Validation(msg)) => assert!(msg.contains("fast")),
            other => panic!("expected Validation, got {other:?}"),
        }
        // Development keeps the fast profile available.
        let dev = Config { performance_mode: PerformanceMode::Fast, ..Config::default() };
        assert!(dev.validate().is_ok());
    }

    #[test]
    fn test_production_refuses_default_master_secret() {
        let config =
            Config { master_secret: DEFAULT_MASTER_SECRET.to_string(), ..production_config() };
        match config.validate() {
            Err(ServiceError::Validation(msg)) => assert!(msg.contains("SECTIFY_MASTER_SECRET")),
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn test_only_hs256_is_supported() {
        let config = Config { algorithm: "RS256".to_string(), ..Config::default() };
        assert!(matches!(config.validate(), Err(ServiceError::Validation(_))));
    }

    #[test]
    fn test_token_lifetime_must_be_positive() {
        let config = Config { access_token_expire_minutes: 0, ..Config::default() };
        assert!(matches!(config.validate(), Err(ServiceError::Validation(_))));
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("fast".parse::<PerformanceMode>().unwrap(), PerformanceMode::Fast);
        assert_eq!("BALANCED".parse::<PerformanceMode>().unwrap(), PerformanceMode::Balanced);
        assert_eq!("secure".parse::<PerformanceMode>().unwrap(), PerformanceMode::Secure);
        assert!("turbo".parse::<PerformanceMode>().is_err());
    }
}

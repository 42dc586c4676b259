#[cfg(test)]
mod tests {
    use super::super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.generation.default_backend, "your_model");
        assert_eq!(config.generation.call_timeout_ms, 30_000);
        assert_eq!(config.docking.engine.simulated_delay_ms, 1000);
        assert_eq!(config.docking.fetch_policy, FetchPolicy::Placeholder);
        assert_eq!(config.embedding.seed, 42);
        assert!(config.network.enabled);
        assert_eq!(config.network.fetch_timeout_secs, 5);
        assert!(config.history.enabled);
        assert!(config.backends.is_empty());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.generation.default_backend, default_backend());
    }

    #[test]
    fn test_full_file() {
        let toml = r#"
            [generation]
            default_backend = "molt5"
            call_timeout_ms = 1500

            [backends.molt5]
            base_url = "http://localhost:8002"
            api_key = "sk-test"

            [embedding]
            seed = 7
            random_attempts = 1

            [docking]
            simulated_delay_ms = 0
            affinity_seed = 11
            perturbation = [-1.0, 1.0]
            fetch_policy = "strict"
            targets_file = "targets.yaml"

            [network]
            enabled = false
            allowed_domains = ["models.internal"]

            [history]
            path = "/tmp/runs.jsonl"
        "#;
        let config = Config::from_toml_str(toml).unwrap();
        assert_eq!(config.generation.default_backend, "molt5");
        assert_eq!(config.generation.call_timeout_ms, 1500);
        assert_eq!(config.generation.health_timeout_ms, 5_000);
        assert_eq!(config.backends["molt5"].base_url.as_deref(), Some("http://localhost:8002"));
        assert_eq!(config.embedding.seed, 7);
        assert_eq!(config.embedding.max_iterations, 2000);
        assert_eq!(config.docking.engine.simulated_delay_ms, 0);
        assert_eq!(config.docking.engine.affinity_seed, Some(11));
        assert_eq!(config.docking.engine.perturbation, [-1.0, 1.0]);
        assert_eq!(config.docking.fetch_policy, FetchPolicy::Strict);
        assert_eq!(config.docking.targets_file, Some(PathBuf::from("targets.yaml")));
        assert!(!config.network.enabled);
        assert_eq!(config.network.allowed_domains, vec!["models.internal".to_string()]);
        assert_eq!(config.history.path, PathBuf::from("/tmp/runs.jsonl"));

        let key = config.api_key("molt5").unwrap();
        assert_eq!(key.expose_secret(), "sk-test");
    }

    #[test]
    fn test_api_key_env_fallback() {
        let config = Config::default();
        let env = |var: &str| (var == "CHEMFORGE_CHEMBERTA_API_KEY").then(|| "from-env".to_string());
        let key = config.api_key_with("chemberta", env).unwrap();
        assert_eq!(key.expose_secret(), "from-env");
        assert!(config.api_key_with("chemberta", |_| None).is_none());
        assert!(config.api_key_with("chemberta", |_| Some("  ".to_string())).is_none());
    }

    #[test]
    fn test_api_key_from_alias_keyed_section() {
        let config = Config::from_toml_str(
            r#"
            [backends.model_a]
            base_url = "http://localhost:8001"
            api_key = "sk-alias"
            "#,
        )
        .unwrap();
        assert_eq!(config.endpoint("your_model").and_then(|e| e.base_url.as_deref()), Some("http://localhost:8001"));
        let key = config.api_key_with("your_model", |_| None).unwrap();
        assert_eq!(key.expose_secret(), "sk-alias");
        let key = config.api_key_with("primary-model", |_| None).unwrap();
        assert_eq!(key.expose_secret(), "sk-alias");
    }

    #[test]
    fn test_api_key_env_fallback_uses_canonical_name() {
        let config = Config::default();
        let env = |var: &str| (var == "CHEMFORGE_YOUR_MODEL_API_KEY").then(|| "canonical".to_string());
        let key = config.api_key_with("model_a", env).unwrap();
        assert_eq!(key.expose_secret(), "canonical");
    }

    #[test]
    fn test_api_key_env_var_name() {
        assert_eq!(api_key_env_var("your_model"), "CHEMFORGE_YOUR_MODEL_API_KEY");
        assert_eq!(api_key_env_var("auxiliary-model-a"), "CHEMFORGE_AUXILIARY_MODEL_A_API_KEY");
    }

    #[test]
    fn test_empty_default_backend_rejected() {
        assert!(Config::from_toml_str("[generation]\ndefault_backend = \"  \"").is_err());
    }
}

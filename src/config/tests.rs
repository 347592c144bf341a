use super::*;
use std::fs;
use tempfile::TempDir;

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn config_file_persistence() {
        let temp_dir = TempDir::new().expect("should create TempDir successfully");
        let config_path = temp_dir.path().join("config.toml");

        let original_config = Config {
            ollama: OllamaConfig {
                protocol: "https".to_string(),
                host: "test-host".to_string(),
                port: 8080,
                embedding_model: "nomic-embed-text".to_string(),
                generation_model: "mistral".to_string(),
                batch_size: 32,
                retry_attempts: 2,
                timeout_seconds: 10,
            },
            retrieval: RetrievalConfig {
                top_k: 4,
                history_window: 2,
            },
            base_dir: temp_dir.path().to_path_buf(),
            ..Config::default()
        };

        let toml_content = toml::to_string_pretty(&original_config)
            .expect("config should convert to toml string successfully");
        fs::write(&config_path, toml_content).expect("should write to config_path successfully");

        let loaded_config = Config::load(temp_dir.path()).expect("should load config");

        assert_eq!(original_config, loaded_config);
    }

    #[test]
    fn invalid_toml_handling() {
        let invalid_toml = r#"
            [ollama
            host = "localhost"
            port = "invalid_port"
        "#;

        let result: Result<Config, toml::de::Error> = toml::from_str(invalid_toml);
        assert!(result.is_err());
    }

    #[test]
    fn wrong_type_is_rejected() {
        let invalid_toml = r#"
            [ollama]
            port = "eleven"
        "#;

        let result: Result<Config, toml::de::Error> = toml::from_str(invalid_toml);
        assert!(result.is_err());
    }

    #[test]
    fn complete_valid_config() {
        let valid_toml = r#"
            [ollama]
            protocol = "http"
            host = "localhost"
            port = 11434
            embedding_model = "all-minilm:latest"
            generation_model = "phi"
            batch_size = 64

            [generation]
            temperature = 0.7
            context_window = 2048
            stream = false

            [retrieval]
            top_k = 5
            history_window = 3

            [dataset]
            path = "catalog/data.json"
            cache_policy = "rebuild-on-change"

            [assistant]
            name = "Acme Support"
            role = "Acme's support assistant"
        "#;

        let config: Config = toml::from_str(valid_toml).expect("should parse toml successfully");
        assert_eq!(config.ollama.batch_size, 64);
        assert_eq!(config.generation.context_window, 2048);
        assert!(!config.generation.stream);
        assert_eq!(config.retrieval.history_window, 3);
        assert_eq!(
            config.dataset.path,
            std::path::PathBuf::from("catalog/data.json")
        );
        assert_eq!(config.dataset.cache_policy, CachePolicy::RebuildOnChange);
        assert_eq!(config.assistant.name, "Acme Support");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_validation_edge_cases() {
        let mut config = Config::default();
        config.ollama.host = String::new();

        let result = config.validate();
        assert!(result.is_err()); // Empty host should be invalid
    }

    #[test]
    fn ollama_url_generation_with_different_hosts() {
        let configs = vec![
            ("http", "localhost", 11434, "http://localhost:11434/"),
            ("http", "127.0.0.1", 8080, "http://127.0.0.1:8080/"),
            (
                "https",
                "secure.example.com",
                443,
                "https://secure.example.com/",
            ),
        ];

        for (protocol, host, port, expected_url) in configs {
            let mut config = Config::default();
            config.ollama.protocol = protocol.to_string();
            config.ollama.host = host.to_string();
            config.ollama.port = port;

            let url = config.ollama_url().expect("ollama_url is ok");
            assert_eq!(url.as_str(), expected_url);
        }
    }

    #[test]
    fn resolve_data_dir_prefers_override() {
        let temp_dir = TempDir::new().expect("should create TempDir successfully");
        let resolved =
            resolve_data_dir(Some(temp_dir.path().to_path_buf())).expect("override resolves");
        assert_eq!(resolved, temp_dir.path());
    }

    #[test]
    fn error_display_messages() {
        let errors = vec![
            ConfigError::InvalidProtocol("ftp".to_string()),
            ConfigError::InvalidPort(0),
            ConfigError::InvalidBatchSize(0),
            ConfigError::InvalidModel(String::new()),
            ConfigError::InvalidUrl("invalid-url".to_string()),
            ConfigError::InvalidTopK(0),
            ConfigError::EmptyDatasetPath,
        ];

        for error in errors {
            let message = format!("{error}");
            assert!(!message.is_empty());
            assert!(message.len() > 10);
        }
    }
}

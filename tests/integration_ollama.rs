#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Integration tests that require a local Ollama instance with both models pulled
// Run with: cargo test --test integration_ollama -- --ignored

use std::env;
use std::time::Duration;
use support_rag::config::OllamaConfig;
use support_rag::embeddings::Embedder;
use support_rag::generation::{GenerateOptions, GenerateRequest, TextGenerator};
use support_rag::ollama::OllamaClient;
use tracing::{debug, info};

const DEFAULT_OLLAMA_HOST: &str = "localhost";
const DEFAULT_OLLAMA_PORT: u16 = 11434;

fn create_integration_test_client() -> OllamaClient {
    let defaults = OllamaConfig::default();
    let config = OllamaConfig {
        host: env::var("OLLAMA_HOST").unwrap_or_else(|_| DEFAULT_OLLAMA_HOST.to_string()),
        port: env::var("OLLAMA_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_OLLAMA_PORT),
        embedding_model: env::var("OLLAMA_EMBEDDING_MODEL").unwrap_or(defaults.embedding_model),
        generation_model: env::var("OLLAMA_GENERATION_MODEL")
            .unwrap_or(defaults.generation_model),
        batch_size: 5,
        ..OllamaConfig::default()
    };

    OllamaClient::new(&config)
        .expect("Failed to create Ollama client")
        .with_timeout(Duration::from_secs(60))
        .with_retry_attempts(3)
}

fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init()
        .ok();
}

#[test]
#[ignore = "requires a local Ollama instance"]
fn real_ollama_health_check() {
    init_test_tracing();

    let client = create_integration_test_client();
    let result = client.health_check();

    assert!(
        result.is_ok(),
        "Health check should succeed with local Ollama: {:?}",
        result
    );
}

#[test]
#[ignore = "requires a local Ollama instance"]
fn real_ollama_batch_embeddings() {
    init_test_tracing();

    let client = create_integration_test_client();
    let texts = vec![
        "Category: Service | Q: How often should I service my bike? | A: Every 5000 km".to_string(),
        "Category: Pulsar | Model: Pulsar N160 | Engine: 164.82cc".to_string(),
        "Customer Service: Toll-free 1800-102-5555, Email care@example.com, WhatsApp 900".to_string(),
        "Category: Warranty | Q: What does the warranty cover? | A: Manufacturing defects".to_string(),
        "Category: Dominar | Model: Dominar 400 | Engine: 373.3cc".to_string(),
        "Category: Platina | Model: Platina 110 | Engine: 115.45cc".to_string(),
    ];

    info!("Embedding {} texts across batches", texts.len());
    let vectors = client
        .embed_batch(&texts)
        .expect("Batch embedding generation should succeed");

    assert_eq!(vectors.len(), texts.len());
    let dimension = vectors[0].len();
    assert!(dimension > 0);
    assert!(vectors.iter().all(|v| v.len() == dimension));
    debug!("Embedding dimension: {}", dimension);

    let query = client
        .embed("How often should I service my bike?")
        .expect("Query embedding should succeed");
    assert_eq!(query.len(), dimension);
}

#[test]
#[ignore = "requires a local Ollama instance"]
fn real_ollama_streamed_generation() {
    init_test_tracing();

    let client = create_integration_test_client();
    let request = GenerateRequest {
        model: env::var("OLLAMA_GENERATION_MODEL")
            .unwrap_or_else(|_| OllamaConfig::default().generation_model),
        prompt: "Reply with a short greeting.".to_string(),
        options: GenerateOptions {
            temperature: 0.4,
            num_ctx: 1000,
        },
        stream: true,
    };

    let stream = client.generate(&request).expect("Generation should start");
    let mut fragments = 0;
    let mut answer = String::new();
    for fragment in stream {
        answer.push_str(&fragment.expect("Fragment should arrive"));
        fragments += 1;
    }

    info!("Received {} fragments: {}", fragments, answer);
    assert!(fragments > 0);
    assert!(!answer.trim().is_empty());
}

use super::*;
use crate::config::Config;
use crate::embeddings::Embedder;
use crate::generation::{GenerateRequest, TextGenerator, TokenStream};
use crate::indexer::get_or_build_index;
use crate::retrieval::Retriever;
use anyhow::anyhow;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

struct LengthEmbedder;

impl Embedder for LengthEmbedder {
    fn model_name(&self) -> &str {
        "length"
    }

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
    }
}

/// Answers "answer N" for the N-th request and keeps the prompts it saw
#[derive(Default)]
struct ScriptedGenerator {
    prompts: Mutex<Vec<String>>,
}

impl TextGenerator for ScriptedGenerator {
    fn generate(&self, request: &GenerateRequest) -> anyhow::Result<TokenStream> {
        let mut prompts = self.prompts.lock().expect("lock should not be poisoned");
        prompts.push(request.prompt.clone());
        Ok(TokenStream::from_fragments(vec![
            "answer ".to_string(),
            prompts.len().to_string(),
        ]))
    }
}

struct DownGenerator;

impl TextGenerator for DownGenerator {
    fn generate(&self, _request: &GenerateRequest) -> anyhow::Result<TokenStream> {
        Err(anyhow!("Connection refused"))
    }
}

async fn create_test_generator(
    generator: Arc<dyn TextGenerator>,
) -> (ResponseGenerator, TempDir) {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = Config {
        base_dir: temp_dir.path().to_path_buf(),
        ..Config::default()
    };
    let chunks = vec!["faq".to_string(), "contact".to_string()];
    let index = get_or_build_index(&config, &chunks, &LengthEmbedder, false)
        .await
        .expect("index should build");
    let retriever = Arc::new(Retriever::from_index(index, Arc::new(LengthEmbedder)));

    (ResponseGenerator::new(retriever, generator, &config), temp_dir)
}

async fn run_session(
    generator: &ResponseGenerator,
    input: &str,
) -> (String, ConversationHistory) {
    let mut session = ChatSession::new(generator, "Bajaj Auto Customer Care");
    let mut output = Vec::new();
    session
        .run(Cursor::new(input.as_bytes().to_vec()), &mut output)
        .await
        .expect("session should run");

    (
        String::from_utf8(output).expect("output is utf-8"),
        session.history().clone(),
    )
}

#[test]
fn history_recent_window() {
    let mut history = ConversationHistory::new();
    assert!(history.recent(1).is_empty());

    history.push("q1", "a1");
    history.push("q2", "a2");
    history.push("q3", "a3");

    assert_eq!(history.len(), 3);
    assert_eq!(history.recent(1)[0].user, "q3");
    assert_eq!(history.recent(2)[0].user, "q2");
    assert_eq!(history.recent(10).len(), 3);
    assert!(history.recent(0).is_empty());
}

#[tokio::test]
async fn greets_and_exits() {
    let (generator, _temp_dir) = create_test_generator(Arc::new(ScriptedGenerator::default())).await;

    let (output, history) = run_session(&generator, "exit\n").await;

    assert_eq!(
        output,
        "Hi! Welcome to Bajaj Auto Customer Care. Type 'exit' to quit.\n\nYou: "
    );
    assert!(history.is_empty());
}

#[tokio::test]
async fn exit_is_case_insensitive_and_trimmed() {
    let (generator, _temp_dir) = create_test_generator(Arc::new(ScriptedGenerator::default())).await;

    let (_, history) = run_session(&generator, "  EXIT  \nnever answered\n").await;

    assert!(history.is_empty());
}

#[tokio::test]
async fn streams_answers_and_records_history() {
    let scripted = Arc::new(ScriptedGenerator::default());
    let (generator, _temp_dir) =
        create_test_generator(Arc::clone(&scripted) as Arc<dyn TextGenerator>).await;

    let (output, history) = run_session(&generator, "first\n\nsecond\nexit\n").await;

    assert!(output.contains("You: Bajaj Auto Customer Care: answer 1\n\n"));
    assert!(output.contains("You: Bajaj Auto Customer Care: answer 2\n\n"));
    assert_eq!(
        history.recent(2),
        &[
            Exchange {
                user: "first".to_string(),
                assistant: "answer 1".to_string(),
            },
            Exchange {
                user: "second".to_string(),
                assistant: "answer 2".to_string(),
            },
        ]
    );

    // The blank line is skipped and the second prompt carries the first exchange
    let prompts = scripted.prompts.lock().expect("lock should not be poisoned");
    assert_eq!(prompts.len(), 2);
    assert!(!prompts[0].contains("Previous User"));
    assert!(prompts[1].contains("Previous User: first\nPrevious Assistant: answer 1\n"));
}

#[tokio::test]
async fn end_of_input_ends_session() {
    let (generator, _temp_dir) = create_test_generator(Arc::new(ScriptedGenerator::default())).await;

    let (output, history) = run_session(&generator, "only question\n").await;

    assert_eq!(history.len(), 1);
    assert!(output.ends_with("You: \n"));
}

#[tokio::test]
async fn failure_is_printed_and_session_continues() {
    let (generator, _temp_dir) = create_test_generator(Arc::new(DownGenerator)).await;

    let (output, history) = run_session(&generator, "hello\nagain\nexit\n").await;

    assert!(output.contains("Bajaj Auto Customer Care: Error: Could not connect to Ollama ("));
    assert_eq!(history.len(), 2);
    assert!(history.recent(1)[0].assistant.starts_with("Error: Could not connect"));
}

#[test]
fn partial_stream_is_kept() {
    let stream = TokenStream::from_reader(Cursor::new(
        b"{\"response\":\"Half an\",\"done\":false}\n{\"error\":\"out of memory\"}\n".to_vec(),
    ));
    let mut output = Vec::new();

    let answer = render_outcome(GenerationOutcome::Stream(stream), None, &mut output)
        .expect("render should succeed");

    assert_eq!(answer, "Half an");
    assert_eq!(String::from_utf8(output).expect("utf-8"), "Half an\n\n");
}

#[test]
fn failure_renders_with_label() {
    let mut output = Vec::new();

    let answer = render_outcome(
        GenerationOutcome::Failed("Error: nope".to_string()),
        Some("Support"),
        &mut output,
    )
    .expect("render should succeed");

    assert_eq!(answer, "Error: nope");
    assert_eq!(String::from_utf8(output).expect("utf-8"), "Support: Error: nope\n\n");
}

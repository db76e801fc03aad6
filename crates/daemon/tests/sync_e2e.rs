//! End-to-end tests over a real Unix socket: agent service on one side, view
//! core with router and observers on the other.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use vellum_agent::{
	AgentCore, GenerateError, GenerateRequest, GeneratedEdits, Generator, StreamChunk,
};
use vellum_proto::{
	BroadcastEvent, CommandFailure, CommandOutcome, ContentNode, EditOperation, SessionId,
};
use vellum_view::{CommandRouter, SyncConfig, ViewCore};

fn insert(position: usize, text: &str) -> EditOperation {
	EditOperation::Insert {
		position: Some(position),
		content: vec![ContentNode::text(text)],
		description: None,
	}
}

fn delete(from: usize, to: usize) -> EditOperation {
	EditOperation::Delete {
		from: Some(from),
		to: Some(to),
		description: None,
	}
}

/// Inserts `!` at the insertion point and trims the greeting.
struct PunctuateGenerator;

#[async_trait]
impl Generator for PunctuateGenerator {
	async fn generate(&self, _req: GenerateRequest) -> Result<GeneratedEdits, GenerateError> {
		Ok(GeneratedEdits {
			operations: vec![insert(11, "!"), delete(0, 5)],
			message: "punctuated".into(),
		})
	}
}

/// Appends `!` at the end of the current text.
struct AppendGenerator;

#[async_trait]
impl Generator for AppendGenerator {
	async fn generate(&self, req: GenerateRequest) -> Result<GeneratedEdits, GenerateError> {
		Ok(GeneratedEdits {
			operations: vec![insert(req.context.text.chars().count(), "!")],
			message: "appended".into(),
		})
	}
}

/// Streams progress and content before finishing.
struct StreamingGenerator;

#[async_trait]
impl Generator for StreamingGenerator {
	async fn generate(&self, _req: GenerateRequest) -> Result<GeneratedEdits, GenerateError> {
		unreachable!("streaming path only")
	}

	async fn generate_streaming(
		&self,
		req: GenerateRequest,
		chunks: mpsc::UnboundedSender<StreamChunk>,
	) -> Result<GeneratedEdits, GenerateError> {
		let _ = chunks.send(StreamChunk::Progress("drafting".into()));
		let _ = chunks.send(StreamChunk::Content("!".into()));
		let _ = chunks.send(StreamChunk::Operation("append punctuation".into()));
		self::AppendGenerator.generate(req).await
	}
}

/// Takes longer than the router's patience.
struct SlowGenerator;

#[async_trait]
impl Generator for SlowGenerator {
	async fn generate(&self, req: GenerateRequest) -> Result<GeneratedEdits, GenerateError> {
		tokio::time::sleep(Duration::from_millis(200)).await;
		AppendGenerator.generate(req).await
	}
}

async fn retry_connect(path: &Path) -> UnixStream {
	for _ in 0..100 {
		if let Ok(stream) = vellum_daemon::ipc::connect(path).await {
			return stream;
		}
		tokio::time::sleep(Duration::from_millis(10)).await;
	}
	panic!("agent socket never came up");
}

struct Harness {
	agent: Arc<AgentCore>,
	view: Arc<ViewCore>,
	router: CommandRouter,
	shutdown: CancellationToken,
	_dir: tempfile::TempDir,
}

impl Harness {
	/// Boots an agent server and one connected view session.
	async fn start(generator: Arc<dyn Generator>, view_file: Option<&str>) -> Self {
		let dir = tempfile::tempdir().unwrap();
		let socket_path = dir.path().join("agent.sock");

		let agent = AgentCore::new(generator);
		agent.open_document("notes", "Hello world", None).unwrap();

		let shutdown = CancellationToken::new();
		tokio::spawn(vellum_daemon::ipc::serve(
			socket_path.clone(),
			agent.clone(),
			shutdown.clone(),
		));

		let stream = retry_connect(&socket_path).await;
		let view = ViewCore::new(SyncConfig {
			command_timeout: Duration::from_secs(5),
			autosave_debounce: Duration::from_millis(50),
		});
		let (socket, _pump) = vellum_daemon::ipc::start_view_loop(stream, view.clone());
		let router = CommandRouter::new(socket, Duration::from_secs(5));

		assert!(router.subscribe(SessionId(1)).await);

		let content = router.pull_content("notes").await.unwrap();
		assert_eq!(content, "Hello world");
		let path: Option<PathBuf> = view_file.map(|name| dir.path().join(name));
		view.open_document("notes", &content, path).unwrap();

		Self {
			agent,
			view,
			router,
			shutdown,
			_dir: dir,
		}
	}
}

impl Drop for Harness {
	fn drop(&mut self) {
		self.shutdown.cancel();
	}
}

#[tokio::test(flavor = "current_thread")]
async fn command_converges_both_processes_and_persists() {
	let h = Harness::start(Arc::new(PunctuateGenerator), Some("notes.md")).await;
	let mut events = h.view.subscribe();

	let outcome = h
		.view
		.run_command(&h.router, "continue", "notes", "punctuate this", None)
		.await;
	assert!(outcome.success());

	// Both replicas converge on the expected final text.
	assert_eq!(h.view.document_content("notes").unwrap(), " world!");
	assert_eq!(h.agent.document_content("notes").unwrap(), " world!");
	assert_eq!(h.router.pull_content("notes").await.unwrap(), " world!");

	// Observer stream: start, replication, final batch, terminal complete,
	// then the debounced save.
	assert!(matches!(
		events.recv().await,
		Some(BroadcastEvent::Start { .. })
	));
	let Some(BroadcastEvent::OperationsApplied {
		operations,
		revision,
		..
	}) = events.recv().await
	else {
		panic!("expected operationsApplied");
	};
	assert_eq!(operations.len(), 2);
	assert_eq!(revision, 1);
	assert!(matches!(
		events.recv().await,
		Some(BroadcastEvent::LlmOperations { .. })
	));
	assert!(matches!(
		events.recv().await,
		Some(BroadcastEvent::Complete { .. })
	));
	let Some(BroadcastEvent::AutoSave { bytes, .. }) = events.recv().await else {
		panic!("expected autoSave");
	};
	assert_eq!(bytes, " world!".len() as u64);
	assert_eq!(
		std::fs::read_to_string(h._dir.path().join("notes.md")).unwrap(),
		" world!"
	);
}

#[tokio::test(flavor = "current_thread")]
async fn back_to_back_commands_apply_as_whole_batches() {
	let h = Harness::start(Arc::new(AppendGenerator), None).await;

	let first = h
		.view
		.run_command(&h.router, "continue", "notes", "more", None)
		.await;
	let second = h
		.view
		.run_command(&h.router, "continue", "notes", "more", None)
		.await;
	assert!(first.success());
	assert!(second.success());

	assert_eq!(h.view.document_content("notes").unwrap(), "Hello world!!");
	assert_eq!(h.agent.document_content("notes").unwrap(), "Hello world!!");
}

#[tokio::test(flavor = "current_thread")]
async fn streamed_command_events_precede_the_terminal_event() {
	let h = Harness::start(Arc::new(StreamingGenerator), None).await;
	let mut events = h.view.subscribe();

	let outcome = h
		.view
		.run_command(&h.router, "continue", "notes", "stream it", None)
		.await;
	assert!(outcome.success());

	let mut kinds = Vec::new();
	while let Ok(event) = events.try_recv() {
		kinds.push(match event {
			BroadcastEvent::Start { .. } => "start",
			BroadcastEvent::Typing { .. } => "typing",
			BroadcastEvent::Content { .. } => "content",
			BroadcastEvent::Operation { .. } => "operation",
			BroadcastEvent::OperationsApplied { .. } => "applied",
			BroadcastEvent::LlmOperations { .. } => "llm",
			BroadcastEvent::Complete { .. } => "complete",
			other => panic!("unexpected event {other:?}"),
		});
	}

	let pos = |k: &str| kinds.iter().position(|x| *x == k).unwrap();
	assert_eq!(pos("start"), 0);
	assert!(pos("typing") < pos("content"));
	assert!(pos("content") < pos("operation"));
	// Every intermediate event lands before the single terminal event.
	assert_eq!(pos("complete"), kinds.len() - 1);
	assert_eq!(kinds.iter().filter(|k| **k == "complete").count(), 1);
}

#[tokio::test(flavor = "current_thread")]
async fn timed_out_command_fails_and_late_reply_is_discarded() {
	let h = Harness::start(Arc::new(SlowGenerator), None).await;

	// A second view session whose router has no patience.
	let stream = retry_connect(&h._dir.path().join("agent.sock")).await;
	let view2 = ViewCore::new(SyncConfig {
		command_timeout: Duration::from_millis(50),
		autosave_debounce: Duration::from_millis(50),
	});
	let (socket, _pump) = vellum_daemon::ipc::start_view_loop(stream, view2.clone());
	let impatient = CommandRouter::new(socket, Duration::from_millis(50));
	assert!(impatient.subscribe(SessionId(2)).await);
	let content = impatient.pull_content("notes").await.unwrap();
	view2.open_document("notes", &content, None).unwrap();

	let routed = view2
		.run_command(&impatient, "continue", "notes", "too slow", None)
		.await;
	let CommandOutcome::Failed { error, .. } = routed else {
		panic!("expected timeout failure");
	};
	assert_eq!(error, CommandFailure::Timeout);

	// Let the slow generation finish; its late reply must be dropped by the
	// pump while the replication event still lands (the register is shared).
	tokio::time::sleep(Duration::from_millis(400)).await;
	assert_eq!(h.agent.document_content("notes").unwrap(), "Hello world!");

	// Correlation stays healthy for subsequent requests.
	assert_eq!(
		h.router.pull_content("notes").await.unwrap(),
		"Hello world!"
	);
}

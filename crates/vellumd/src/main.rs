//! Vellum daemon binary.
//!
//! Runs either half of the sync core:
//! - the agent process, which owns documents and the generation backend
//! - the view process, which routes commands, mirrors the document, and
//!   emits observer events as JSON lines

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;
use vellum_agent::AgentCore;
use vellum_daemon::CommandGenerator;
use vellum_proto::SessionId;
use vellum_view::{CommandRouter, SyncConfig, ViewCore};

/// Daemon command line arguments.
#[derive(Parser, Debug)]
#[command(name = "vellumd")]
#[command(about = "Vellum document synchronization daemon")]
struct Args {
	/// Verbose logging
	#[arg(short, long, global = true)]
	verbose: bool,

	#[command(subcommand)]
	role: Role,
}

#[derive(Subcommand, Debug)]
enum Role {
	/// Run the agent process: document owner and generation executor.
	Agent {
		/// Socket path for IPC
		#[arg(short, long, value_name = "PATH")]
		socket: Option<PathBuf>,

		/// Document key
		#[arg(short, long, default_value = "scratch")]
		doc: String,

		/// Backing file for the document (memory-only when absent)
		#[arg(short, long, value_name = "PATH")]
		file: Option<PathBuf>,

		/// Generation command line; receives request JSON on stdin and must
		/// print an edits JSON object on stdout
		#[arg(long, value_name = "CMD")]
		generator: String,
	},
	/// Run a view process: command routing, document replica, observers.
	View {
		/// Socket path for IPC
		#[arg(short, long, value_name = "PATH")]
		socket: Option<PathBuf>,

		/// Document key
		#[arg(short, long, default_value = "scratch")]
		doc: String,

		/// Backing file the view persists to on auto-save
		#[arg(short, long, value_name = "PATH")]
		file: Option<PathBuf>,

		/// Route one command with this request text, print the outcome, exit
		#[arg(short, long, value_name = "TEXT")]
		request: Option<String>,

		/// Command tag for --request
		#[arg(short, long, default_value = "continue")]
		command: String,
	},
}

fn default_socket_path() -> PathBuf {
	let runtime_dir = dirs::runtime_dir()
		.or_else(dirs::cache_dir)
		.unwrap_or_else(std::env::temp_dir);
	runtime_dir.join("vellum-agent.sock")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	let subscriber = tracing_subscriber::fmt()
		.with_max_level(if args.verbose {
			tracing::Level::DEBUG
		} else {
			tracing::Level::INFO
		})
		.finish();
	tracing::subscriber::set_global_default(subscriber)?;

	match args.role {
		Role::Agent {
			socket,
			doc,
			file,
			generator,
		} => run_agent(socket, doc, file, generator).await,
		Role::View {
			socket,
			doc,
			file,
			request,
			command,
		} => run_view(socket, doc, file, request, command).await,
	}
}

async fn run_agent(
	socket: Option<PathBuf>,
	doc: String,
	file: Option<PathBuf>,
	generator: String,
) -> Result<(), Box<dyn std::error::Error>> {
	let socket_path = socket.unwrap_or_else(default_socket_path);
	info!(socket = %socket_path.display(), "starting vellum agent");

	let mut parts = generator.split_whitespace().map(str::to_string);
	let command = parts
		.next()
		.ok_or("generator command line must not be empty")?;
	let core = AgentCore::new(Arc::new(CommandGenerator::new(command, parts.collect())));

	let initial = match &file {
		Some(path) if path.exists() => tokio::fs::read_to_string(path).await?,
		_ => String::new(),
	};
	core.open_document(&doc, &initial, file)?;
	info!(doc = %doc, "document opened");

	let shutdown = CancellationToken::new();
	let signal_token = shutdown.clone();
	tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			signal_token.cancel();
		}
	});

	vellum_daemon::ipc::serve(&socket_path, core, shutdown).await?;
	Ok(())
}

async fn run_view(
	socket: Option<PathBuf>,
	doc: String,
	file: Option<PathBuf>,
	request: Option<String>,
	command: String,
) -> Result<(), Box<dyn std::error::Error>> {
	let socket_path = socket.unwrap_or_else(default_socket_path);
	info!(socket = %socket_path.display(), "connecting to vellum agent");

	let stream = vellum_daemon::ipc::connect(&socket_path).await?;
	let core = ViewCore::new(SyncConfig::default());
	let (agent_socket, _pump) = vellum_daemon::ipc::start_view_loop(stream, core.clone());
	let router = CommandRouter::new(agent_socket, SyncConfig::default().command_timeout);

	let session_id = SessionId(u64::from(std::process::id()));
	if !router.subscribe(session_id).await {
		return Err("agent refused subscription".into());
	}

	// Seed the replica from the agent's authoritative content.
	let content = router
		.pull_content(&doc)
		.await
		.ok_or("agent has no such document")?;
	core.open_document(&doc, &content, file)?;
	info!(doc = %doc, chars = content.chars().count(), "replica seeded");

	let mut events = core.subscribe();

	if let Some(request) = request {
		let outcome = core
			.run_command(&router, &command, &doc, &request, None)
			.await;
		println!("{}", serde_json::to_string_pretty(&outcome)?);
		// Drain whatever the command broadcast before exiting.
		while let Ok(event) = events.try_recv() {
			println!("{}", serde_json::to_string(&event)?);
		}
		return Ok(());
	}

	// Observer mode: one JSON object per event until interrupted.
	loop {
		tokio::select! {
			_ = tokio::signal::ctrl_c() => break,
			event = events.recv() => match event {
				Some(event) => println!("{}", serde_json::to_string(&event)?),
				None => break,
			},
		}
	}

	Ok(())
}

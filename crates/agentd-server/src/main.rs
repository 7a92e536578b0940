use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use agentd_contract::{InputMessage, RunChunk};
use agentd_runtime::{Agent, AgentApi, AgentRuntimeBuilder, ChunkStream, RunCancellationToken};
use agentd_server::http::{router, AppState};
use agentd_store_adapters::FileStore;

#[derive(Debug, Parser)]
#[command(name = "agentd-server")]
struct Args {
    #[arg(long, env = "AGENTD_HTTP_ADDR", default_value = "127.0.0.1:8080")]
    http_addr: String,

    /// Data directory for the default file store. Falls back to
    /// `<cwd>/.agent-data` when unset.
    #[arg(long, env = "TEGG_AGENT_DATA_DIR")]
    data_dir: Option<PathBuf>,
}

/// Built-in demo agent: acknowledges the input and reports fixed usage.
/// Used by the e2e suite as a deterministic generator.
struct EchoAgent;

impl Agent for EchoAgent {
    fn exec_run(&self, input: Vec<InputMessage>, _cancel: RunCancellationToken) -> ChunkStream {
        Box::pin(async_stream::stream! {
            let count = input.len();
            yield Ok(RunChunk::assistant_text(format!("Processed {count} messages")));
            yield Ok(RunChunk::usage(10, 5));
        })
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let mut builder = AgentRuntimeBuilder::new(Arc::new(EchoAgent));
    if let Some(data_dir) = args.data_dir {
        builder = builder.with_store(Arc::new(FileStore::new(data_dir)));
    }
    let runtime = match builder.bind().await {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("failed to bind agent runtime: {e}");
            std::process::exit(2);
        }
    };

    let api: Arc<dyn AgentApi> = Arc::new(runtime.clone());
    let app = router(AppState { api });

    let listener = tokio::net::TcpListener::bind(&args.http_addr)
        .await
        .expect("failed to bind http listener");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .expect("http server crashed");

    if let Err(e) = runtime.shutdown().await {
        eprintln!("runtime teardown failed: {e}");
    }
}

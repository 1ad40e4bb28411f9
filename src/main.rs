//! lifespan-demo
//!
//! Runs a sample application behind [`LifespanMiddleware`] through one full
//! startup → request → shutdown cycle, driven by the in-process host.
//!
//! ```text
//!   LifespanHost ──▶ LifespanMiddleware ──▶ DemoApp
//!        │               │ pool lifespan       │ own lifespan (optional)
//!        │ startup ─────▶│ setup ─────────────▶│ setup
//!        │ request ──────┼────────────────────▶│ response
//!        │ shutdown ────▶│ teardown ◀──────────│ teardown
//! ```

use async_trait::async_trait;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use lifespan_middleware::config::{load_config, MiddlewareConfig};
use lifespan_middleware::lifecycle::signals::wait_for_shutdown_signal;
use lifespan_middleware::observability::logging;
use lifespan_middleware::{
    lifespan_fn, AppError, Application, BoxError, LifespanEvent, LifespanHost, LifespanMiddleware,
    Message, MessageReceiver, MessageSender, Scope,
};

#[derive(Parser)]
#[command(name = "lifespan-demo")]
#[command(about = "Run a sample application through a full lifespan cycle", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Make the wrapping lifespan fail during setup.
    #[arg(long)]
    fail_setup: bool,

    /// Make the wrapping lifespan fail during teardown.
    #[arg(long)]
    fail_teardown: bool,

    /// Run an application that does not implement the lifespan handshake.
    #[arg(long)]
    no_inner_lifespan: bool,

    /// Keep serving until Ctrl+C before shutting down.
    #[arg(long)]
    wait: bool,
}

/// Sample application: answers HTTP scopes, optionally speaks lifespan.
struct DemoApp {
    lifespan: bool,
}

#[async_trait]
impl Application for DemoApp {
    async fn call(
        &self,
        scope: Scope,
        mut receive: MessageReceiver,
        send: MessageSender,
    ) -> Result<(), AppError> {
        if scope.is_lifespan() {
            if !self.lifespan {
                return Err(AppError::LifespanUnsupported);
            }
            receive.recv().await?;
            tracing::info!("Demo app warming its cache");
            send.send(LifespanEvent::StartupComplete).await?;
            receive.recv().await?;
            tracing::info!("Demo app flushing its cache");
            return send.send(LifespanEvent::ShutdownComplete).await;
        }

        let path = scope
            .get("path")
            .and_then(|p| p.as_str())
            .unwrap_or("/")
            .to_string();
        receive.recv().await?;
        send.send(Message::new("http.response.start").with("status", 200))
            .await?;
        send.send(Message::new("http.response.body").with("body", format!("hello from {path}")))
            .await
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => MiddlewareConfig::default(),
    };
    logging::init(&config.observability)?;

    tracing::info!("lifespan-demo v0.1.0 starting");
    tracing::info!(
        unsupported = ?config.lifespan.unsupported,
        include_error_chain = config.lifespan.include_error_chain,
        "Configuration loaded"
    );

    let fail_setup = cli.fail_setup;
    let fail_teardown = cli.fail_teardown;
    let pool = lifespan_fn(
        move |_app: Arc<DemoApp>| async move {
            if fail_setup {
                return Err::<u32, BoxError>("database unreachable".into());
            }
            tracing::info!("Connection pool opened");
            Ok(8)
        },
        move |connections: u32| async move {
            if fail_teardown {
                return Err::<(), BoxError>("connection pool refused to close".into());
            }
            tracing::info!(connections, "Connection pool closed");
            Ok(())
        },
    );

    let app = DemoApp {
        lifespan: !cli.no_inner_lifespan,
    };
    let middleware =
        Arc::new(LifespanMiddleware::new(app, pool).with_config(config.lifespan.clone()));
    let mut host = LifespanHost::new(Arc::clone(&middleware));

    let mode = host.start().await?;
    tracing::info!(mode = ?mode, "Host started");

    let sent = host
        .request(
            Scope::http("GET", "/status"),
            vec![Message::new("http.request")],
        )
        .await?;
    for msg in &sent {
        println!("{}", serde_json::to_string(msg)?);
    }

    if cli.wait {
        tracing::info!("Serving, press Ctrl+C to stop");
        wait_for_shutdown_signal().await?;
    }

    host.shutdown().await?;
    tracing::info!(phase = ?middleware.phase(), "Shutdown complete");
    Ok(())
}

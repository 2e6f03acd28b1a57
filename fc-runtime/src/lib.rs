//! The contract between a Function Compute style host and an event function, plus a small host
//! that serves it over the custom runtime HTTP API.
//!
//! A function implements [Handler] and registers it once with [run]:
//! ```ignore
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     fc_runtime::init_tracing();
//!     let echo = |_: &InvocationContext, input: Payload, _: &RequestLogger| Ok::<_, HandlerError>(input);
//!     fc_runtime::run(fc_runtime::handler_fn(echo)).await?;
//!     Ok(())
//! }
//! ```
use config::{Command, Config, LocalConfig};
use std::io::Write;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::filter::{Directive, LevelFilter};
use tracing_subscriber::EnvFilter;

mod config;
pub mod context;
mod error;
mod handler;
mod handlers;
mod logger;
mod payload;
mod runtime;
mod server;

pub use context::{new_request_id, ContextBuilder, Credentials, FunctionMeta, InvocationContext};
pub use error::{ErrorKind, HandlerError, RuntimeError};
pub use handler::{handler_fn, Handler, HandlerFn, InvocationResult};
pub use logger::{
    LogLevel, LogRecord, LogSink, LoggerFactory, MemorySink, RequestLogger, SinkError, TracingLoggerFactory,
    TracingSink,
};
pub use payload::Payload;
pub use runtime::{Invocation, Runtime};

/// Registers the handler and runs the process until it is done.
///
/// - no params: serve the custom runtime API on `FC_SERVER_HOST:FC_SERVER_PORT`, 0.0.0.0:9000 by default
/// - a file name: invoke the handler once with the file contents as the payload and print the output
pub async fn run<H: Handler + 'static>(handler: H) -> Result<(), RuntimeError> {
    let config = Config::from_env()?;
    let runtime = Arc::new(Runtime::new(handler));

    match config.command {
        Command::Help => {
            print_help();
            Ok(())
        }
        Command::Local(local_config) => invoke_local(&runtime, local_config).await,
        Command::Serve => server::serve(runtime, config.listener).await,
    }
}

/// Invokes the handler once with a payload from a local file and writes the output to stdout.
async fn invoke_local(runtime: &Runtime, local_config: LocalConfig) -> Result<(), RuntimeError> {
    let ctx = InvocationContext::builder(new_request_id())
        .function(FunctionMeta {
            name: "local".to_owned(),
            ..Default::default()
        })
        .build()?;

    info!(
        "Invoking with payload from {}, request ID: {}",
        local_config.file_name.display(),
        ctx.request_id()
    );

    let invocation = runtime.invoke(ctx, Payload::from(local_config.payload)).await;
    let output = invocation.result.into_result()?;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(output.as_bytes())?;
    stdout.write_all(b"\n")?;
    stdout.flush()?;

    Ok(())
}

fn print_help() {
    println!("Event function host for Function Compute custom runtimes.");
    println!();
    println!("Serve the custom runtime API: <binary>");
    println!("  FC_SERVER_HOST  listener IP, default 0.0.0.0");
    println!("  FC_SERVER_PORT  listener port, default 9000");
    println!();
    println!("Invoke once with a local payload: <binary> [payload_file], e.g. payload.json");
}

/// Initializes the tracing from RUST_LOG env var if present or sets minimal logging:
/// - INFO for the function binary and this crate
/// - ERROR for everything else
pub fn init_tracing() {
    // find out the name of the binary to set the default logging filter
    // tracing uses target names with underscores, e.g. `echo_function`
    let binary_name = std::env::current_exe()
        .ok()
        .and_then(|path| path.file_stem().map(|name| name.to_string_lossy().replace('-', "_")));

    let mut filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::ERROR.into())
        .from_env_lossy();

    // RUST_LOG takes priority over the defaults
    if std::env::var("RUST_LOG").is_err() {
        for target in binary_name.iter().map(String::as_str).chain(["fc_runtime"]) {
            match Directive::from_str(&[target, "=info"].concat()) {
                Ok(directive) => filter = filter.add_directive(directive),
                // the subscriber is not up yet, so stderr is the only way to report it
                Err(e) => eprintln!("Invalid logging filter for {target}: {e}"),
            }
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(true)
        .with_target(false)
        .compact()
        .init();
}

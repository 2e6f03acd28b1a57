//! A template event function: logs its invocation context and echoes the payload back unchanged.
//! Run with no params to serve the custom runtime API or with a payload file name to invoke it once locally.
use fc_runtime::{init_tracing, run};
use handler::EchoHandler;
use tracing::error;

mod handler;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_tracing();

    if let Err(e) = run(EchoHandler::new()).await {
        error!("Runtime error: {e}");
        return Err(e.into());
    }

    Ok(())
}

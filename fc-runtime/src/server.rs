use crate::error::RuntimeError;
use crate::handlers::custom_runtime_api;
use crate::runtime::Runtime;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// Pause after a failed accept, e.g. when the process is out of file descriptors.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Serves the custom runtime HTTP API on `listener` until the process is killed.
/// Only binding the socket can fail, connection errors are logged and the server keeps going.
pub(crate) async fn serve(runtime: Arc<Runtime>, listener: SocketAddr) -> Result<(), RuntimeError> {
    let listener = Arc::new(TcpListener::bind(listener).await?);
    info!("FunctionCompute custom runtime inited. Listening on http://{}", listener.local_addr()?);

    accept_loop(runtime, move || {
        let listener = listener.clone();
        async move { listener.accept().await }
    })
    .await;

    Ok(())
}

/// Accepts connections from `accept` and serves each one on its own tokio task.
async fn accept_loop<A, F>(runtime: Arc<Runtime>, mut accept: A)
where
    A: FnMut() -> F,
    F: Future<Output = std::io::Result<(TcpStream, SocketAddr)>>,
{
    loop {
        let (stream, peer) = match accept().await {
            Ok(v) => v,
            Err(e) => {
                warn!("Failed to accept a connection: {e}");
                sleep(ACCEPT_ERROR_BACKOFF).await;
                continue;
            }
        };
        let io = TokioIo::new(stream);
        let runtime = runtime.clone();

        tokio::task::spawn(async move {
            // bind the incoming connection to the custom runtime API service
            if let Err(err) = http1::Builder::new()
                .serve_connection(io, service_fn(move |req| custom_runtime_api(runtime.clone(), req)))
                .await
            {
                debug!("TCP error from {peer}: {:?}", err);
            }
        });
    }
}

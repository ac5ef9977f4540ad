use std::io;
use std::net::SocketAddr;

use axum::{
    body::Bytes,
    extract::DefaultBodyLimit,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use tokio::{net::TcpListener, sync::oneshot, task::JoinHandle};
use tracing::{debug, info};

pub mod config;

pub use config::{ConfigError, ServerConfig};

/// Every method on every path is echoed.
pub fn app(config: &ServerConfig) -> Router {
    Router::new()
        .fallback(echo)
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
}

pub async fn run(listener: TcpListener, config: &ServerConfig) -> Result<(), io::Error> {
    axum::serve(listener, app(config)).await
}

/// Responds 200 with the request body, whatever its framing. The request's
/// content type, if any, is carried over.
async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Response {
    debug!(
        %method,
        %uri,
        len = body.len(),
        transfer_encoding = ?headers.get(header::TRANSFER_ENCODING),
        "echoing request body"
    );
    let mut response = (StatusCode::OK, body).into_response();
    if let Some(content_type) = headers.get(header::CONTENT_TYPE) {
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, content_type.clone());
    }
    response
}

/// A running echo server. Dropping the handle also shuts the server down,
/// but only `stop` waits for it to finish.
#[derive(Debug)]
pub struct EchoServer {
    local_addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<Result<(), io::Error>>,
}

impl EchoServer {
    /// Bind `config.host:config.port` and serve on the current runtime.
    pub async fn start(config: ServerConfig) -> Result<Self, io::Error> {
        let listener = TcpListener::bind(config.bind_addr()).await?;
        Self::serve(listener, &config)
    }

    pub fn serve(listener: TcpListener, config: &ServerConfig) -> Result<Self, io::Error> {
        let local_addr = listener.local_addr()?;
        let (shutdown, signal) = oneshot::channel::<()>();
        let app = app(config);
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = signal.await;
                })
                .await
        });
        info!(%local_addr, "echo server started");
        Ok(Self {
            local_addr,
            shutdown,
            task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.local_addr)
    }

    pub async fn stop(self) -> Result<(), io::Error> {
        let _ = self.shutdown.send(());
        let result = self.task.await.map_err(io::Error::other)?;
        info!(local_addr = %self.local_addr, "echo server stopped");
        result
    }
}

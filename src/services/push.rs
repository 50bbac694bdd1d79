//! WebSocket Push Channel
//!
//! Streams safety-check report chunks over a WebSocket. After connecting, the
//! client sends one subscribe frame naming the job; the server then pushes
//! chunk frames and finally a terminal frame.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;
use workorder_safety_core::{CoreError, CoreResult, PushChannel, PushMessage};

use crate::models::settings::AppConfig;
use crate::utils::error::{AppError, AppResult};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens push channels for submitted jobs.
#[async_trait]
pub trait PushConnector: Send + Sync {
    type Channel: PushChannel;

    async fn connect(&self, job_id: &str) -> CoreResult<Self::Channel>;
}

/// Frame sent once after connecting to subscribe to a job's stream.
pub fn subscribe_frame(job_id: &str) -> String {
    json!({ "action": "subscribe", "requestId": job_id }).to_string()
}

/// A connected WebSocket subscribed to one job.
pub struct WebSocketChannel {
    job_id: String,
    socket: Socket,
    closed: bool,
}

impl WebSocketChannel {
    /// Connect to `url`, authenticate with `auth_token` if given, and
    /// subscribe to `job_id`.
    pub async fn connect(url: &str, job_id: &str, auth_token: Option<&str>) -> CoreResult<Self> {
        let mut request = url
            .into_client_request()
            .map_err(|e| CoreError::transport(format!("invalid push endpoint '{}': {}", url, e)))?;
        if let Some(token) = auth_token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| CoreError::validation(format!("invalid auth token: {}", e)))?;
            request.headers_mut().insert("Authorization", value);
        }

        let (mut socket, _response) = connect_async(request)
            .await
            .map_err(|e| CoreError::transport(format!("push connect to {} failed: {}", url, e)))?;

        socket
            .send(Message::Text(subscribe_frame(job_id)))
            .await
            .map_err(|e| CoreError::transport(format!("push subscribe failed: {}", e)))?;
        debug!(job_id, url, "push channel subscribed");

        Ok(Self {
            job_id: job_id.to_string(),
            socket,
            closed: false,
        })
    }
}

impl std::fmt::Debug for WebSocketChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketChannel")
            .field("job_id", &self.job_id)
            .field("closed", &self.closed)
            .finish()
    }
}

#[async_trait]
impl PushChannel for WebSocketChannel {
    async fn next_message(&mut self) -> Option<CoreResult<PushMessage>> {
        if self.closed {
            return None;
        }
        loop {
            let frame = match self.socket.next().await {
                Some(Ok(frame)) => frame,
                Some(Err(e)) => {
                    self.closed = true;
                    return Some(Err(CoreError::transport(format!(
                        "push channel read failed: {}",
                        e
                    ))));
                }
                None => {
                    self.closed = true;
                    return None;
                }
            };

            match frame {
                Message::Text(text) => return Some(PushMessage::parse(&text)),
                Message::Binary(bytes) => {
                    return Some(match std::str::from_utf8(&bytes) {
                        Ok(text) => PushMessage::parse(text),
                        Err(e) => Err(CoreError::validation(format!(
                            "binary push frame is not UTF-8: {}",
                            e
                        ))),
                    })
                }
                Message::Close(reason) => {
                    debug!(job_id = %self.job_id, ?reason, "push channel closed by server");
                    self.closed = true;
                    // Flushes the queued close reply.
                    let _ = self.socket.close(None).await;
                    return None;
                }
                // Pings are answered by tungstenite on the next read.
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            }
        }
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.socket.close(None).await {
            debug!(job_id = %self.job_id, error = %e, "push channel close failed");
        }
    }
}

/// Connects `WebSocketChannel`s to the configured push endpoint.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: String,
    auth_token: Option<String>,
}

impl WebSocketConnector {
    pub fn new(url: impl Into<String>, auth_token: Option<String>) -> Self {
        Self {
            url: url.into(),
            auth_token,
        }
    }

    /// Connector for `config.websocket_endpoint`.
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let url = config
            .websocket_endpoint
            .clone()
            .ok_or_else(|| AppError::config("websocket_endpoint is not configured"))?;
        Ok(Self::new(url, config.auth_token.clone()))
    }
}

#[async_trait]
impl PushConnector for WebSocketConnector {
    type Channel = WebSocketChannel;

    async fn connect(&self, job_id: &str) -> CoreResult<WebSocketChannel> {
        WebSocketChannel::connect(&self.url, job_id, self.auth_token.as_deref()).await
    }
}

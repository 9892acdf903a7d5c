// crates/netconf-wbem/src/listener.rs
// ============================================================================
// Module: Indication Listener
// Description: HTTP export listener receiving CIM indications.
// Purpose: Queue indications delivered by the CIMOM for suites to await.
// Dependencies: axum, tokio
// ============================================================================

//! ## Overview
//! [`IndicationListener::start`] binds `0.0.0.0:<port>` and answers every
//! `POST` carrying a CIM-XML export request with `SIMPLEEXPRSP`. Decoded
//! indications are pushed into an unbounded channel read through
//! [`IndicationQueue`]. Dropping the listener shuts the server down.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::Ipv4Addr;
use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderName;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::post;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::codec::decode_export_request;
use crate::codec::export_response;
use crate::error::WbemError;
use crate::model::CimInstance;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Message of the timeout error raised while waiting.
pub const INDICATION_TIMEOUT_MESSAGE: &str = "Timeout when waiting for indication";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Handle of a running listener.
#[derive(Debug)]
pub struct IndicationListener {
    /// Bound address.
    addr: SocketAddr,
    /// Shutdown trigger.
    shutdown: Option<oneshot::Sender<()>>,
    /// Server task.
    task: Option<JoinHandle<()>>,
}

/// Receiving side of the indication channel.
#[derive(Debug)]
pub struct IndicationQueue {
    /// Channel receiver.
    receiver: mpsc::UnboundedReceiver<CimInstance>,
}

/// Shared handler state.
#[derive(Clone)]
struct ListenerState {
    /// Channel sender.
    sender: mpsc::UnboundedSender<CimInstance>,
}

// ============================================================================
// SECTION: Listener
// ============================================================================

impl IndicationListener {
    /// Binds the port and starts serving on the current runtime.
    ///
    /// Port `0` picks a free port; see [`IndicationListener::port`].
    ///
    /// # Errors
    ///
    /// Returns [`WbemError::Listener`] when the port cannot be bound.
    pub async fn start(port: u16) -> Result<(Self, IndicationQueue), WbemError> {
        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map_err(|err| WbemError::Listener(format!("bind port {port}: {err}")))?;
        let addr = listener.local_addr().map_err(|err| WbemError::Listener(err.to_string()))?;
        let (sender, receiver) = mpsc::unbounded_channel();
        let app = Router::new()
            .route("/", post(handle_export))
            .route("/{*path}", post(handle_export))
            .with_state(ListenerState {
                sender,
            });
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = server.await;
        });
        Ok((
            Self {
                addr,
                shutdown: Some(shutdown_tx),
                task: Some(task),
            },
            IndicationQueue {
                receiver,
            },
        ))
    }

    /// Returns the bound port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Returns true while the server task is alive.
    #[must_use]
    pub fn running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stops the server and waits for it to finish.
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for IndicationListener {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ============================================================================
// SECTION: Queue
// ============================================================================

impl IndicationQueue {
    /// Waits up to `timeout` for the next indication.
    ///
    /// # Errors
    ///
    /// Returns [`WbemError::Timeout`] when nothing arrives in time and
    /// [`WbemError::Listener`] when the listener is gone.
    pub async fn next(&mut self, timeout: Duration) -> Result<CimInstance, WbemError> {
        match tokio::time::timeout(timeout, self.receiver.recv()).await {
            Ok(Some(indication)) => Ok(indication),
            Ok(None) => Err(WbemError::Listener("listener stopped".to_string())),
            Err(_) => Err(WbemError::Timeout(INDICATION_TIMEOUT_MESSAGE.to_string())),
        }
    }

    /// Discards indications already queued and returns how many were dropped.
    pub fn drain(&mut self) -> usize {
        let mut dropped = 0;
        while self.receiver.try_recv().is_ok() {
            dropped += 1;
        }
        dropped
    }
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Accepts one export request.
async fn handle_export(State(state): State<ListenerState>, body: Bytes) -> Response {
    let Ok(text) = std::str::from_utf8(&body) else {
        return reject("request-not-well-formed");
    };
    let Ok(request) = decode_export_request(text) else {
        return reject("request-not-valid");
    };
    for indication in request.indications {
        let _ = state.sender.send(indication);
    }
    (
        StatusCode::OK,
        [
            (CONTENT_TYPE, "application/xml; charset=\"utf-8\""),
            (HeaderName::from_static("cimexport"), "MethodResponse"),
        ],
        export_response(&request.message_id),
    )
        .into_response()
}

/// Builds a `400` with a `CIMError` header.
fn reject(reason: &'static str) -> Response {
    (StatusCode::BAD_REQUEST, [(HeaderName::from_static("cimerror"), reason)]).into_response()
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for protocol connections.
//!
//! Accepts until the shutdown token fires, spawning a task per
//! connection. Each connection is one [`Session`]: a loop of framed
//! request/reply pairs with its own fid table. Requests are handled
//! one at a time per connection; clients that stream a blocking read
//! (`state`, `err`) use a dedicated connection for it.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use outpost_wire::{decode, read_frame, write_frame, ProtocolError, Reply, Request};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::dispatch::Session;
use crate::server::Root;

/// Bound on reply writes so a stuck client cannot wedge its session.
const WRITE_TIMEOUT: Duration = Duration::from_secs(30);

pub struct Listener {
    tcp: TcpListener,
    root: Arc<Root>,
    shutdown: CancellationToken,
}

impl Listener {
    pub fn new(tcp: TcpListener, root: Arc<Root>, shutdown: CancellationToken) -> Self {
        Self { tcp, root, shutdown }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.tcp.local_addr()
    }

    /// Accept loop; returns when the shutdown token fires.
    pub async fn run(self) {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("listener shutting down");
                    return;
                }
                result = self.tcp.accept() => match result {
                    Ok((stream, addr)) => {
                        debug!(%addr, "connection");
                        let root = Arc::clone(&self.root);
                        tokio::spawn(async move {
                            if let Err(e) = serve_connection(stream, root).await {
                                debug!(error = %e, "connection ended");
                            }
                        });
                    }
                    Err(e) => error!(error = %e, "accept error"),
                },
            }
        }
    }
}

/// One framed request/reply session. A request that does not decode
/// gets the default error reply; the frame boundary survives, so the
/// session keeps going.
async fn serve_connection(stream: TcpStream, root: Arc<Root>) -> Result<(), ProtocolError> {
    let (mut reader, mut writer) = stream.into_split();
    let mut session = Session::new(root);
    loop {
        let payload = match read_frame(&mut reader).await {
            Ok(payload) => payload,
            Err(ProtocolError::ConnectionClosed) => {
                debug!("client disconnected");
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        let reply = match decode::<Request>(&payload) {
            Ok(request) => {
                debug!(request = ?request, "received request");
                session.handle(request).await
            }
            Err(e) => {
                debug!(error = %e, "undecodable request");
                Reply::error("unknown request")
            }
        };
        write_frame(&mut writer, &reply, WRITE_TIMEOUT).await?;
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Commands Server (spec §4.7, C8): a Unix-domain-socket listener that
//! spawns one worker task per accepted connection, each handling exactly
//! one request/response round trip, bounded by a counting semaphore on
//! `max_clients`.

use std::sync::Arc;

use dal_plugin::VmPlugin;
use dal_wire::{read_request, write_response, ProtocolError};
use tokio::io::AsyncWriteExt;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use dal_engine::Engine;

/// Runs the accept loop until the listener errors out or is dropped
/// (shutdown closes the socket from outside this task).
pub async fn run<P: VmPlugin + 'static>(listener: UnixListener, engine: Arc<Engine<P>>, max_clients: usize) {
    let permits = Arc::new(Semaphore::new(max_clients));
    loop {
        let (stream, _addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                warn!(%err, "accept failed, stopping commands server");
                return;
            }
        };

        let engine = engine.clone();
        let permits = permits.clone();
        tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else { return };
            if let Err(err) = handle_connection(stream, &engine).await {
                log_connection_error(err);
            }
        });
    }
}

/// One request/response round trip over a single accepted connection
/// (spec §4.7's 4-step worker protocol).
async fn handle_connection<P: VmPlugin>(mut stream: UnixStream, engine: &Engine<P>) -> Result<(), ProtocolError> {
    let request = read_request(&mut stream).await?;
    debug!(?request, "received request");

    let response = engine.handle_request(request).await;
    info!(status = ?response.status, "dispatched request");

    write_response(&mut stream, &response).await?;
    let _ = stream.shutdown().await;
    Ok(())
}

fn log_connection_error(err: ProtocolError) {
    match &err {
        ProtocolError::Io(io_err) if io_err.kind() == std::io::ErrorKind::UnexpectedEof => {
            debug!("client disconnected before sending a full request");
        }
        other => warn!(err = %other, "connection error"),
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;

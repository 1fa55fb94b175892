//! Newline-delimited JSON bridge between a host shell and the worker.
//!
//! Each input line is a [`Request`]; each is answered, in order, with one
//! [`MessageResponse`] line. [`HostEvent`]s (notifications) are interleaved
//! on the same output as they occur.
//!
//! Stdout is reserved for the protocol; diagnostics must go to stderr.

use crate::error::{Result, TodoError};
use crate::host::channel::MessageClient;
use crate::host::contract::{HostEvent, MessageResponse, Request};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::{Mutex, mpsc};

/// Run the bridge over the process's stdin and stdout until stdin closes.
pub async fn run_stdio_bridge(
    client: MessageClient,
    events: mpsc::UnboundedReceiver<HostEvent>,
) -> Result<()> {
    run_bridge(
        BufReader::new(tokio::io::stdin()),
        BufWriter::new(tokio::io::stdout()),
        client,
        events,
    )
    .await
}

/// Run the bridge over arbitrary streams until `input` reaches EOF.
pub async fn run_bridge<R, W>(
    input: R,
    output: W,
    client: MessageClient,
    mut events: mpsc::UnboundedReceiver<HostEvent>,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let writer = Arc::new(Mutex::new(output));

    let event_writer = Arc::clone(&writer);
    let event_handle = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    tracing::error!(error = %e, "failed to serialize host event; skipping");
                    continue;
                }
            };
            let mut w = event_writer.lock().await;
            if let Err(e) = write_line(&mut *w, &json).await {
                tracing::warn!(error = %e, "failed to write host event; stopping event forwarder");
                break;
            }
        }
    });

    let result = run_reader(input, client, Arc::clone(&writer)).await;

    event_handle.abort();
    let _ = event_handle.await;
    result
}

async fn run_reader<R, W>(mut input: R, client: MessageClient, writer: Arc<Mutex<W>>) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        let bytes_read = input
            .read_line(&mut line)
            .await
            .map_err(|e| TodoError::Channel(format!("failed to read request line: {e}")))?;
        if bytes_read == 0 {
            tracing::info!("input closed (EOF); shutting down bridge");
            return Ok(());
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(trimmed) {
            Ok(request) => match client.send(request).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::error!(error = %e, "request dispatch failed");
                    MessageResponse::error(e.to_string())
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, raw_line = %trimmed, "failed to parse request");
                MessageResponse::error(format!("invalid request: {e}"))
            }
        };

        let json = serde_json::to_string(&response)?;
        let mut w = writer.lock().await;
        write_line(&mut *w, &json).await?;
    }
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, json: &str) -> Result<()> {
    writer
        .write_all(json.as_bytes())
        .await
        .map_err(|e| TodoError::Channel(format!("failed to write output: {e}")))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| TodoError::Channel(format!("failed to write newline: {e}")))?;
    writer
        .flush()
        .await
        .map_err(|e| TodoError::Channel(format!("failed to flush output: {e}")))
}

//! Stdio relay between the launcher and its child's channel.

use anyhow::{Context, Result};
use std::os::unix::net::UnixStream as StdUnixStream;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::UnixStream;
use tracing::debug;

/// Byte counts moved in each direction.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RelayStats {
    pub to_child: u64,
    pub from_child: u64,
}

/// Relay this process's stdin/stdout over `channel`.
pub async fn relay_stdio(channel: StdUnixStream) -> Result<RelayStats> {
    relay(channel, tokio::io::stdin(), tokio::io::stdout()).await
}

/// Copy `input` into the channel and the channel into `output`.
///
/// When `input` reaches EOF the channel's write side is shut down so the
/// child sees EOF too. The relay finishes once the child closes its end; a
/// child that stops reading early does not fail the relay.
pub async fn relay<R, W>(channel: StdUnixStream, mut input: R, mut output: W) -> Result<RelayStats>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin,
{
    channel
        .set_nonblocking(true)
        .context("Failed to make channel non-blocking")?;
    let stream = UnixStream::from_std(channel).context("Failed to register channel")?;
    let (mut reader, mut writer) = stream.into_split();

    let upstream = tokio::spawn(async move {
        let copied = tokio::io::copy(&mut input, &mut writer).await;
        let _ = writer.shutdown().await;
        copied
    });

    let from_child = tokio::io::copy(&mut reader, &mut output)
        .await
        .context("Failed to read from child channel")?;
    output.flush().await.context("Failed to flush output")?;

    let to_child = if upstream.is_finished() {
        match upstream.await {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => {
                debug!("Input relay stopped: {}", e);
                0
            }
            Err(e) => return Err(e).context("Input relay task failed"),
        }
    } else {
        // The child is gone; pending input has nowhere to go.
        upstream.abort();
        0
    };

    debug!("Relay finished: {} bytes in, {} bytes out", to_child, from_child);
    Ok(RelayStats {
        to_child,
        from_child,
    })
}

//! Child-side echo peer.
//!
//! Adopts the channel descriptor it was handed and writes every byte it
//! receives straight back until the parent half-closes the channel.

use bridge_common::{Error, ResultExt};
use bridge_process::adopt_endpoint;
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use tracing::{debug, info};

pub fn run_echo(fd_arg: &str) -> anyhow::Result<u64> {
    let stream = adopt_endpoint(fd_arg)
        .context(format!("Failed to adopt channel descriptor {}", fd_arg))?;
    info!("Echoing on inherited channel fd {}", fd_arg.trim());
    Ok(echo(stream)?)
}

fn echo(mut stream: UnixStream) -> bridge_common::Result<u64> {
    let mut buf = [0u8; 8192];
    let mut total = 0u64;
    loop {
        let n = match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::from(e).context("Failed to read from channel")),
        };
        debug!("Echoing {}", bridge_common::log_escape([&buf[..n]]));
        stream
            .write_all(&buf[..n])
            .context("Failed to write to channel")?;
        total += n as u64;
    }
    debug!("Channel closed after {} bytes", total);
    Ok(total)
}

// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! One-shot client for the daemon socket.

use crate::protocol::{self, Request, Response};
use std::io::{self, BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;

const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Send `cmd` to the daemon at `socket_path` and return the raw response
/// line.
pub fn send_command(socket_path: &Path, cmd: &str) -> io::Result<String> {
    let mut stream = UnixStream::connect(socket_path)?;
    stream.set_read_timeout(Some(READ_TIMEOUT))?;

    let encoded = protocol::encode(&Request::new(cmd)).map_err(|e| {
        io::Error::new(io::ErrorKind::InvalidData, format!("Encode error: {e}"))
    })?;
    stream.write_all(encoded.as_bytes())?;
    stream.flush()?;

    let mut line = String::new();
    let n = BufReader::new(stream).read_line(&mut line)?;
    if n == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "daemon closed the connection without a response",
        ));
    }
    Ok(line)
}

/// Pretty-print a response line if it follows the response schema,
/// otherwise return it as received.
pub fn render(raw: &str) -> String {
    protocol::decode::<Response>(raw)
        .ok()
        .and_then(|resp| serde_json::to_string_pretty(&resp).ok())
        .unwrap_or_else(|| raw.trim_end().to_string())
}

// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! env_logger setup for the daemon log file.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Short level tag used in log lines.
pub fn level_tag(level: log::Level) -> &'static str {
    match level {
        log::Level::Error => "ERR",
        log::Level::Warn => "WRN",
        log::Level::Info => "INF",
        log::Level::Debug => "DBG",
        log::Level::Trace => "TRC",
    }
}

/// Appends to the log file, optionally copying every write to stderr.
pub struct LogSink {
    file: File,
    mirror: bool,
}

impl LogSink {
    pub fn open(path: &Path, mirror: bool) -> io::Result<Self> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file, mirror })
    }
}

impl Write for LogSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write_all(buf)?;
        if self.mirror {
            let _ = io::stderr().write_all(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.sync_data()
    }
}

fn builder(default_filter: &str) -> env_logger::Builder {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter));
    builder.format(|buf, record| {
        writeln!(
            buf,
            "[{}] {}: {}",
            buf.timestamp_seconds(),
            level_tag(record.level()),
            record.args()
        )
    });
    builder
}

/// Log to `path`, mirroring to stderr when `mirror` is set. Falls back to
/// stderr alone if the file cannot be opened.
pub fn init_daemon(path: &Path, mirror: bool) {
    let mut builder = builder("info");
    let open_err = match LogSink::open(path, mirror) {
        Ok(sink) => {
            builder.target(env_logger::Target::Pipe(Box::new(sink)));
            None
        }
        Err(e) => {
            builder.target(env_logger::Target::Stderr);
            Some(e)
        }
    };
    builder.init();

    if let Some(e) = open_err {
        log::warn!("Could not open log file {}: {e}, logging to stderr", path.display());
    }
}

/// Client-side logging: stderr, warnings and above by default.
pub fn init_client() {
    builder("warn").init();
}

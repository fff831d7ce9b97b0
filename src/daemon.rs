// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! The daemon shell: owns the controller behind one lock, drives it from a
//! one-second tick and serves control requests on a Unix socket.

use crate::actuator::{self, Actuator};
use crate::config::Config;
use crate::controller::ControllerState;
use crate::curve::FanCurveSpec;
use crate::protocol::{self, Command, Request, Response};
use crate::sensors::{SysSource, TemperatureSource};
use std::io;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{Notify, RwLock};
use tokio::time::{self, Duration, MissedTickBehavior};

/// Socket file mode.
pub const SOCKET_MODE: u32 = 0o660;

/// How long a client may take to send its request line.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Longest request accepted. Anything past it is cut off and fails to parse.
pub const MAX_REQUEST_BYTES: u64 = 4096;

// ---------------------------------------------------------------------------
// Shared daemon state
// ---------------------------------------------------------------------------

pub struct Daemon {
    state: RwLock<ControllerState>,
    actuator: Box<dyn Actuator>,
    request_timeout: Duration,
}

pub type SharedDaemon = Arc<Daemon>;

impl Daemon {
    pub fn new(state: ControllerState, actuator: Box<dyn Actuator>) -> Self {
        Self {
            state: RwLock::new(state),
            actuator,
            request_timeout: REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Build the controller and actuator described by `config`.
    pub fn from_config(config: &Config) -> io::Result<Self> {
        let curve = FanCurveSpec::new(&config.breakpoints)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let state = ControllerState::new(curve, &config.control);
        let actuator = actuator::select(&config.actuator.program, config.actuator.dry_run);
        Ok(Self::new(state, actuator))
    }

    pub fn state(&self) -> &RwLock<ControllerState> {
        &self.state
    }

    /// Run one control step with an already sampled temperature.
    ///
    /// The write lock is held across the actuator call so a `status` issued
    /// after the tick returns always sees its result.
    pub async fn tick(&self, temp: f64) {
        let mut st = self.state.write().await;
        st.tick(temp, self.actuator.as_ref());
    }

    /// Hand control back to the firmware, used on shutdown.
    pub async fn restore_auto(&self) {
        let _st = self.state.write().await;
        if let Err(e) = self.actuator.set_auto() {
            log::warn!("Failed to restore automatic fan control: {e}");
        }
    }
}

// ---------------------------------------------------------------------------
// Main entry
// ---------------------------------------------------------------------------

/// Bind the socket, start the control loop and serve clients until SIGINT
/// or SIGTERM.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let daemon: SharedDaemon = Arc::new(Daemon::from_config(&config)?);
    let socket_path = config.socket_path();

    let listener = bind(&socket_path)?;
    log::info!("Listening on {}", socket_path.display());

    let shutdown = Arc::new(Notify::new());
    spawn_signal_handler(shutdown.clone());

    let tick_daemon = daemon.clone();
    let period = Duration::from_millis(config.daemon.poll_interval_ms);
    let ticker = tokio::spawn(async move {
        run_ticks(tick_daemon, SysSource::new(), period).await;
    });

    tokio::select! {
        _ = serve(listener, daemon.clone()) => {}
        _ = shutdown.notified() => {
            log::info!("Daemon shutting down");
        }
    }

    ticker.abort();
    if config.daemon.restore_on_exit {
        daemon.restore_auto().await;
        log::info!("Restored automatic fan control");
    }

    let _ = std::fs::remove_file(&socket_path);
    Ok(())
}

/// Remove any stale socket, bind a fresh one and restrict its mode.
///
/// Failing to set the mode is logged and otherwise ignored.
pub fn bind(socket_path: &Path) -> io::Result<UnixListener> {
    if let Some(dir) = socket_path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let _ = std::fs::remove_file(socket_path);
    let listener = UnixListener::bind(socket_path)?;
    restrict_mode(socket_path, SOCKET_MODE);
    Ok(listener)
}

/// Set `mode` on `path`, logging on failure. Returns whether it was applied.
pub fn restrict_mode(path: &Path, mode: u32) -> bool {
    use std::os::unix::fs::PermissionsExt;

    match std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)) {
        Ok(()) => true,
        Err(e) => {
            log::error!("Failed to set socket permissions: {e}");
            false
        }
    }
}

fn spawn_signal_handler(shutdown: Arc<Notify>) {
    use tokio::signal::unix::{SignalKind, signal};

    tokio::spawn(async move {
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                log::warn!("Failed to install SIGTERM handler: {e}");
                tokio::signal::ctrl_c().await.ok();
            }
        }

        log::info!("Received shutdown signal");
        shutdown.notify_one();
    });
}

// ---------------------------------------------------------------------------
// Control loop
// ---------------------------------------------------------------------------

/// Sample and tick once per `period`, forever.
pub async fn run_ticks<S: TemperatureSource>(
    daemon: SharedDaemon,
    mut source: S,
    period: Duration,
) {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;
        let temp = source.temperature();
        let usage = source.usage_fraction();
        log::debug!("sample: {temp:.2}°C, cpu {:.0}%", usage * 100.0);
        daemon.tick(temp).await;
    }
}

// ---------------------------------------------------------------------------
// Client connections
// ---------------------------------------------------------------------------

/// Accept connections forever, one task each.
pub async fn serve(listener: UnixListener, daemon: SharedDaemon) {
    loop {
        match listener.accept().await {
            Ok((stream, _addr)) => {
                tokio::spawn(handle_client(stream, daemon.clone()));
            }
            Err(e) => {
                log::error!("Failed to accept connection: {e}");
            }
        }
    }
}

/// Serve a single request line and close the connection.
///
/// A client that sends nothing within the request timeout is dropped without
/// a response.
pub async fn handle_client(stream: UnixStream, daemon: SharedDaemon) {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader.take(MAX_REQUEST_BYTES));
    let mut line = String::new();

    match time::timeout(daemon.request_timeout, reader.read_line(&mut line)).await {
        Ok(Ok(0)) => return,
        Ok(Ok(_)) => {}
        Ok(Err(e)) => {
            log::warn!("Failed to read request: {e}");
            return;
        }
        Err(_) => {
            log::warn!("Client sent no request within {:?}", daemon.request_timeout);
            return;
        }
    }

    let response = process_request(&line, &daemon).await;

    let encoded = match protocol::encode(&response) {
        Ok(s) => s,
        Err(e) => {
            log::error!("Failed to encode response: {e}");
            return;
        }
    };

    if let Err(e) = writer.write_all(encoded.as_bytes()).await {
        log::warn!("Failed to write response: {e}");
        return;
    }
    let _ = writer.shutdown().await;
}

pub async fn process_request(line: &str, daemon: &Daemon) -> Response {
    let req: Request = match protocol::decode(line) {
        Ok(req) => req,
        Err(e) => {
            log::warn!("Invalid request: {e}");
            return Response::error(protocol::ERR_INVALID_JSON);
        }
    };

    let Ok(cmd) = req.cmd.parse::<Command>() else {
        log::warn!("Unknown command: {:?}", req.cmd);
        return Response::error(protocol::ERR_UNKNOWN_COMMAND);
    };
    log::debug!("request: {cmd}");

    match cmd {
        Command::Status => {
            let status = daemon.state.read().await.status();
            Response::status(status.cpu_temp, status.fan_speed)
        }
        Command::Pause => {
            let mut st = daemon.state.write().await;
            st.pause(daemon.actuator.as_ref());
            Response::ok()
        }
        Command::Resume => {
            daemon.state.write().await.resume();
            Response::ok()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::DryRun;
    use crate::config::ControlConfig;
    use crate::controller::SPEED_UNSET;
    use crate::curve::default_breakpoints;

    fn daemon() -> Daemon {
        let curve = FanCurveSpec::new(&default_breakpoints()).unwrap();
        Daemon::new(
            ControllerState::new(curve, &ControlConfig::default()),
            Box::new(DryRun),
        )
    }

    #[tokio::test]
    async fn test_malformed_json() {
        let resp = process_request("{not json", &daemon()).await;
        assert_eq!(resp, Response::error("invalid json"));
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let resp = process_request("{\"cmd\":\"reboot\"}", &daemon()).await;
        assert_eq!(resp, Response::error("unknown command"));
    }

    #[tokio::test]
    async fn test_status_before_first_tick() {
        let resp = process_request("{\"cmd\":\"status\"}", &daemon()).await;
        assert_eq!(resp, Response::status(0.0, SPEED_UNSET));
    }

    #[tokio::test]
    async fn test_status_reflects_tick() {
        let d = daemon();
        d.tick(60.0).await;
        let resp = process_request("{\"cmd\":\"status\"}", &d).await;
        assert_eq!(resp, Response::status(60.0, 20));
    }

    #[tokio::test]
    async fn test_pause_and_resume() {
        let d = daemon();
        d.tick(60.0).await;

        assert_eq!(process_request("{\"cmd\":\"pause\"}", &d).await, Response::ok());
        assert!(d.state().read().await.is_paused());

        for temp in [70.0, 71.0, 72.0, 73.0, 74.0] {
            d.tick(temp).await;
        }
        let resp = process_request("{\"cmd\":\"status\"}", &d).await;
        assert_eq!(resp, Response::status(74.0, SPEED_UNSET));

        assert_eq!(process_request("{\"cmd\":\"resume\"}", &d).await, Response::ok());
        assert!(!d.state().read().await.is_paused());
    }

    #[tokio::test]
    async fn test_bind_replaces_stale_socket() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("run").join("nofan.sock");
        drop(bind(&path).unwrap());
        assert!(path.exists());
        // stale file left behind by the previous listener
        let listener = bind(&path).unwrap();

        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, SOCKET_MODE);
        drop(listener);
    }

    #[test]
    fn test_restrict_mode_failure_is_not_fatal() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(!restrict_mode(&dir.path().join("missing.sock"), SOCKET_MODE));

        use std::os::unix::fs::PermissionsExt;
        let file = dir.path().join("present");
        std::fs::write(&file, b"").unwrap();
        assert!(restrict_mode(&file, 0o600));
        let mode = std::fs::metadata(&file).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_resume_while_running_is_a_no_op() {
        let d = daemon();
        d.tick(60.0).await;
        let before = d.state().read().await.slot();
        assert_eq!(process_request("{\"cmd\":\"resume\"}", &d).await, Response::ok());
        assert_eq!(d.state().read().await.slot(), before);
        assert!(before.is_some());
    }
}

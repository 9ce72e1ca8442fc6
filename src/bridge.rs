//! Glove bridge subprocess
//!
//! The glove itself is driven by a small native program (the "bridge") that
//! talks to the hardware and prints one record per line on stdout. This
//! module owns that subprocess: it spawns it, reads its stdout on a dedicated
//! thread, and hands every line to the UI through an unbounded channel.
//!
//! The bridge's stderr is inherited so its own diagnostics show up inline in
//! the host's terminal.
//!
//! Nothing here is fatal to the caller. When the bridge cannot be started or
//! stops talking, the channel simply closes and the display keeps showing the
//! last values it received.

use std::ffi::OsString;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use thiserror::Error;
use wait_timeout::ChildExt;

/// Default time allowed for the bridge to exit after being killed
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

const READER_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("failed to start bridge {path:?}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("bridge stdout was not captured")]
    NoStdout,

    #[error("failed to start reader thread: {0}")]
    Thread(#[source] io::Error),
}

/// How to launch the bridge
#[derive(Clone, Debug)]
pub struct BridgeConfig {
    /// Path to the bridge executable
    pub executable: PathBuf,
    /// Connection identifier passed as the first positional argument (e.g. `USB0`)
    pub connection: String,
    /// Extra arguments appended after the connection identifier
    pub extra_args: Vec<OsString>,
}

impl BridgeConfig {
    pub fn new(executable: impl Into<PathBuf>, connection: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            connection: connection.into(),
            extra_args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.extra_args.extend(args.into_iter().map(Into::into));
        self
    }
}

/// Consumer end of the line queue
///
/// Draining never blocks. Once the producer is gone and every queued line has
/// been handed out, the channel reports itself closed.
pub struct BridgeChannel {
    rx: Receiver<String>,
    closed: bool,
}

impl BridgeChannel {
    /// Create a connected sender/channel pair.
    pub fn new() -> (Sender<String>, BridgeChannel) {
        let (tx, rx) = unbounded();
        (tx, BridgeChannel { rx, closed: false })
    }

    /// Take every line currently queued, oldest first.
    pub fn drain(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        if self.closed {
            return lines;
        }
        loop {
            match self.rx.try_recv() {
                Ok(line) => lines.push(line),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            }
        }
        lines
    }

    /// True once the producer has hung up and the queue is empty
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Why the reader loop returned
#[derive(Debug)]
pub enum PumpExit {
    /// The bridge closed its stdout (usually because it exited)
    EndOfStream { lines: u64 },
    /// Reading failed
    ReadError { lines: u64, error: io::Error },
}

/// Copy lines from `reader` into `sink` until end of stream.
///
/// Lines are trimmed of surrounding whitespace (including `\r\n`). Invalid
/// UTF-8 is replaced rather than treated as fatal; the codec will reject the
/// line later. A line that cannot be queued is logged and dropped, and
/// reading carries on.
pub fn pump_lines<R: BufRead>(mut reader: R, sink: &Sender<String>) -> PumpExit {
    let mut buf = Vec::with_capacity(256);
    let mut lines = 0u64;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => return PumpExit::EndOfStream { lines },
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf).trim().to_string();
                lines += 1;
                if let Err(e) = sink.send(line) {
                    log::warn!("Failed to queue bridge line {:?}: {}", e.0, e);
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => return PumpExit::ReadError { lines, error },
        }
    }
}

fn reader_thread(stdout: ChildStdout, sink: Sender<String>) {
    match pump_lines(BufReader::new(stdout), &sink) {
        PumpExit::EndOfStream { lines } => {
            log::info!("Glove bridge stopped sending data after {} lines", lines);
        }
        PumpExit::ReadError { lines, error } => {
            log::error!("Error reading from glove bridge after {} lines: {}", lines, error);
        }
    }
}

/// A running bridge subprocess and its reader thread
pub struct Bridge {
    /// Bridge subprocess
    process: Option<Child>,
    /// Thread blocked on the subprocess's stdout
    reader: Option<JoinHandle<()>>,
    /// Wait allowed on shutdown
    shutdown_timeout: Duration,
}

impl Bridge {
    /// Spawn the bridge and start reading its output into a new channel.
    pub fn start(config: &BridgeConfig) -> Result<(Bridge, BridgeChannel), BridgeError> {
        let (tx, channel) = BridgeChannel::new();
        let bridge = Self::start_with_sink(config, tx)?;
        Ok((bridge, channel))
    }

    /// Spawn the bridge and push its lines into an existing sender.
    pub fn start_with_sink(config: &BridgeConfig, sink: Sender<String>) -> Result<Bridge, BridgeError> {
        log::info!(
            "Starting glove bridge {} on {}...",
            config.executable.display(),
            config.connection
        );

        let mut process = Command::new(&config.executable)
            .arg(&config.connection)
            .args(&config.extra_args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| BridgeError::Spawn {
                path: config.executable.clone(),
                source,
            })?;

        // Take ownership of stdout for the reader thread
        let stdout = match process.stdout.take() {
            Some(stdout) => stdout,
            None => {
                let _ = process.kill();
                let _ = process.wait();
                return Err(BridgeError::NoStdout);
            }
        };

        let reader = thread::Builder::new()
            .name("glove-bridge".to_string())
            .spawn(move || reader_thread(stdout, sink));
        let reader = match reader {
            Ok(handle) => handle,
            Err(e) => {
                let _ = process.kill();
                let _ = process.wait();
                return Err(BridgeError::Thread(e));
            }
        };

        log::info!(
            "Glove bridge started (pid {}). Bridge logs appear on stderr.",
            process.id()
        );

        Ok(Bridge {
            process: Some(process),
            reader: Some(reader),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        })
    }

    /// Set how long `shutdown` waits for the subprocess to exit.
    pub fn set_shutdown_timeout(&mut self, timeout: Duration) {
        self.shutdown_timeout = timeout;
    }

    /// Whether the reader thread is still consuming output
    pub fn is_reading(&self) -> bool {
        self.reader
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// OS process id of the bridge, while it is owned
    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().map(Child::id)
    }

    /// Kill the subprocess and wait (bounded) for it to exit.
    ///
    /// Returns `true` if the subprocess is confirmed gone. Calling this more
    /// than once is harmless.
    pub fn shutdown(&mut self) -> bool {
        let Some(mut process) = self.process.take() else {
            return true;
        };

        let exited = match process.try_wait() {
            Ok(Some(status)) => {
                log::debug!("Glove bridge already exited: {}", status);
                true
            }
            Ok(None) => {
                log::info!("Terminating glove bridge...");
                self.kill_and_wait(&mut process)
            }
            Err(e) => {
                log::warn!("Could not query glove bridge status: {}", e);
                self.kill_and_wait(&mut process)
            }
        };

        // A dead bridge normally closes stdout, but a grandchild can still
        // hold the pipe open. Only a stuck-in-read reader is left behind.
        let deadline = if exited {
            Instant::now() + self.shutdown_timeout
        } else {
            Instant::now()
        };
        self.join_reader(deadline);

        exited
    }

    fn kill_and_wait(&self, process: &mut Child) -> bool {
        if let Err(e) = process.kill() {
            log::warn!("Failed to kill glove bridge: {}", e);
        }
        match process.wait_timeout(self.shutdown_timeout) {
            Ok(Some(status)) => {
                log::info!("Glove bridge terminated ({})", status);
                true
            }
            Ok(None) => {
                log::error!(
                    "Glove bridge did not exit within {:?}; leaving it behind",
                    self.shutdown_timeout
                );
                false
            }
            Err(e) => {
                log::error!("Failed waiting for glove bridge: {}", e);
                false
            }
        }
    }

    fn join_reader(&mut self, deadline: Instant) {
        let Some(reader) = self.reader.take() else {
            return;
        };

        while !reader.is_finished() && Instant::now() < deadline {
            thread::sleep(READER_POLL_INTERVAL);
        }

        if reader.is_finished() {
            if reader.join().is_err() {
                log::error!("Glove bridge reader thread panicked");
            }
        } else {
            log::warn!("Glove bridge output is still open; detaching reader thread");
        }
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        // Never leave the bridge running behind us
        self.shutdown();
    }
}

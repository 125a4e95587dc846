use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::SupervisorConfig;

use super::{ChannelError, WorkerChannel, WorkerChannelFactory};

const JOIN_TIMEOUT: Duration = Duration::from_secs(5);
const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Spawns the worker program with the channel port as its only argument.
pub struct ProcessChannelFactory {
    name: String,
    port: u16,
    program_path: PathBuf,
}

impl ProcessChannelFactory {
    pub fn new<S: Into<String>>(name: S, port: u16, program_path: PathBuf) -> Self {
        Self {
            name: name.into(),
            port,
            program_path,
        }
    }
}

impl From<&SupervisorConfig> for ProcessChannelFactory {
    fn from(config: &SupervisorConfig) -> Self {
        Self::new(
            config.channel_name.clone(),
            config.channel_port,
            config.worker_program_path.clone(),
        )
    }
}

impl WorkerChannelFactory for ProcessChannelFactory {
    type Channel = ProcessChannel;

    fn start(&self) -> Result<ProcessChannel, ChannelError> {
        let mut child = Command::new(&self.program_path)
            .arg(self.port.to_string())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(ChannelError::Spawn)?;

        if let Some(stdout) = child.stdout.take() {
            spawn_output_logger(self.name.clone(), stdout, false);
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_output_logger(self.name.clone(), stderr, true);
        }

        info!(
            worker = %self.name,
            port = self.port,
            pid = child.id(),
            "worker channel started"
        );

        Ok(ProcessChannel {
            name: self.name.clone(),
            port: self.port,
            child,
            exit_status: None,
            join_timeout: JOIN_TIMEOUT,
        })
    }
}

/// A worker channel backed by a local subprocess. The socket protocol spoken
/// on the port is the worker's own business.
#[derive(Debug)]
pub struct ProcessChannel {
    name: String,
    port: u16,
    child: Child,
    exit_status: Option<ExitStatus>,
    join_timeout: Duration,
}

impl WorkerChannel for ProcessChannel {
    fn is_alive(&mut self) -> bool {
        if self.exit_status.is_some() {
            return false;
        }
        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                debug!(worker = %self.name, port = self.port, %status, "worker channel exited");
                self.exit_status = Some(status);
                false
            }
            Err(err) => {
                warn!(worker = %self.name, "could not check worker liveness: {err}");
                false
            }
        }
    }

    fn stop(&mut self) -> Result<(), ChannelError> {
        // The process is already reaped, its pid may have been recycled.
        if self.exit_status.is_some() {
            return Ok(());
        }
        self.request_termination()
    }

    fn join(&mut self) -> Result<(), ChannelError> {
        if self.exit_status.is_some() {
            return Ok(());
        }

        let deadline = Instant::now() + self.join_timeout;
        while Instant::now() < deadline {
            match self.child.try_wait().map_err(ChannelError::Wait)? {
                Some(status) => {
                    debug!(worker = %self.name, port = self.port, %status, "worker channel exited");
                    self.exit_status = Some(status);
                    return Ok(());
                }
                None => thread::sleep(JOIN_POLL_INTERVAL),
            }
        }

        warn!(
            worker = %self.name,
            "worker did not exit within {:?}, killing it",
            self.join_timeout
        );
        self.child.kill().map_err(ChannelError::Kill)?;
        let status = self.child.wait().map_err(ChannelError::Wait)?;
        self.exit_status = Some(status);
        Ok(())
    }
}

impl ProcessChannel {
    #[cfg(target_family = "unix")]
    fn request_termination(&self) -> Result<(), ChannelError> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        kill(Pid::from_raw(self.child.id() as i32), Signal::SIGTERM)?;
        Ok(())
    }

    #[cfg(not(target_family = "unix"))]
    fn request_termination(&mut self) -> Result<(), ChannelError> {
        // No graceful termination signal available, the hard kill is all we have.
        self.child.kill().map_err(ChannelError::Kill)
    }
}

/// Forwards the worker's output into our log, one line at a time.
fn spawn_output_logger<R>(worker: String, stream: R, is_stderr: bool)
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        for line in BufReader::new(stream).lines() {
            match line {
                Ok(line) if is_stderr => warn!(worker = %worker, "{line}"),
                Ok(line) => debug!(worker = %worker, "{line}"),
                Err(_) => break,
            }
        }
    });
}

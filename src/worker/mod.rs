pub mod process;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("failed to spawn the worker process: `{0}`")]
    Spawn(std::io::Error),

    #[error("failed to wait for the worker process: `{0}`")]
    Wait(std::io::Error),

    #[error("failed to kill the worker process: `{0}`")]
    Kill(std::io::Error),

    #[cfg(target_family = "unix")]
    #[error("failed to signal the worker process: `{0}`")]
    Signal(#[from] nix::Error),
}

/// Handle to a live worker bound to a local port. Exclusively owned by the
/// supervisor loop; a discarded handle must have seen `stop` + `join` first.
pub trait WorkerChannel: Send {
    /// Non-blocking liveness check.
    fn is_alive(&mut self) -> bool;

    /// Requests a graceful shutdown. Does not wait.
    fn stop(&mut self) -> Result<(), ChannelError>;

    /// Blocks until the worker is fully terminated, bounded by a timeout owned
    /// by the channel. Escalates to a hard kill when the timeout expires.
    fn join(&mut self) -> Result<(), ChannelError>;
}

/// Creates worker channels. Each `start` spawns a fresh worker for the same
/// `(name, port)` pair, so at most one returned handle may be alive at a time.
pub trait WorkerChannelFactory: Send {
    type Channel: WorkerChannel;

    fn start(&self) -> Result<Self::Channel, ChannelError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use mockall::mock;

    mock! {
        pub ChannelMock {}

        impl WorkerChannel for ChannelMock {
            fn is_alive(&mut self) -> bool;
            fn stop(&mut self) -> Result<(), ChannelError>;
            fn join(&mut self) -> Result<(), ChannelError>;
        }
    }

    mock! {
        pub FactoryMock {}

        impl WorkerChannelFactory for FactoryMock {
            type Channel = MockChannelMock;

            fn start(&self) -> Result<MockChannelMock, ChannelError>;
        }
    }

    /// A channel that stays alive until torn down.
    pub fn alive_channel() -> MockChannelMock {
        let mut channel = MockChannelMock::new();
        channel.expect_is_alive().returning(|| true);
        channel.expect_stop().returning(|| Ok(()));
        channel.expect_join().returning(|| Ok(()));
        channel
    }

    /// A channel that is already dead on the first liveness check.
    pub fn dead_channel() -> MockChannelMock {
        let mut channel = MockChannelMock::new();
        channel.expect_is_alive().returning(|| false);
        channel.expect_stop().returning(|| Ok(()));
        channel.expect_join().returning(|| Ok(()));
        channel
    }
}

pub mod http;

/// Answers whether the backend endpoint is currently reachable. Never blocks
/// beyond a short network timeout and never fails: an unreachable backend is
/// reported as `false`. Retrying is the caller's job.
pub trait ConnectivityProber: Send {
    fn probe(&self, endpoint: &str) -> bool;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use mockall::mock;

    mock! {
        pub ProberMock {}

        impl ConnectivityProber for ProberMock {
            fn probe(&self, endpoint: &str) -> bool;
        }
    }
}

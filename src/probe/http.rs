use std::time::Duration;

use reqwest::blocking::Client;
use tracing::debug;

use super::ConnectivityProber;

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(thiserror::Error, Debug)]
pub enum ProberBuildError {
    #[error("could not build the probe http client: `{0}`")]
    ClientBuilder(#[from] reqwest::Error),
}

/// Probes the backend with a blocking GET. Any answer from the server counts
/// as reachable, status codes included: reachability is not a health check.
pub struct HttpProber {
    client: Client,
}

impl HttpProber {
    pub fn try_new() -> Result<Self, ProberBuildError> {
        let client = Client::builder()
            .timeout(PROBE_TIMEOUT)
            .connect_timeout(PROBE_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }

    /// Bare hostnames are accepted in the configuration, https is assumed.
    fn normalize_endpoint(endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else {
            format!("https://{}", endpoint)
        }
    }
}

impl ConnectivityProber for HttpProber {
    fn probe(&self, endpoint: &str) -> bool {
        let url = Self::normalize_endpoint(endpoint);
        match self.client.get(&url).send() {
            Ok(_) => true,
            Err(err) => {
                debug!(endpoint = %url, "backend probe failed: {err}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    // Minimal single-request http server answering with the given status line.
    fn serve_once(status_line: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf);
                let response = format!("{}\r\ncontent-length: 0\r\n\r\n", status_line);
                let _ = stream.write_all(response.as_bytes());
            }
        });

        format!("http://{}", addr)
    }

    #[test]
    fn probe_is_true_when_the_backend_answers() {
        let endpoint = serve_once("HTTP/1.1 200 OK");
        let prober = HttpProber::try_new().unwrap();

        assert!(prober.probe(&endpoint));
    }

    #[test]
    fn probe_is_true_even_on_a_server_error() {
        let endpoint = serve_once("HTTP/1.1 500 Internal Server Error");
        let prober = HttpProber::try_new().unwrap();

        assert!(prober.probe(&endpoint));
    }

    #[test]
    fn probe_is_false_when_nothing_listens() {
        // Bind and drop to get a port that is very likely closed.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let prober = HttpProber::try_new().unwrap();
        assert!(!prober.probe(&format!("http://{}", addr)));
    }

    #[test]
    fn bare_hostnames_get_an_https_scheme() {
        assert_eq!(
            "https://backend.example.com",
            HttpProber::normalize_endpoint("backend.example.com")
        );
        assert_eq!(
            "http://localhost:8080",
            HttpProber::normalize_endpoint("http://localhost:8080")
        );
        assert_eq!(
            "https://backend.example.com",
            HttpProber::normalize_endpoint("https://backend.example.com")
        );
    }
}

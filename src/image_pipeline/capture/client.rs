use std::net::TcpStream;
use std::time::SystemTime;

use tracing::{info, instrument};

use crate::image_pipeline::capture::protocol::{read_frame, write_request};
use crate::image_pipeline::capture::schedule::sleep_until;
use crate::image_pipeline::capture::source::FrameSource;
use crate::image_pipeline::capture::types::CaptureConfig;
use crate::image_pipeline::common::error::{FusionError, Result};

/// Frames captured at the same scheduled instant on both hosts.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedPair {
    pub local: Vec<u8>,
    pub remote: Vec<u8>,
    pub capture_at: SystemTime,
}

/// Local camera that drives a remote [`CaptureServer`](super::CaptureServer).
pub struct CaptureClient<S: FrameSource> {
    address: String,
    local: S,
    config: CaptureConfig,
}

impl<S: FrameSource> CaptureClient<S> {
    pub fn new(address: impl Into<String>, local: S, config: CaptureConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            address: address.into(),
            local,
            config,
        })
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Schedules a capture `lead_time` from now on both hosts and returns
    /// both frames.
    #[instrument(skip(self), fields(address = %self.address))]
    pub fn fetch_pair(&self) -> Result<CapturedPair> {
        let mut stream = TcpStream::connect(&self.address).map_err(|e| {
            FusionError::CaptureError(format!("connect to {} failed: {}", self.address, e))
        })?;
        stream.set_read_timeout(Some(self.config.io_timeout() + self.config.lead_time()))?;
        stream.set_write_timeout(Some(self.config.io_timeout()))?;

        let capture_at = SystemTime::now() + self.config.lead_time();
        write_request(&mut stream, capture_at)?;

        sleep_until(capture_at);
        let local = self.local.capture()?;
        let remote = read_frame(&mut stream, self.config.max_frame_bytes)?;
        info!(
            local_bytes = local.len(),
            remote_bytes = remote.len(),
            "Captured synchronized pair"
        );

        Ok(CapturedPair {
            local,
            remote,
            capture_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;
    use std::time::{Duration, Instant};

    use crate::image_pipeline::capture::CaptureServer;

    struct MemorySource(Vec<u8>);

    impl FrameSource for MemorySource {
        fn capture(&self) -> Result<Vec<u8>> {
            Ok(self.0.clone())
        }
    }

    fn quick_config() -> CaptureConfig {
        CaptureConfig {
            lead_time_ms: 40,
            max_frame_bytes: 1024,
            io_timeout_ms: 5_000,
        }
    }

    #[test]
    fn test_loopback_pair() {
        let source = MemorySource(b"rgb-frame".to_vec());
        let server = CaptureServer::bind("127.0.0.1:0", source, quick_config()).unwrap();
        let addr = server.local_addr().unwrap();
        let handle = thread::spawn(move || server.serve_one());

        let local = MemorySource(b"nir".to_vec());
        let client = CaptureClient::new(addr.to_string(), local, quick_config()).unwrap();
        let pair = client.fetch_pair().unwrap();
        handle.join().unwrap().unwrap();

        assert_eq!(pair.remote, b"rgb-frame");
        assert_eq!(pair.local, b"nir");
        assert!(SystemTime::now() >= pair.capture_at);
    }

    #[test]
    fn test_client_rejects_oversized_remote_frame() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = [0u8; 8];
            stream.read_exact(&mut request).unwrap();
            stream.write_all(&(1u64 << 40).to_be_bytes()).unwrap();
        });

        let local = MemorySource(Vec::new());
        let client = CaptureClient::new(addr.to_string(), local, quick_config()).unwrap();
        assert!(matches!(client.fetch_pair(), Err(FusionError::CaptureError(_))));
        handle.join().unwrap();
    }

    #[test]
    fn test_server_refuses_frame_over_limit() {
        let config = CaptureConfig {
            max_frame_bytes: 4,
            ..quick_config()
        };
        let source = MemorySource(vec![1u8; 16]);
        let server = CaptureServer::bind("127.0.0.1:0", source, config).unwrap();
        let addr = server.local_addr().unwrap();
        let handle = thread::spawn(move || server.serve_one());

        let local = MemorySource(Vec::new());
        let client = CaptureClient::new(addr.to_string(), local, quick_config()).unwrap();
        assert!(client.fetch_pair().is_err());
        assert!(matches!(
            handle.join().unwrap(),
            Err(FusionError::CaptureError(_))
        ));
    }

    #[test]
    fn test_unreachable_server() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let local = MemorySource(Vec::new());
        let client = CaptureClient::new(addr.to_string(), local, quick_config()).unwrap();
        assert!(matches!(client.fetch_pair(), Err(FusionError::CaptureError(_))));
    }

    #[test]
    fn test_server_refuses_capture_instant_far_ahead() {
        let config = CaptureConfig {
            io_timeout_ms: 500,
            ..quick_config()
        };
        let source = MemorySource(vec![7u8; 4]);
        let server = CaptureServer::bind("127.0.0.1:0", source, config).unwrap();
        let addr = server.local_addr().unwrap();
        let handle = thread::spawn(move || server.serve_one());

        let started = Instant::now();
        let mut stream = TcpStream::connect(addr).unwrap();
        write_request(&mut stream, SystemTime::now() + Duration::from_secs(3600)).unwrap();

        assert!(matches!(
            handle.join().unwrap(),
            Err(FusionError::CaptureError(_))
        ));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn test_server_accepts_instant_within_horizon() {
        let source = MemorySource(vec![7u8; 4]);
        let server = CaptureServer::bind("127.0.0.1:0", source, quick_config()).unwrap();
        let addr = server.local_addr().unwrap();
        let handle = thread::spawn(move || server.serve_one());

        let mut stream = TcpStream::connect(addr).unwrap();
        write_request(&mut stream, SystemTime::now() + Duration::from_millis(100)).unwrap();
        assert_eq!(read_frame(&mut stream, 1024).unwrap(), vec![7u8; 4]);
        handle.join().unwrap().unwrap();
    }
}

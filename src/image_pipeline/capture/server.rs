use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::SystemTime;

use tracing::{info, instrument, warn};

use crate::image_pipeline::capture::protocol::{read_request, write_frame};
use crate::image_pipeline::capture::schedule::sleep_until;
use crate::image_pipeline::capture::source::FrameSource;
use crate::image_pipeline::capture::types::CaptureConfig;
use crate::image_pipeline::common::error::{FusionError, Result};

/// Remote camera: waits for a capture instant, captures at that instant and
/// streams the frame back. Each connection carries exactly one request.
pub struct CaptureServer<S: FrameSource> {
    listener: TcpListener,
    source: S,
    config: CaptureConfig,
}

impl<S: FrameSource> CaptureServer<S> {
    pub fn bind(address: impl ToSocketAddrs, source: S, config: CaptureConfig) -> Result<Self> {
        config.validate()?;
        let listener = TcpListener::bind(address)
            .map_err(|e| FusionError::CaptureError(format!("bind failed: {}", e)))?;
        Ok(Self {
            listener,
            source,
            config,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Accepts and answers a single connection.
    pub fn serve_one(&self) -> Result<()> {
        let (stream, peer) = self.listener.accept()?;
        info!(%peer, "Accepted capture request connection");
        self.handle(stream)
    }

    /// Answers connections forever. A failed exchange is logged and does not
    /// stop the server.
    pub fn run(&self) -> Result<()> {
        info!(addr = %self.local_addr()?, "Capture server listening");
        loop {
            if let Err(e) = self.serve_one() {
                warn!(error = %e, "Capture exchange failed");
            }
        }
    }

    #[instrument(skip_all)]
    fn handle(&self, mut stream: TcpStream) -> Result<()> {
        stream.set_read_timeout(Some(self.config.io_timeout()))?;
        stream.set_write_timeout(Some(self.config.io_timeout()))?;

        let capture_at = read_request(&mut stream)?;
        self.check_horizon(capture_at)?;
        let woke = sleep_until(capture_at);
        let frame = self.source.capture()?;
        if frame.len() as u64 > self.config.max_frame_bytes {
            return Err(FusionError::CaptureError(format!(
                "captured frame of {} bytes exceeds the {} byte limit",
                frame.len(),
                self.config.max_frame_bytes
            )));
        }
        let late_by = woke.duration_since(capture_at).unwrap_or_default();
        info!(bytes = frame.len(), late_us = late_by.as_micros() as u64, "Sending frame");
        write_frame(&mut stream, &frame)
    }

    /// A capture instant is honoured only within `lead_time + io_timeout`
    /// of now; anything later would park the server indefinitely.
    fn check_horizon(&self, capture_at: SystemTime) -> Result<()> {
        let horizon = self.config.lead_time() + self.config.io_timeout();
        match capture_at.duration_since(SystemTime::now()) {
            Ok(ahead) if ahead > horizon => Err(FusionError::CaptureError(format!(
                "capture instant {} ms ahead exceeds the {} ms horizon",
                ahead.as_millis(),
                horizon.as_millis()
            ))),
            _ => Ok(()),
        }
    }
}

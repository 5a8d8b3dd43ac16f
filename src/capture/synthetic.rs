//! Synthetic capture backend.
//!
//! Produces WebM-shaped chunks on a fixed interval without touching real
//! hardware. Used for headless runs of the service and for demos; denial and
//! missing-camera behaviour can be simulated from config.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    CaptureError, CaptureMode, CaptureService, ChunkSink, DeviceStream, StreamId, TrackKind,
};
use crate::config::CaptureConfig;

/// EBML magic that opens every WebM file.
const EBML_MAGIC: [u8; 4] = [0x1A, 0x45, 0xDF, 0xA3];

#[derive(Debug, Clone)]
pub struct SyntheticOptions {
    pub chunk_interval: Duration,
    pub chunk_size: usize,
    pub acquire_delay: Duration,
    pub deny_permission: bool,
    pub camera_available: bool,
}

impl Default for SyntheticOptions {
    fn default() -> Self {
        Self {
            chunk_interval: Duration::from_millis(250),
            chunk_size: 4096,
            acquire_delay: Duration::ZERO,
            deny_permission: false,
            camera_available: true,
        }
    }
}

impl From<&CaptureConfig> for SyntheticOptions {
    fn from(config: &CaptureConfig) -> Self {
        Self {
            chunk_interval: Duration::from_millis(config.chunk_interval_ms.max(1)),
            chunk_size: config.chunk_size_bytes.max(EBML_MAGIC.len()),
            acquire_delay: Duration::from_millis(config.acquire_delay_ms),
            deny_permission: config.deny_permission,
            camera_available: config.camera_available,
        }
    }
}

pub struct SyntheticCapture {
    options: SyntheticOptions,
    next_id: AtomicU64,
    live: Mutex<HashMap<StreamId, CancellationToken>>,
}

impl SyntheticCapture {
    pub fn new(options: SyntheticOptions) -> Self {
        Self {
            options,
            next_id: AtomicU64::new(1),
            live: Mutex::new(HashMap::new()),
        }
    }

    /// Number of streams handed out and not yet stopped.
    pub fn live_streams(&self) -> usize {
        self.live.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Filler for chunk `sequence`. The first chunk opens with the EBML header.
fn chunk_payload(size: usize, sequence: u64) -> Vec<u8> {
    let mut data = vec![(sequence % 251) as u8; size];
    if sequence == 0 {
        let magic = EBML_MAGIC.len().min(size);
        data[..magic].copy_from_slice(&EBML_MAGIC[..magic]);
    }
    data
}

#[async_trait]
impl CaptureService for SyntheticCapture {
    async fn request_stream(&self, mode: CaptureMode) -> Result<DeviceStream, CaptureError> {
        if !self.options.acquire_delay.is_zero() {
            tokio::time::sleep(self.options.acquire_delay).await;
        }

        if self.options.deny_permission {
            warn!("Synthetic capture: simulating permission denial");
            return Err(CaptureError::PermissionDenied);
        }

        if mode == CaptureMode::Video && !self.options.camera_available {
            return Err(CaptureError::NoDevice(TrackKind::Camera));
        }

        let id = StreamId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.live
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, CancellationToken::new());

        info!("Synthetic capture: opened {} ({})", id, mode);
        Ok(DeviceStream::new(id, mode))
    }

    fn on_data(&self, stream: &DeviceStream, sink: ChunkSink) -> Result<(), CaptureError> {
        let token = self
            .live
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&stream.id())
            .cloned()
            .ok_or_else(|| CaptureError::Backend(format!("{} is not live", stream.id())))?;

        let size = self.options.chunk_size;
        let period = self.options.chunk_interval;
        let id = stream.id();
        debug!("Synthetic capture: attaching to {} ({})", id, stream.mode());

        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            let mut sequence: u64 = 0;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        if !sink.deliver(chunk_payload(size, sequence)) {
                            break;
                        }
                        sequence += 1;
                    }
                }
            }
            debug!("Synthetic capture: {} emitted {} chunks", id, sequence);
        });

        Ok(())
    }

    async fn stop_stream(&self, stream: DeviceStream) -> Result<(), CaptureError> {
        let token = self
            .live
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&stream.id());

        match token {
            Some(token) => {
                token.cancel();
                info!("Synthetic capture: stopped {}", stream.id());
                Ok(())
            }
            None => Err(CaptureError::Backend(format!(
                "{} was already stopped",
                stream.id()
            ))),
        }
    }
}

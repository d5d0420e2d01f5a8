//! Background thread for async frame decoding (native only)
//!
//! `NativeDecoderThread` reads and decodes frames on a dedicated thread and
//! answers each request through a oneshot channel, so the session's single
//! logical thread only ever suspends on the returned future.

use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::LocalBoxFuture;

use super::bitmap::RgbaBitmap;
use super::decoder::{DecodeError, DecodeResult, FrameDecoder};
use crate::frame_source::FrameIndex;

/// Request to decode a frame, sent to the background thread.
struct DecodeRequest {
    /// Frame index (for logging)
    index: FrameIndex,
    /// File path of the frame
    locator: String,
    /// Where the result goes
    reply: oneshot::Sender<DecodeResult<RgbaBitmap>>,
}

/// Message sent to the decoder thread.
enum ThreadMessage {
    /// Decode a frame
    Decode(DecodeRequest),
    /// Shutdown the thread
    Shutdown,
}

/// Manages a background thread for frame decoding.
pub struct NativeDecoderThread {
    /// Sender for requests to the background thread
    request_tx: Sender<ThreadMessage>,
    /// Handle to the background thread (for joining on drop)
    thread_handle: Option<JoinHandle<()>>,
}

impl NativeDecoderThread {
    /// Spawn a new decoder thread.
    pub fn spawn() -> Result<Self, DecodeError> {
        let (request_tx, request_rx) = mpsc::channel::<ThreadMessage>();

        let thread_handle = thread::Builder::new()
            .name("frame-decoder".to_string())
            .spawn(move || {
                log::info!("Native frame decoder thread started");
                while let Ok(message) = request_rx.recv() {
                    match message {
                        ThreadMessage::Decode(request) => {
                            let result = Self::decode_file(request.index, &request.locator);
                            // Receiver gone means the caller lost interest; nothing to do.
                            let _ = request.reply.send(result);
                        }
                        ThreadMessage::Shutdown => {
                            log::debug!("Received shutdown signal");
                            break;
                        }
                    }
                }
                log::info!("Native frame decoder thread exiting");
            })?;

        Ok(Self {
            request_tx,
            thread_handle: Some(thread_handle),
        })
    }

    /// Read a frame from disk and convert it to RGBA.
    fn decode_file(index: FrameIndex, locator: &str) -> DecodeResult<RgbaBitmap> {
        let bytes = std::fs::read(locator)?;
        log::debug!(
            "Decoding frame {} from {} ({} bytes)",
            index,
            locator,
            bytes.len()
        );
        let rgba = image::load_from_memory(&bytes)?.to_rgba8();
        log::debug!(
            "Decoded frame {}: {}x{}",
            index,
            rgba.width(),
            rgba.height()
        );
        Ok(RgbaBitmap::new(rgba))
    }
}

impl FrameDecoder for NativeDecoderThread {
    type Bitmap = RgbaBitmap;

    fn decode(
        &self,
        index: FrameIndex,
        locator: &str,
    ) -> LocalBoxFuture<'static, DecodeResult<RgbaBitmap>> {
        let (reply, result_rx) = oneshot::channel();
        let request = DecodeRequest {
            index,
            locator: locator.to_string(),
            reply,
        };

        if self
            .request_tx
            .send(ThreadMessage::Decode(request))
            .is_err()
        {
            log::error!("Failed to send decode request for frame {}: channel closed", index);
            return futures::future::ready(Err(DecodeError::Disconnected)).boxed_local();
        }

        async move { result_rx.await? }.boxed_local()
    }
}

impl Drop for NativeDecoderThread {
    fn drop(&mut self) {
        log::debug!("Shutting down native decoder thread");

        let _ = self.request_tx.send(ThreadMessage::Shutdown);

        if let Some(handle) = self.thread_handle.take() {
            if let Err(e) = handle.join() {
                log::warn!("Decoder thread panicked: {:?}", e);
            }
        }
    }
}

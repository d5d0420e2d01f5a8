//! Asynchronous frame decoding seam.

use futures::future::LocalBoxFuture;
use thiserror::Error;

use super::bitmap::FrameBitmap;
use crate::frame_source::FrameIndex;

/// Errors that can occur while fetching or decoding a single frame.
///
/// None of these are fatal: the session logs them, clears the in-flight entry
/// and lets the next access retry.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// I/O error while reading the frame
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The bytes could not be decoded as an image
    #[error("Image decode error: {0}")]
    Image(#[from] image::ImageError),

    /// The decoder backend is no longer running
    #[error("Decoder disconnected")]
    Disconnected,

    /// The decoder dropped the request without answering
    #[error("Decode request canceled")]
    Canceled,

    /// Backend-specific failure
    #[error("Decode failed: {0}")]
    Other(String),
}

impl From<futures::channel::oneshot::Canceled> for DecodeError {
    fn from(_: futures::channel::oneshot::Canceled) -> Self {
        Self::Canceled
    }
}

/// Result of a single decode operation.
pub type DecodeResult<B> = Result<B, DecodeError>;

/// Fetches and decodes one frame.
///
/// The returned future must not borrow the decoder: it is stored in the
/// in-flight map and may outlive the call that created it. Suspension happens
/// only while awaiting that future.
pub trait FrameDecoder {
    /// Handle type produced on success.
    type Bitmap: FrameBitmap + 'static;

    fn decode(
        &self,
        index: FrameIndex,
        locator: &str,
    ) -> LocalBoxFuture<'static, DecodeResult<Self::Bitmap>>;
}

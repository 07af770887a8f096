//! Transport payload decoding

use super::traits::{CaptureError, CaptureResult, CapturedFrame, ScreencastFrame};
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};

/// Decode the base64 image data of a screencast event into a raw frame
pub fn decode_frame(event: &ScreencastFrame) -> CaptureResult<CapturedFrame> {
    let payload = BASE64_STANDARD
        .decode(event.data.as_bytes())
        .map_err(|e| CaptureError::Decode(e.to_string()))?;

    Ok(CapturedFrame {
        timestamp: event.timestamp,
        payload,
    })
}

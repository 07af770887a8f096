//! Capture source interfaces
//!
//! The capture transport itself lives outside this crate; this module
//! defines what a recording session needs from it and how its payloads
//! are decoded.

pub mod decode;
pub mod traits;

pub use decode::decode_frame;
pub use traits::{
    CaptureChannel, CaptureError, CaptureResult, CaptureTarget, CapturedFrame, DeliveryContext,
    FrameEvents, ScreencastFrame,
};

//! Detector abstraction.
//!
//! The detector is a black box: frame in, per-frame detections out. The crate
//! consumes only the output shape (label, confidence, bounding box). Shipped
//! backends are deterministic stand-ins for a real model.

mod backend;
mod backends;
mod result;

pub use backend::DetectorBackend;
pub use backends::{ScriptedBackend, StubBackend};
pub use result::{BoundingBox, Detection};

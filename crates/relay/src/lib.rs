//! Real-time video relay for an edge camera.
//!
//! A camera streams frames over WebSocket, a detection loop annotates them and
//! steers a direction controller, and a forward loop fans JPEG frames out to
//! every connected viewer.

pub mod buffer;
pub mod camera;
pub mod config;
pub mod detect;
pub mod detection;
pub mod direction;
pub mod error;
pub mod forward;
pub mod pipeline;
pub mod rate;
pub mod reset;
pub mod shutdown;
pub mod track;
pub mod viewer;

pub use buffer::SharedFrameBuffer;
pub use camera::CameraIngest;
pub use config::{CameraPolicy, RelayConfig};
pub use detect::{Annotated, BoundingBox, DetectionStage, Detector, NoopDetector, Tracker};
pub use detection::{DetectionHandle, DetectionStats, DetectionWorker};
pub use direction::{ControlDirection, ControlMessage, DirectionMapper, fov_angle, round_angle};
pub use error::RelayError;
pub use forward::{FORWARD_QUEUE, ForwardHandle, ForwardStats, ForwardWorker};
pub use pipeline::Relay;
pub use rate::{FpsCounter, RateGate, rate_interval};
pub use reset::{ResetEvents, ResetReason, ResetSignal, reset_channel};
pub use shutdown::Shutdown;
pub use track::IouTracker;
pub use viewer::ViewerIngest;

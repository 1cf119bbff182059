//! Frame types and pixel plumbing for the relay.
//!
//! Everything that leaves this crate as a decoded frame is `PixelFormat::Rgb8`,
//! HWC order, `size.x * size.y * 3` bytes.

mod draw;
pub use draw::*;

mod error;
pub use error::*;

mod image;
pub use image::*;

mod jpeg;
pub use jpeg::*;

mod pixelformat;
pub use pixelformat::*;

mod rgb;
pub use rgb::*;

mod wire;
pub use wire::*;

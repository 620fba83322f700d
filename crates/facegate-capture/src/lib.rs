//! facegate-capture: Client side of facegate.
//!
//! Periodically captures still frames, sends them to the edge recognize
//! endpoint, and draws the returned boxes onto an overlay.

pub mod camera;
pub mod client;
pub mod frame;
pub mod live;
pub mod overlay;

pub use camera::{CameraError, DirectoryCamera, FrameSource};
pub use client::{ClientError, EdgeClient};
pub use frame::Frame;
pub use live::{LiveConfig, LiveLoop, LoopStats, OverlapPolicy, RecognizeEndpoint};
pub use overlay::{CanvasOverlay, Overlay};

pub mod app;
pub mod camera;
pub mod capture;
pub mod config;
pub mod error;
pub mod frame;
pub mod recovery;
pub mod state;
pub mod store;
pub mod streaming;
pub mod usb;
pub mod validator;

#[cfg(test)]
mod testing;

pub use app::{Component, ComponentState, ShutdownReason, StatusReport, UvcCamOrchestrator};
pub use camera::{bring_up, FrameSource, SensorSettings};
pub use capture::{CaptureLoop, CaptureOutcome, CaptureStatsSnapshot};
pub use config::UvcCamConfig;
pub use error::{CameraError, Result, UsbError, UvcCamError};
pub use frame::{Frame, FrameFormat, Resolution};
pub use recovery::{RecoveryAction, ReinitPolicy};
pub use state::{StreamControl, StreamState};
pub use store::{FrameRef, FrameSignal, FrameStore};
pub use streaming::{StreamOutcome, StreamingLoop, StreamingStats};
pub use usb::{StreamInterface, UsbDescriptors, UsbEventSink, UsbTransport};
pub use validator::{is_valid_jpeg, validate_frame, FrameVerdict};

#[cfg(feature = "simulation")]
pub use camera::{FaultPlan, SimulatedCamera, SimulatedCameraBuilder};
#[cfg(feature = "simulation")]
pub use usb::{HostScript, SimulatedUsb};

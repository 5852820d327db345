//! USB video class device surface: descriptors, lifecycle callbacks and the
//! frame transport the streaming loop submits to.

pub mod descriptors;
pub mod events;
#[cfg(feature = "simulation")]
pub mod sim;
pub mod transport;

pub use descriptors::{MjpegFrameLimits, UsbDescriptors};
pub use events::UsbEventSink;
#[cfg(feature = "simulation")]
pub use sim::{HostScript, HostStatsSnapshot, SimulatedUsb};
pub use transport::{DeviceCallbacks, StreamInterface, UsbTransport};

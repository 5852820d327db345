use super::descriptors::UsbDescriptors;
use super::events::UsbEventSink;
use crate::error::UsbError;
use std::fmt;
use std::sync::Arc;

/// Addresses one video streaming interface of one video control interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamInterface {
    pub control: u8,
    pub streaming: u8,
}

impl fmt::Display for StreamInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vc{}/vs{}", self.control, self.streaming)
    }
}

/// Callbacks the device stack invokes during enumeration and streaming
#[derive(Clone)]
pub struct DeviceCallbacks {
    pub descriptors: Arc<UsbDescriptors>,
    pub events: Arc<dyn UsbEventSink>,
}

/// USB device stack driving the video class.
///
/// The stack makes progress only inside [`service_step`](UsbTransport::service_step),
/// which must be called frequently. Lifecycle callbacks registered through
/// [`init`](UsbTransport::init) run from within `service_step`.
pub trait UsbTransport: Send + Sync {
    /// Bring up the controller and register descriptor and event callbacks
    fn init(&self, callbacks: DeviceCallbacks) -> Result<(), UsbError>;

    /// Host has configured the device
    fn is_mounted(&self) -> bool;

    /// Mounted and not suspended
    fn is_ready(&self) -> bool;

    /// The streaming interface has a committed alternate setting
    fn is_streaming_active(&self, interface: StreamInterface) -> bool;

    /// Queue one complete video frame for transmission. The payload is
    /// copied into the stack's transfer buffers before this returns.
    fn submit_frame(&self, interface: StreamInterface, payload: &[u8]) -> Result<(), UsbError>;

    /// Run one iteration of the stack's event processing
    fn service_step(&self);
}

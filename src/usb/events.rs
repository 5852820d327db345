use super::transport::StreamInterface;

/// Lifecycle notifications from the USB device stack.
///
/// Implemented by the application and registered with the stack at startup;
/// every method runs on the stack's servicing context and must not block.
pub trait UsbEventSink: Send + Sync {
    /// Host committed streaming parameters and wants frames
    fn on_commit(&self, interface: StreamInterface);

    /// Host closed the stream on this control interface
    fn on_uncommit(&self, control: u8);

    fn on_mount(&self);

    fn on_unmount(&self);

    /// The previously submitted frame has been fully transmitted
    fn on_frame_complete(&self, _control: u8) {}
}

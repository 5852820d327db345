use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UvcCamError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("USB error: {0}")]
    Usb(#[from] UsbError),

    #[error("Startup of {subsystem} failed: {source}")]
    Startup {
        subsystem: &'static str,
        #[source]
        source: Box<UvcCamError>,
    },

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

/// Failures reported by the camera peripheral
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    #[error("Camera initialization failed: {details}")]
    Init { details: String },

    #[error("Camera is not initialized")]
    NotInitialized,

    #[error("No frame delivered within {timeout:?}")]
    CaptureTimeout { timeout: Duration },

    #[error("All {count} frame buffers are in use")]
    PoolExhausted { count: usize },

    #[error("Camera deinitialization failed: {details}")]
    Deinit { details: String },
}

impl CameraError {
    /// Transient failures are expected occasionally and handled by retrying
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CameraError::CaptureTimeout { .. } | CameraError::PoolExhausted { .. }
        )
    }
}

/// Failures reported by the USB device stack
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UsbError {
    #[error("USB device stack initialization failed: {details}")]
    Init { details: String },

    #[error("Video streaming interface {interface} is not active")]
    NotStreaming { interface: u8 },

    #[error("A frame transfer is already in flight on interface {interface}")]
    TransferBusy { interface: u8 },

    #[error("Frame transfer failed: {details}")]
    Transfer { details: String },
}

impl UvcCamError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }

    pub fn startup(subsystem: &'static str, source: impl Into<UvcCamError>) -> Self {
        Self::Startup {
            subsystem,
            source: Box::new(source.into()),
        }
    }
}

pub type Result<T> = std::result::Result<T, UvcCamError>;

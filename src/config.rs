use crate::camera::SensorSettings;
use crate::frame::{FrameFormat, Resolution};
use crate::usb::descriptors::MjpegFrameLimits;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Longest string descriptor payload, in UTF-16 code units
pub const MAX_STRING_DESCRIPTOR_CHARS: usize = 31;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct UvcCamConfig {
    pub camera: CameraConfig,
    pub capture: CaptureConfig,
    pub stream: StreamConfig,
    pub usb: UsbConfig,
    pub system: SystemConfig,
}

/// Parallel (DVP) camera bus wiring. `-1` marks a pin that is not connected.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct CameraPins {
    pub pwdn: i32,
    pub reset: i32,
    pub xclk: i32,
    pub sccb_sda: i32,
    pub sccb_scl: i32,
    pub d0: i32,
    pub d1: i32,
    pub d2: i32,
    pub d3: i32,
    pub d4: i32,
    pub d5: i32,
    pub d6: i32,
    pub d7: i32,
    pub vsync: i32,
    pub href: i32,
    pub pclk: i32,
}

impl CameraPins {
    /// All data and sync lines; these must always be wired
    pub fn required(&self) -> [(&'static str, i32); 14] {
        [
            ("xclk", self.xclk),
            ("sccb_sda", self.sccb_sda),
            ("sccb_scl", self.sccb_scl),
            ("d0", self.d0),
            ("d1", self.d1),
            ("d2", self.d2),
            ("d3", self.d3),
            ("d4", self.d4),
            ("d5", self.d5),
            ("d6", self.d6),
            ("d7", self.d7),
            ("vsync", self.vsync),
            ("href", self.href),
            ("pclk", self.pclk),
        ]
    }
}

impl Default for CameraPins {
    fn default() -> Self {
        Self {
            pwdn: -1,
            reset: -1,
            xclk: 15,
            sccb_sda: 4,
            sccb_scl: 5,
            d0: 11,
            d1: 9,
            d2: 8,
            d3: 10,
            d4: 12,
            d5: 18,
            d6: 17,
            d7: 16,
            vsync: 6,
            href: 7,
            pclk: 13,
        }
    }
}

/// Where the peripheral allocates its frame buffers
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum FrameBufferLocation {
    Psram,
    Dram,
}

/// When the peripheral refills a frame buffer
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum GrabMode {
    /// Fill buffers only once they have been returned
    WhenEmpty,
    /// Keep overwriting so a capture always yields the newest image
    Latest,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CameraConfig {
    pub pins: CameraPins,

    /// External clock fed to the sensor
    pub xclk_freq_hz: u32,

    pub resolution: Resolution,

    pub format: FrameFormat,

    /// JPEG quality, 0 (best) to 63 (worst)
    pub jpeg_quality: u8,

    /// Number of frame buffers owned by the peripheral
    pub fb_count: usize,

    pub fb_location: FrameBufferLocation,

    pub grab_mode: GrabMode,

    /// Delay between peripheral initialization and first use
    pub settle_ms: u64,

    /// Captures taken and discarded at startup so exposure can converge
    pub warmup_captures: u32,

    pub warmup_interval_ms: u64,

    /// Upper bound on a single capture wait
    pub capture_timeout_ms: u64,

    pub sensor: SensorSettings,
}

impl CameraConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn warmup_interval(&self) -> Duration {
        Duration::from_millis(self.warmup_interval_ms)
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CaptureConfig {
    /// Consecutive capture failures before the peripheral is reinitialized
    pub error_threshold: u32,

    /// Pause after a failed capture
    pub retry_delay_ms: u64,

    /// Poll interval while no host wants frames
    pub idle_poll_ms: u64,

    /// Pause between deinitialize and initialize during recovery
    pub reinit_settle_ms: u64,

    /// Pause after a failed reinitialization
    pub reinit_backoff_ms: u64,
}

impl CaptureConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }

    pub fn reinit_settle(&self) -> Duration {
        Duration::from_millis(self.reinit_settle_ms)
    }

    pub fn reinit_backoff(&self) -> Duration {
        Duration::from_millis(self.reinit_backoff_ms)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StreamConfig {
    /// Video control interface index handed to the USB stack
    pub control_interface: u8,

    /// Video streaming interface index within the control interface
    pub streaming_interface: u8,

    /// Bounded wait for the frame-ready signal
    pub frame_wait_ms: u64,

    /// Sleep while the host is not streaming
    pub idle_delay_ms: u64,

    /// Treat a host unmount like a stream uncommit
    pub unmount_stops_stream: bool,

    /// Log a progress line every this many submitted frames
    pub report_every_frames: u64,
}

impl StreamConfig {
    pub fn frame_wait(&self) -> Duration {
        Duration::from_millis(self.frame_wait_ms)
    }

    pub fn idle_delay(&self) -> Duration {
        Duration::from_millis(self.idle_delay_ms)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct UsbConfig {
    pub vendor_id: u16,
    pub product_id: u16,
    pub bcd_device: u16,
    pub manufacturer: String,
    pub product: String,
    pub serial: String,
    pub interface_name: String,

    /// Max packet size of the video bulk IN endpoint
    pub endpoint_size: u16,

    pub max_power_ma: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SystemConfig {
    /// Tick of the status monitor loop
    pub status_interval_ms: u64,

    /// Emit a full status report every this many ticks
    pub status_report_every: u32,

    /// Emit the full status report as a JSON document
    pub status_json: bool,
}

impl SystemConfig {
    pub fn status_interval(&self) -> Duration {
        Duration::from_millis(self.status_interval_ms)
    }
}

impl UvcCamConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("uvccam.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            // Start with default values
            .add_source(Config::try_from(&UvcCamConfig::default())?)
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // UVCCAM_CAPTURE__ERROR_THRESHOLD=5 overrides capture.error_threshold
            .add_source(
                Environment::with_prefix("UVCCAM")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: UvcCamConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let camera = &self.camera;
        if camera.resolution.width == 0 || camera.resolution.height == 0 {
            return Err(ConfigError::Message(
                "Camera resolution must be greater than 0".to_string(),
            ));
        }

        if MjpegFrameLimits::checked(camera.resolution).is_none() {
            return Err(ConfigError::Message(format!(
                "Camera resolution {} is too large to advertise over UVC",
                camera.resolution
            )));
        }

        if camera.jpeg_quality > 63 {
            return Err(ConfigError::Message(format!(
                "Camera jpeg_quality must be between 0 and 63, got {}",
                camera.jpeg_quality
            )));
        }

        if camera.fb_count == 0 {
            return Err(ConfigError::Message(
                "Camera fb_count must be greater than 0".to_string(),
            ));
        }

        if camera.xclk_freq_hz == 0 {
            return Err(ConfigError::Message(
                "Camera xclk_freq_hz must be greater than 0".to_string(),
            ));
        }

        if camera.capture_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "Camera capture_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if let Some((name, _)) = camera.pins.required().iter().find(|(_, pin)| *pin < 0) {
            return Err(ConfigError::Message(format!(
                "Camera pin {} must be assigned",
                name
            )));
        }

        if self.capture.error_threshold == 0 {
            return Err(ConfigError::Message(
                "Capture error_threshold must be greater than 0".to_string(),
            ));
        }

        if self.stream.frame_wait_ms == 0 || self.stream.idle_delay_ms == 0 {
            return Err(ConfigError::Message(
                "Stream frame_wait_ms and idle_delay_ms must be greater than 0".to_string(),
            ));
        }

        if self.capture.idle_poll_ms == 0 {
            return Err(ConfigError::Message(
                "Capture idle_poll_ms must be greater than 0".to_string(),
            ));
        }

        for (field, value) in [
            ("manufacturer", &self.usb.manufacturer),
            ("product", &self.usb.product),
            ("serial", &self.usb.serial),
            ("interface_name", &self.usb.interface_name),
        ] {
            if value.is_empty() {
                return Err(ConfigError::Message(format!(
                    "USB {} string must not be empty",
                    field
                )));
            }
            if value.encode_utf16().count() > MAX_STRING_DESCRIPTOR_CHARS {
                return Err(ConfigError::Message(format!(
                    "USB {} string exceeds {} characters",
                    field, MAX_STRING_DESCRIPTOR_CHARS
                )));
            }
        }

        if !matches!(self.usb.endpoint_size, 8 | 16 | 32 | 64 | 512) {
            return Err(ConfigError::Message(format!(
                "USB endpoint_size {} is not a valid bulk packet size",
                self.usb.endpoint_size
            )));
        }

        if self.system.status_interval_ms == 0 || self.system.status_report_every == 0 {
            return Err(ConfigError::Message(
                "System status_interval_ms and status_report_every must be greater than 0"
                    .to_string(),
            ));
        }

        Ok(())
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> crate::error::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

impl Default for UvcCamConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                pins: CameraPins::default(),
                xclk_freq_hz: default_xclk_freq_hz(),
                resolution: default_camera_resolution(),
                format: FrameFormat::Jpeg,
                jpeg_quality: default_jpeg_quality(),
                fb_count: default_fb_count(),
                fb_location: FrameBufferLocation::Psram,
                grab_mode: GrabMode::WhenEmpty,
                settle_ms: 1000,
                warmup_captures: default_warmup_captures(),
                warmup_interval_ms: 500,
                capture_timeout_ms: 200,
                sensor: SensorSettings::default(),
            },
            capture: CaptureConfig {
                error_threshold: default_error_threshold(),
                retry_delay_ms: 100,
                idle_poll_ms: 1000,
                reinit_settle_ms: 1000,
                reinit_backoff_ms: 5000,
            },
            stream: StreamConfig {
                control_interface: 0,
                streaming_interface: 0,
                frame_wait_ms: 100,
                idle_delay_ms: 100,
                unmount_stops_stream: true,
                report_every_frames: 10,
            },
            usb: UsbConfig {
                vendor_id: 0x303A,
                product_id: 0x4002,
                bcd_device: 0x0100,
                manufacturer: "Espressif".to_string(),
                product: "ESP32-S3 UVC Camera".to_string(),
                serial: "123456".to_string(),
                interface_name: "UVC".to_string(),
                endpoint_size: 64,
                max_power_ma: 500,
            },
            system: SystemConfig {
                status_interval_ms: 1000,
                status_report_every: 5,
                status_json: false,
            },
        }
    }
}

// Default value functions
fn default_xclk_freq_hz() -> u32 {
    20_000_000
}
fn default_camera_resolution() -> Resolution {
    Resolution::VGA
}
fn default_jpeg_quality() -> u8 {
    10
}
fn default_fb_count() -> usize {
    2
}
fn default_warmup_captures() -> u32 {
    3
}
fn default_error_threshold() -> u32 {
    10
}

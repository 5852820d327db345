//! Descriptor tables for a single-function USB video class camera.
//!
//! One video control interface (camera terminal -> streaming output terminal)
//! and one video streaming interface carrying MJPEG over a bulk IN endpoint.
//! Layouts follow UVC 1.1.

use crate::config::{CameraConfig, UsbConfig, MAX_STRING_DESCRIPTOR_CHARS};
use crate::frame::Resolution;
use tracing::warn;

pub const DESC_DEVICE: u8 = 0x01;
pub const DESC_CONFIGURATION: u8 = 0x02;
pub const DESC_STRING: u8 = 0x03;
pub const DESC_INTERFACE: u8 = 0x04;
pub const DESC_ENDPOINT: u8 = 0x05;
pub const DESC_INTERFACE_ASSOCIATION: u8 = 0x0B;
pub const DESC_CS_INTERFACE: u8 = 0x24;

const CLASS_MISC: u8 = 0xEF;
const MISC_SUBCLASS_COMMON: u8 = 0x02;
const MISC_PROTOCOL_IAD: u8 = 0x01;

const CLASS_VIDEO: u8 = 0x0E;
const SUBCLASS_VIDEO_CONTROL: u8 = 0x01;
const SUBCLASS_VIDEO_STREAMING: u8 = 0x02;
const SUBCLASS_VIDEO_COLLECTION: u8 = 0x03;

const VC_HEADER: u8 = 0x01;
const VC_INPUT_TERMINAL: u8 = 0x02;
const VC_OUTPUT_TERMINAL: u8 = 0x03;
const VS_INPUT_HEADER: u8 = 0x01;
const VS_FORMAT_MJPEG: u8 = 0x06;
const VS_FRAME_MJPEG: u8 = 0x07;
const VS_COLORFORMAT: u8 = 0x0D;

const ITT_CAMERA: u16 = 0x0201;
const TT_STREAMING: u16 = 0x0101;

const BCD_USB: u16 = 0x0200;
const BCD_UVC: u16 = 0x0110;
const EP0_SIZE: u8 = 64;
const UVC_CLOCK_FREQUENCY: u32 = 27_000_000;
const ATTR_BUS_POWERED_REMOTE_WAKEUP: u8 = 0x80 | 0x20;

pub const ITF_VIDEO_CONTROL: u8 = 0;
pub const ITF_VIDEO_STREAMING: u8 = 1;
pub const EP_VIDEO_IN: u8 = 0x81;

const CAMERA_TERMINAL_ID: u8 = 1;
const OUTPUT_TERMINAL_ID: u8 = 2;

pub const STR_MANUFACTURER: u8 = 1;
pub const STR_PRODUCT: u8 = 2;
pub const STR_SERIAL: u8 = 3;
pub const STR_INTERFACE: u8 = 4;

/// US English
pub const LANGID_EN_US: u16 = 0x0409;

/// Nominal frame rate advertised to the host
const DEFAULT_FPS: u32 = 30;
/// Frame intervals are expressed in 100 ns units
const INTERVAL_30FPS: u32 = 333_333;
const INTERVAL_10FPS: u32 = 1_000_000;

/// Sizes and bit rates advertised in the MJPEG frame descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MjpegFrameLimits {
    pub width: u16,
    pub height: u16,
    pub min_bit_rate: u32,
    pub max_bit_rate: u32,
    pub max_frame_buffer: u32,
}

impl MjpegFrameLimits {
    /// Limits for `resolution`, or `None` if a field does not fit its
    /// descriptor width
    pub fn checked(resolution: Resolution) -> Option<Self> {
        let pixels = u64::from(resolution.width) * u64::from(resolution.height);
        Some(Self {
            width: u16::try_from(resolution.width).ok()?,
            height: u16::try_from(resolution.height).ok()?,
            min_bit_rate: u32::try_from(pixels * 16).ok()?,
            max_bit_rate: u32::try_from(pixels * 16 * u64::from(DEFAULT_FPS)).ok()?,
            max_frame_buffer: u32::try_from(pixels * 2).ok()?,
        })
    }

    /// Like [`checked`](Self::checked) but saturating each field
    pub fn clamped(resolution: Resolution) -> Self {
        let pixels = u64::from(resolution.width) * u64::from(resolution.height);
        let clamp = |v: u64| v.min(u64::from(u32::MAX)) as u32;
        Self {
            width: resolution.width.min(u32::from(u16::MAX)) as u16,
            height: resolution.height.min(u32::from(u16::MAX)) as u16,
            min_bit_rate: clamp(pixels * 16),
            max_bit_rate: clamp(pixels * 16 * u64::from(DEFAULT_FPS)),
            max_frame_buffer: clamp(pixels * 2),
        }
    }
}

/// Immutable descriptor set served to the host during enumeration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsbDescriptors {
    device: [u8; 18],
    configuration: Vec<u8>,
    strings: Vec<String>,
}

impl UsbDescriptors {
    pub fn new(usb: &UsbConfig, camera: &CameraConfig) -> Self {
        Self {
            device: device_descriptor(usb),
            configuration: configuration_descriptor(usb, camera.resolution),
            strings: vec![
                usb.manufacturer.clone(),
                usb.product.clone(),
                usb.serial.clone(),
                usb.interface_name.clone(),
            ],
        }
    }

    pub fn device(&self) -> &[u8] {
        &self.device
    }

    /// There is exactly one configuration; the index is ignored
    pub fn configuration(&self, _index: u8) -> &[u8] {
        &self.configuration
    }

    /// String descriptor as UTF-16 words, header word first.
    ///
    /// Index 0 is the supported-language list. Strings are truncated to
    /// 31 code units. Unknown indices yield `None`.
    pub fn string(&self, index: u8, _langid: u16) -> Option<Vec<u16>> {
        if index == 0 {
            return Some(vec![string_header(1), LANGID_EN_US]);
        }

        let text = self.strings.get(index as usize - 1)?;
        let units: Vec<u16> = text
            .encode_utf16()
            .take(MAX_STRING_DESCRIPTOR_CHARS)
            .collect();

        let mut descriptor = Vec::with_capacity(units.len() + 1);
        descriptor.push(string_header(units.len()));
        descriptor.extend(units);
        Some(descriptor)
    }
}

/// Descriptor type in the high byte, total byte length in the low byte
fn string_header(units: usize) -> u16 {
    ((DESC_STRING as u16) << 8) | (2 * units as u16 + 2)
}

fn device_descriptor(usb: &UsbConfig) -> [u8; 18] {
    let [bcd_usb_lo, bcd_usb_hi] = BCD_USB.to_le_bytes();
    let [vid_lo, vid_hi] = usb.vendor_id.to_le_bytes();
    let [pid_lo, pid_hi] = usb.product_id.to_le_bytes();
    let [dev_lo, dev_hi] = usb.bcd_device.to_le_bytes();

    [
        18,
        DESC_DEVICE,
        bcd_usb_lo,
        bcd_usb_hi,
        CLASS_MISC,
        MISC_SUBCLASS_COMMON,
        MISC_PROTOCOL_IAD,
        EP0_SIZE,
        vid_lo,
        vid_hi,
        pid_lo,
        pid_hi,
        dev_lo,
        dev_hi,
        STR_MANUFACTURER,
        STR_PRODUCT,
        STR_SERIAL,
        1, // bNumConfigurations
    ]
}

fn configuration_descriptor(usb: &UsbConfig, resolution: Resolution) -> Vec<u8> {
    let vc_specific = video_control_class_descriptors();
    let vs_specific = video_streaming_class_descriptors(resolution);

    let mut body = Vec::new();

    // Interface association: both video interfaces form one function
    body.extend_from_slice(&[
        8,
        DESC_INTERFACE_ASSOCIATION,
        ITF_VIDEO_CONTROL,
        2,
        CLASS_VIDEO,
        SUBCLASS_VIDEO_COLLECTION,
        0,
        STR_INTERFACE,
    ]);

    body.extend_from_slice(&interface(ITF_VIDEO_CONTROL, 0, SUBCLASS_VIDEO_CONTROL));
    body.extend_from_slice(&vc_specific);

    body.extend_from_slice(&interface(ITF_VIDEO_STREAMING, 1, SUBCLASS_VIDEO_STREAMING));
    body.extend_from_slice(&vs_specific);

    let [mps_lo, mps_hi] = usb.endpoint_size.to_le_bytes();
    body.extend_from_slice(&[7, DESC_ENDPOINT, EP_VIDEO_IN, 0x02, mps_lo, mps_hi, 1]);

    let total = (9 + body.len()) as u16;
    let mut descriptor = Vec::with_capacity(total as usize);
    descriptor.extend_from_slice(&[9, DESC_CONFIGURATION]);
    descriptor.extend_from_slice(&total.to_le_bytes());
    descriptor.extend_from_slice(&[
        2, // bNumInterfaces
        1, // bConfigurationValue
        0,
        ATTR_BUS_POWERED_REMOTE_WAKEUP,
        (usb.max_power_ma / 2).min(u8::MAX as u16) as u8,
    ]);
    descriptor.extend(body);
    descriptor
}

fn interface(number: u8, endpoints: u8, subclass: u8) -> [u8; 9] {
    [
        9,
        DESC_INTERFACE,
        number,
        0, // bAlternateSetting
        endpoints,
        CLASS_VIDEO,
        subclass,
        0,
        STR_INTERFACE,
    ]
}

fn video_control_class_descriptors() -> Vec<u8> {
    let camera_terminal: [u8; 18] = {
        let [tt_lo, tt_hi] = ITT_CAMERA.to_le_bytes();
        [
            18,
            DESC_CS_INTERFACE,
            VC_INPUT_TERMINAL,
            CAMERA_TERMINAL_ID,
            tt_lo,
            tt_hi,
            0, // bAssocTerminal
            0, // iTerminal
            0,
            0, // wObjectiveFocalLengthMin
            0,
            0, // wObjectiveFocalLengthMax
            0,
            0, // wOcularFocalLength
            3, // bControlSize
            0,
            0,
            0,
        ]
    };

    let output_terminal: [u8; 9] = {
        let [tt_lo, tt_hi] = TT_STREAMING.to_le_bytes();
        [
            9,
            DESC_CS_INTERFACE,
            VC_OUTPUT_TERMINAL,
            OUTPUT_TERMINAL_ID,
            tt_lo,
            tt_hi,
            0,
            CAMERA_TERMINAL_ID,
            0,
        ]
    };

    let header_len = 13u8;
    let total = header_len as u16 + camera_terminal.len() as u16 + output_terminal.len() as u16;

    let mut out = Vec::with_capacity(total as usize);
    out.extend_from_slice(&[header_len, DESC_CS_INTERFACE, VC_HEADER]);
    out.extend_from_slice(&BCD_UVC.to_le_bytes());
    out.extend_from_slice(&total.to_le_bytes());
    out.extend_from_slice(&UVC_CLOCK_FREQUENCY.to_le_bytes());
    out.extend_from_slice(&[1, ITF_VIDEO_STREAMING]);
    out.extend_from_slice(&camera_terminal);
    out.extend_from_slice(&output_terminal);
    out
}

fn video_streaming_class_descriptors(resolution: Resolution) -> Vec<u8> {
    let format: [u8; 11] = [
        11,
        DESC_CS_INTERFACE,
        VS_FORMAT_MJPEG,
        1, // bFormatIndex
        1, // bNumFrameDescriptors
        1, // bmFlags: fixed size samples
        1, // bDefaultFrameIndex
        0,
        0,
        0,
        0,
    ];

    let limits = MjpegFrameLimits::checked(resolution).unwrap_or_else(|| {
        warn!(
            "Resolution {} exceeds the MJPEG frame descriptor range, clamping",
            resolution
        );
        MjpegFrameLimits::clamped(resolution)
    });
    let mut frame = Vec::with_capacity(38);
    frame.extend_from_slice(&[38, DESC_CS_INTERFACE, VS_FRAME_MJPEG, 1, 0]);
    frame.extend_from_slice(&limits.width.to_le_bytes());
    frame.extend_from_slice(&limits.height.to_le_bytes());
    frame.extend_from_slice(&limits.min_bit_rate.to_le_bytes());
    frame.extend_from_slice(&limits.max_bit_rate.to_le_bytes());
    frame.extend_from_slice(&limits.max_frame_buffer.to_le_bytes());
    frame.extend_from_slice(&INTERVAL_30FPS.to_le_bytes());
    frame.push(0); // continuous intervals
    frame.extend_from_slice(&INTERVAL_30FPS.to_le_bytes());
    frame.extend_from_slice(&INTERVAL_10FPS.to_le_bytes());
    frame.extend_from_slice(&INTERVAL_30FPS.to_le_bytes());

    let color: [u8; 6] = [6, DESC_CS_INTERFACE, VS_COLORFORMAT, 1, 1, 4];

    let header_len = 14u8;
    let total = header_len as u16 + format.len() as u16 + frame.len() as u16 + color.len() as u16;

    let mut out = Vec::with_capacity(total as usize);
    out.extend_from_slice(&[header_len, DESC_CS_INTERFACE, VS_INPUT_HEADER, 1]);
    out.extend_from_slice(&total.to_le_bytes());
    out.extend_from_slice(&[
        EP_VIDEO_IN,
        0, // bmInfo
        OUTPUT_TERMINAL_ID,
        0, // bStillCaptureMethod
        0, // bTriggerSupport
        0, // bTriggerUsage
        1, // bControlSize
        0, // bmaControls
    ]);
    out.extend_from_slice(&format);
    out.extend(frame);
    out.extend_from_slice(&color);
    out
}

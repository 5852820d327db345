//! Scripted collaborators for unit tests.

use crate::camera::FrameSource;
use crate::config::CameraConfig;
use crate::error::{CameraError, UsbError};
use crate::frame::{Frame, FrameFormat, Resolution};
use crate::usb::{DeviceCallbacks, StreamInterface, UsbTransport};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// A well-formed JPEG-framed buffer with `interior_len` filler bytes
pub fn jpeg_frame_bytes(interior_len: usize) -> Vec<u8> {
    let mut data = vec![0xFF, 0xD8];
    data.extend(std::iter::repeat(0xAB).take(interior_len));
    data.extend_from_slice(&[0xFF, 0xD9]);
    data
}

/// One scripted capture outcome
#[derive(Debug, Clone)]
pub enum Step {
    Frame(Vec<u8>),
    FrameAs(Vec<u8>, FrameFormat),
    Fail,
}

/// Calls observed by a [`ScriptedSource`], in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEvent {
    Init(bool),
    Deinit,
    Capture(bool),
    Release(u64),
}

#[derive(Default)]
struct ScriptState {
    steps: VecDeque<Step>,
    init_results: VecDeque<bool>,
    initialized: bool,
    live: HashSet<u64>,
    released: Vec<u64>,
    double_releases: u64,
    events: Vec<SourceEvent>,
}

/// Frame source that replays a fixed script and records every call.
///
/// Starts out initialized. Captures with an exhausted script time out.
pub struct ScriptedSource {
    state: Mutex<ScriptState>,
    next_id: AtomicU64,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ScriptState {
                initialized: true,
                ..ScriptState::default()
            }),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn with_script(steps: impl IntoIterator<Item = Step>) -> Self {
        let source = Self::new();
        source.state.lock().steps.extend(steps);
        source
    }

    pub fn push(&self, step: Step) {
        self.state.lock().steps.push_back(step);
    }

    /// Outcomes of upcoming `initialize` calls; once exhausted, init succeeds
    pub fn script_inits(&self, results: impl IntoIterator<Item = bool>) {
        self.state.lock().init_results.extend(results);
    }

    /// Hand out a frame as if it had been captured
    pub fn lend(&self, data: Vec<u8>) -> Frame {
        self.make_frame(data, FrameFormat::Jpeg)
    }

    fn make_frame(&self, data: Vec<u8>, format: FrameFormat) -> Frame {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.state.lock().live.insert(id);
        Frame::new(id, id as usize, data, Resolution::VGA, format)
    }

    pub fn outstanding(&self) -> usize {
        self.state.lock().live.len()
    }

    pub fn released_ids(&self) -> Vec<u64> {
        self.state.lock().released.clone()
    }

    pub fn double_releases(&self) -> u64 {
        self.state.lock().double_releases
    }

    pub fn events(&self) -> Vec<SourceEvent> {
        self.state.lock().events.clone()
    }

    pub fn remaining_steps(&self) -> usize {
        self.state.lock().steps.len()
    }
}

impl Default for ScriptedSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FrameSource for ScriptedSource {
    async fn initialize(&self, _config: &CameraConfig) -> Result<(), CameraError> {
        let mut state = self.state.lock();
        let ok = state.init_results.pop_front().unwrap_or(true);
        state.events.push(SourceEvent::Init(ok));
        state.initialized = ok;
        if ok {
            Ok(())
        } else {
            Err(CameraError::Init {
                details: "scripted init failure".to_string(),
            })
        }
    }

    async fn capture(&self) -> Result<Frame, CameraError> {
        let step = {
            let mut state = self.state.lock();
            if !state.initialized {
                state.events.push(SourceEvent::Capture(false));
                return Err(CameraError::NotInitialized);
            }
            state.steps.pop_front()
        };

        let timeout = CameraError::CaptureTimeout {
            timeout: Duration::from_millis(200),
        };
        let result = match step {
            Some(Step::Frame(data)) => Ok(self.make_frame(data, FrameFormat::Jpeg)),
            Some(Step::FrameAs(data, format)) => Ok(self.make_frame(data, format)),
            Some(Step::Fail) | None => Err(timeout),
        };

        self.state
            .lock()
            .events
            .push(SourceEvent::Capture(result.is_ok()));
        result
    }

    fn release(&self, frame: Frame) {
        let mut state = self.state.lock();
        state.events.push(SourceEvent::Release(frame.id));
        if state.live.remove(&frame.id) {
            state.released.push(frame.id);
        } else {
            state.double_releases += 1;
        }
    }

    async fn deinitialize(&self) -> Result<(), CameraError> {
        let mut state = self.state.lock();
        state.events.push(SourceEvent::Deinit);
        state.initialized = false;
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.state.lock().initialized
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// USB transport that records submitted payloads and lets tests play host
pub struct RecordingTransport {
    interface: StreamInterface,
    callbacks: Mutex<Option<DeviceCallbacks>>,
    streaming: AtomicBool,
    fail_submits: AtomicBool,
    submitted: Mutex<Vec<(StreamInterface, Vec<u8>)>>,
    service_steps: AtomicU64,
}

impl RecordingTransport {
    pub fn new(interface: StreamInterface) -> Self {
        Self {
            interface,
            callbacks: Mutex::new(None),
            streaming: AtomicBool::new(false),
            fail_submits: AtomicBool::new(false),
            submitted: Mutex::new(Vec::new()),
            service_steps: AtomicU64::new(0),
        }
    }

    /// Open the stream and deliver the commit callback
    pub fn host_commit(&self) {
        self.streaming.store(true, Ordering::SeqCst);
        if let Some(callbacks) = self.callbacks.lock().clone() {
            callbacks.events.on_mount();
            callbacks.events.on_commit(self.interface);
        }
    }

    /// Close the stream and deliver the uncommit callback
    pub fn host_uncommit(&self) {
        self.streaming.store(false, Ordering::SeqCst);
        if let Some(callbacks) = self.callbacks.lock().clone() {
            callbacks.events.on_uncommit(self.interface.control);
        }
    }

    /// Mark the endpoint active without any callback
    pub fn set_streaming(&self, streaming: bool) {
        self.streaming.store(streaming, Ordering::SeqCst);
    }

    pub fn fail_submits(&self, fail: bool) {
        self.fail_submits.store(fail, Ordering::SeqCst);
    }

    pub fn is_initialized(&self) -> bool {
        self.callbacks.lock().is_some()
    }

    pub fn submitted(&self) -> Vec<(StreamInterface, Vec<u8>)> {
        self.submitted.lock().clone()
    }

    pub fn service_steps(&self) -> u64 {
        self.service_steps.load(Ordering::SeqCst)
    }
}

impl UsbTransport for RecordingTransport {
    fn init(&self, callbacks: DeviceCallbacks) -> Result<(), UsbError> {
        *self.callbacks.lock() = Some(callbacks);
        Ok(())
    }

    fn is_mounted(&self) -> bool {
        self.is_initialized()
    }

    fn is_ready(&self) -> bool {
        self.is_initialized()
    }

    fn is_streaming_active(&self, interface: StreamInterface) -> bool {
        interface == self.interface && self.streaming.load(Ordering::SeqCst)
    }

    fn submit_frame(&self, interface: StreamInterface, payload: &[u8]) -> Result<(), UsbError> {
        if self.fail_submits.load(Ordering::SeqCst) {
            return Err(UsbError::Transfer {
                details: "scripted transfer failure".to_string(),
            });
        }
        self.submitted.lock().push((interface, payload.to_vec()));
        Ok(())
    }

    fn service_step(&self) {
        self.service_steps.fetch_add(1, Ordering::SeqCst);
    }
}

use super::descriptors::{UsbDescriptors, LANGID_EN_US, STR_PRODUCT};
use super::transport::{DeviceCallbacks, StreamInterface, UsbTransport};
use crate::error::UsbError;
use parking_lot::Mutex;
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, trace};

/// Timeline of a simulated host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostScript {
    /// Delay from stack init until the host enumerates the device
    pub attach_after: Duration,
    /// Delay from mount until the host commits the stream
    pub commit_after: Duration,
    /// Close the stream after this long; `None` streams forever
    pub stream_for: Option<Duration>,
    /// Gap between closing the stream and committing again
    pub pause_for: Duration,
}

impl Default for HostScript {
    fn default() -> Self {
        Self {
            attach_after: Duration::from_millis(500),
            commit_after: Duration::from_millis(500),
            stream_for: None,
            pause_for: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HostPhase {
    Detached,
    Mounted,
    Streaming,
    Paused,
}

/// Snapshot of what the simulated host has received
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HostStatsSnapshot {
    pub frames_received: u64,
    pub bytes_received: u64,
    pub commits: u64,
    pub busy_rejections: u64,
}

struct HostState {
    callbacks: Option<DeviceCallbacks>,
    phase: HostPhase,
    phase_since: Instant,
    /// Length of the frame currently on the wire
    in_flight: Option<usize>,
    last_frame: Option<Vec<u8>>,
    stats: HostStatsSnapshot,
}

enum HostEvent {
    Mount,
    Commit,
    Uncommit,
    FrameComplete,
}

/// In-process USB device stack with a scripted host on the other end.
///
/// Transfers complete on the `service_step` after they were submitted, so a
/// second submit without servicing in between reports the endpoint busy.
pub struct SimulatedUsb {
    interface: StreamInterface,
    script: HostScript,
    state: Mutex<HostState>,
}

impl SimulatedUsb {
    pub fn new(interface: StreamInterface, script: HostScript) -> Self {
        Self {
            interface,
            script,
            state: Mutex::new(HostState {
                callbacks: None,
                phase: HostPhase::Detached,
                phase_since: Instant::now(),
                in_flight: None,
                last_frame: None,
                stats: HostStatsSnapshot::default(),
            }),
        }
    }

    pub fn stats(&self) -> HostStatsSnapshot {
        self.state.lock().stats.clone()
    }

    /// Copy of the last frame the host received
    pub fn last_frame(&self) -> Option<Vec<u8>> {
        self.state.lock().last_frame.clone()
    }

    fn enumerate(&self, descriptors: &UsbDescriptors) {
        let device = descriptors.device();
        let configuration = descriptors.configuration(0);
        let product = descriptors
            .string(STR_PRODUCT, LANGID_EN_US)
            .and_then(|units| String::from_utf16(units.get(1..)?).ok())
            .unwrap_or_default();

        debug!(
            "Host enumerated {:02X}{:02X}:{:02X}{:02X} \"{}\" ({} byte device, {} byte configuration)",
            device[9],
            device[8],
            device[11],
            device[10],
            product,
            device.len(),
            configuration.len()
        );
    }

    /// Advance the host timeline; returns the events to deliver
    fn advance(&self, state: &mut HostState, now: Instant) -> Vec<HostEvent> {
        let mut events = Vec::new();

        if state.in_flight.take().is_some() {
            state.stats.frames_received += 1;
            events.push(HostEvent::FrameComplete);
        }

        let elapsed = now.saturating_duration_since(state.phase_since);
        let next = match state.phase {
            HostPhase::Detached if elapsed >= self.script.attach_after => {
                if let Some(callbacks) = &state.callbacks {
                    self.enumerate(&callbacks.descriptors);
                }
                events.push(HostEvent::Mount);
                Some(HostPhase::Mounted)
            }
            HostPhase::Mounted if elapsed >= self.script.commit_after => {
                events.push(HostEvent::Commit);
                Some(HostPhase::Streaming)
            }
            HostPhase::Streaming => match self.script.stream_for {
                Some(limit) if elapsed >= limit => {
                    events.push(HostEvent::Uncommit);
                    Some(HostPhase::Paused)
                }
                _ => None,
            },
            HostPhase::Paused if elapsed >= self.script.pause_for => {
                events.push(HostEvent::Commit);
                Some(HostPhase::Streaming)
            }
            _ => None,
        };

        if let Some(phase) = next {
            trace!("Simulated host {:?} -> {:?}", state.phase, phase);
            if phase == HostPhase::Streaming {
                state.stats.commits += 1;
            }
            state.phase = phase;
            state.phase_since = now;
        }

        events
    }
}

impl UsbTransport for SimulatedUsb {
    fn init(&self, callbacks: DeviceCallbacks) -> Result<(), UsbError> {
        let mut state = self.state.lock();
        if state.callbacks.is_some() {
            return Err(UsbError::Init {
                details: "device stack already initialized".to_string(),
            });
        }
        state.callbacks = Some(callbacks);
        state.phase = HostPhase::Detached;
        state.phase_since = Instant::now();

        info!("Simulated USB device stack ready on {}", self.interface);
        Ok(())
    }

    fn is_mounted(&self) -> bool {
        self.state.lock().phase != HostPhase::Detached
    }

    fn is_ready(&self) -> bool {
        self.is_mounted()
    }

    fn is_streaming_active(&self, interface: StreamInterface) -> bool {
        interface == self.interface && self.state.lock().phase == HostPhase::Streaming
    }

    fn submit_frame(&self, interface: StreamInterface, payload: &[u8]) -> Result<(), UsbError> {
        let mut state = self.state.lock();

        if interface != self.interface || state.phase != HostPhase::Streaming {
            return Err(UsbError::NotStreaming {
                interface: interface.control,
            });
        }
        if state.in_flight.is_some() {
            state.stats.busy_rejections += 1;
            return Err(UsbError::TransferBusy {
                interface: interface.control,
            });
        }

        state.in_flight = Some(payload.len());
        state.stats.bytes_received += payload.len() as u64;
        state.last_frame = Some(payload.to_vec());
        Ok(())
    }

    fn service_step(&self) {
        let (events, callbacks) = {
            let mut state = self.state.lock();
            let Some(callbacks) = state.callbacks.clone() else {
                return;
            };
            (self.advance(&mut state, Instant::now()), callbacks)
        };

        // Deliver outside the lock; sinks may query the transport
        for event in events {
            match event {
                HostEvent::Mount => callbacks.events.on_mount(),
                HostEvent::Commit => callbacks.events.on_commit(self.interface),
                HostEvent::Uncommit => callbacks.events.on_uncommit(self.interface.control),
                HostEvent::FrameComplete => callbacks.events.on_frame_complete(self.interface.control),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UvcCamConfig;
    use crate::usb::UsbEventSink;
    use std::sync::Arc;

    const VIDEO: StreamInterface = StreamInterface {
        control: 0,
        streaming: 0,
    };

    #[derive(Default)]
    struct EventLog(Mutex<Vec<String>>);

    impl UsbEventSink for EventLog {
        fn on_commit(&self, interface: StreamInterface) {
            self.0.lock().push(format!("commit {}", interface));
        }
        fn on_uncommit(&self, control: u8) {
            self.0.lock().push(format!("uncommit {}", control));
        }
        fn on_mount(&self) {
            self.0.lock().push("mount".to_string());
        }
        fn on_unmount(&self) {
            self.0.lock().push("unmount".to_string());
        }
        fn on_frame_complete(&self, control: u8) {
            self.0.lock().push(format!("complete {}", control));
        }
    }

    fn attach(script: HostScript) -> (SimulatedUsb, Arc<EventLog>) {
        let config = UvcCamConfig::default();
        let log = Arc::new(EventLog::default());
        let usb = SimulatedUsb::new(VIDEO, script);
        usb.init(DeviceCallbacks {
            descriptors: Arc::new(UsbDescriptors::new(&config.usb, &config.camera)),
            events: log.clone(),
        })
        .unwrap();
        (usb, log)
    }

    fn script() -> HostScript {
        HostScript {
            attach_after: Duration::from_millis(10),
            commit_after: Duration::from_millis(10),
            stream_for: Some(Duration::from_millis(50)),
            pause_for: Duration::from_millis(20),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_host_timeline() {
        let (usb, log) = attach(script());

        usb.service_step();
        assert!(!usb.is_mounted());

        tokio::time::advance(Duration::from_millis(10)).await;
        usb.service_step();
        assert!(usb.is_mounted());
        assert!(!usb.is_streaming_active(VIDEO));

        tokio::time::advance(Duration::from_millis(10)).await;
        usb.service_step();
        assert!(usb.is_streaming_active(VIDEO));

        tokio::time::advance(Duration::from_millis(50)).await;
        usb.service_step();
        assert!(!usb.is_streaming_active(VIDEO));

        tokio::time::advance(Duration::from_millis(20)).await;
        usb.service_step();
        assert!(usb.is_streaming_active(VIDEO));

        assert_eq!(
            *log.0.lock(),
            vec!["mount", "commit vc0/vs0", "uncommit 0", "commit vc0/vs0"]
        );
        assert_eq!(usb.stats().commits, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_requires_streaming() {
        let (usb, _log) = attach(script());
        assert!(matches!(
            usb.submit_frame(VIDEO, &[0xFF, 0xD8, 0xFF, 0xD9]),
            Err(UsbError::NotStreaming { interface: 0 })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transfer_completes_on_next_service_step() {
        let (usb, log) = attach(HostScript {
            stream_for: None,
            ..script()
        });
        for _ in 0..2 {
            tokio::time::advance(Duration::from_millis(10)).await;
            usb.service_step();
        }
        assert!(usb.is_streaming_active(VIDEO));

        usb.submit_frame(VIDEO, &[1, 2, 3]).unwrap();
        assert!(matches!(
            usb.submit_frame(VIDEO, &[4, 5, 6]),
            Err(UsbError::TransferBusy { .. })
        ));

        usb.service_step();
        usb.submit_frame(VIDEO, &[7, 8]).unwrap();
        usb.service_step();

        let stats = usb.stats();
        assert_eq!(stats.frames_received, 2);
        assert_eq!(stats.bytes_received, 5);
        assert_eq!(stats.busy_rejections, 1);
        assert_eq!(usb.last_frame(), Some(vec![7, 8]));
        assert_eq!(
            log.0.lock().iter().filter(|e| *e == "complete 0").count(),
            2
        );
    }

    #[test]
    fn test_double_init_is_rejected() {
        let config = UvcCamConfig::default();
        let usb = SimulatedUsb::new(VIDEO, HostScript::default());
        let callbacks = DeviceCallbacks {
            descriptors: Arc::new(UsbDescriptors::new(&config.usb, &config.camera)),
            events: Arc::new(EventLog::default()),
        };

        usb.init(callbacks.clone()).unwrap();
        assert!(matches!(usb.init(callbacks), Err(UsbError::Init { .. })));
    }
}

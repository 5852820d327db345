use serde::Serialize;
use std::fmt;

/// Component lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ComponentState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Failed,
}

/// System shutdown reason
#[derive(Debug, Clone, PartialEq)]
pub enum ShutdownReason {
    Signal(String),
    Error(String),
    UserRequest,
}

/// Pipeline parts whose lifecycle the orchestrator tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Component {
    Camera,
    Usb,
    Capture,
    Streaming,
    Status,
}

impl Component {
    pub const ALL: [Component; 5] = [
        Component::Camera,
        Component::Usb,
        Component::Capture,
        Component::Streaming,
        Component::Status,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Component::Camera => "camera",
            Component::Usb => "usb",
            Component::Capture => "capture",
            Component::Streaming => "streaming",
            Component::Status => "status",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

use chrono::{DateTime, Local};
use std::fmt;

/// Substring identifying lines about the monitored camera.
pub const DEVICE_MARKER: &str = "Insta360";
/// Substring present when a capture session adds the camera as an input.
pub const INPUT_ADDED_MARKER: &str = "addInput:";
/// Substring present when a capture session drops the camera as an input.
pub const INPUT_REMOVED_MARKER: &str = "removeInput:";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceActivityEvent {
    Started,
    Stopped,
}

impl DeviceActivityEvent {
    pub fn status(self) -> CameraStatus {
        match self {
            DeviceActivityEvent::Started => CameraStatus::Active,
            DeviceActivityEvent::Stopped => CameraStatus::Inactive,
        }
    }

    fn glyph(self) -> &'static str {
        match self {
            DeviceActivityEvent::Started => "🟢",
            DeviceActivityEvent::Stopped => "🔴",
        }
    }

    fn verb(self) -> &'static str {
        match self {
            DeviceActivityEvent::Started => "STARTED",
            DeviceActivityEvent::Stopped => "STOPPED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraStatus {
    Active,
    Inactive,
}

impl fmt::Display for CameraStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraStatus::Active => write!(f, "Active"),
            CameraStatus::Inactive => write!(f, "Inactive"),
        }
    }
}

/// Classify a single line of log output.
///
/// Lines that do not mention the device are ignored even when they carry an
/// add/remove marker. If both markers appear, the add marker wins.
pub fn classify(line: &str) -> Option<DeviceActivityEvent> {
    if !line.contains(DEVICE_MARKER) {
        return None;
    }

    if line.contains(INPUT_ADDED_MARKER) {
        Some(DeviceActivityEvent::Started)
    } else if line.contains(INPUT_REMOVED_MARKER) {
        Some(DeviceActivityEvent::Stopped)
    } else {
        None
    }
}

/// Format a status line, e.g. `[2024-05-01 09:30:00] 🟢 Camera STARTED (Active)`.
pub fn render(event: DeviceActivityEvent, at: DateTime<Local>) -> String {
    format!(
        "[{}] {} Camera {} ({})",
        at.format(TIMESTAMP_FORMAT),
        event.glyph(),
        event.verb(),
        event.status()
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Changed,
    Repeated,
}

/// Last known camera status and when it was observed.
#[derive(Debug, Default)]
pub struct CameraState {
    current: Option<(CameraStatus, DateTime<Local>)>,
}

impl CameraState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: DeviceActivityEvent, at: DateTime<Local>) -> Transition {
        let status = event.status();
        let transition = match self.current {
            Some((previous, _)) if previous == status => Transition::Repeated,
            _ => Transition::Changed,
        };
        self.current = Some((status, at));
        transition
    }

    pub fn since(&self) -> Option<DateTime<Local>> {
        self.current.map(|(_, at)| at)
    }
}

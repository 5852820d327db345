mod bringup;
mod sensor;
#[cfg(feature = "simulation")]
mod sim;
mod source;

pub use bringup::{bring_up, reinitialize};
pub use sensor::SensorSettings;
#[cfg(feature = "simulation")]
pub use sim::{FaultPlan, SimulatedCamera, SimulatedCameraBuilder};
pub use source::FrameSource;

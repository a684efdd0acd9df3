pub mod capture;
pub mod common;
pub mod controller;
pub mod dodger;
pub mod error;
pub mod input;
mod pacer;
#[cfg(feature = "dodger")]
pub mod window;

pub use controller::{LoopConfig, LoopSummary, RealTimeLoop, StopReason, Tick};
pub use error::{BoxError, CaptureError, LoopError};
pub use input::{Input, InputSource, Keys, NoInput};

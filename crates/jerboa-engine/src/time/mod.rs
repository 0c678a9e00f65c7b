//! Frame timing.
//!
//! The application owns one [`FrameClock`] and ticks it once per loop
//! iteration; layers receive the resulting [`FrameTime`].

mod frame_clock;

pub use frame_clock::{FrameClock, FrameTime};

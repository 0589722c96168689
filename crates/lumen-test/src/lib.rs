//! Test harness for the Lumen renderer.
//!
//! Provides mock implementations of the device, presentation surface and
//! window seams that record every call into a shared [`EventLog`], so the
//! frame protocol can be checked without a GPU or a display.

pub mod events;
pub mod harness;
pub mod mocks;

pub use events::{is_present, is_rebuild, is_submit, Event, EventLog};
pub use harness::{mock_slots, FrameRig, RigConfig, MOCK_INDEX_COUNT};
pub use mocks::{MockDevice, MockState, MockSurface, MockWindow, Scripted};

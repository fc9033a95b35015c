//! Platform primitives: tick counter, CPU affinity, scheduling priority,
//! region allocation, and topology discovery.
//!
//! Everything architecture- or OS-specific lives behind the small functions
//! in this module tree; the benchmark core calls only these.

pub mod affinity;
pub mod priority;
pub mod region;
pub mod tick;
pub mod topology;

pub use affinity::{pin_to_cpu, unpin_thread};
pub use priority::{boost_priority, revert_priority};
pub use region::Region;
pub use tick::{calibrate_timer, start_tick, stop_tick, TimerCalibration};
pub use topology::Topology;

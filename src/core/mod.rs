//! Core engine primitives (planner, debounce, sessions, supervisor) and the
//! HTTP control plane.

pub mod chunks;
pub mod cooldown;
pub mod http;
pub mod session;
pub mod signal;
pub mod supervisor;

pub use chunks::partition;
pub use cooldown::{CooldownKey, CooldownStore};
pub use session::{ChunkOutcome, Session, SessionSummary};
pub use supervisor::{MonitoringSupervisor, StopOutcome};

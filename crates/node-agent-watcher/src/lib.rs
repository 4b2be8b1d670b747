//! node-agent-watcher — the node health reconciliation engine.
//!
//! # Architecture
//!
//! ```text
//! Scheduler (fixed interval, watch-channel shutdown)
//!   └── Reconciler::run_once()
//!         ├── NodeSource::list_nodes(pool selector)
//!         └── per node, in listing order
//!               ├── health::evaluate()          healthy   → skip
//!               ├── DebounceGuard::should_suppress()  recent → skip
//!               └── InstanceRebooter::find_instance() + hard_reboot()
//! ```
//!
//! # Failure handling
//!
//! A listing failure aborts the tick before any node is evaluated. A
//! lookup or reboot failure aborts the REST of the tick: nodes after the
//! failing one are not evaluated until the next tick. This fail-fast
//! behavior is deliberate; collecting per-node errors and continuing
//! would change remediation guarantees. Nothing is retried inside a tick.

pub mod fake;
pub mod reconciler;
pub mod scheduler;

pub use reconciler::Reconciler;
pub use scheduler::Scheduler;

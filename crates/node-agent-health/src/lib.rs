//! node-agent-health — pure node health evaluation.
//!
//! Two side-effect-free decisions run for every node on every tick:
//!
//! ```text
//! evaluate(node, desired_gpu)          → Healthy | Unhealthy
//!   ├── is_node_ready        first Ready condition has status True
//!   └── has_desired_gpu_count  allocatable GPU == desired (skipped when 0)
//!
//! DebounceGuard::should_suppress(node, now) → bool
//!   latest Ready transition newer than (now - cooldown)?
//! ```
//!
//! # Duplicate Ready conditions
//!
//! A node may report the `Ready` condition more than once. Readiness is
//! decided by the FIRST entry in reported order, while the debounce guard
//! uses the LATEST transition time across all of them. The two rules are
//! intentionally different and must not be unified without revisiting
//! remediation timing.

pub mod checker;
pub mod debounce;

pub use checker::{evaluate, has_desired_gpu_count, is_node_ready};
pub use debounce::{DebounceGuard, should_suppress};

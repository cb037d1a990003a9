//! Request Governor
//!
//! Sliding admission control placed in front of every outbound completion
//! request. Each [`ContextId`] gets its own fixed window; the window resets
//! lazily on the first check after it has elapsed, measured against an
//! injected [`Clock`](crate::clock::Clock).
//!
//! ```ignore
//! let governor = RequestGovernor::new(GovernorConfig::new(10, 60_000));
//! governor.admit(&ContextId::global())?;
//! ```

mod service;
mod window;

pub use service::{AdmissionControl, ContextId, GovernorConfig, RequestGovernor};
pub use window::{RateLimitWindow, WindowSnapshot};

//! Streaming anomaly analytics.
//!
//! Three small, independently testable pieces make up the per-signal chain:
//!
//! ```text
//! value -> WindowModel::observe -> classify (if warm) -> TrendWindow::record
//! ```
//!
//! The pipeline engine owns one chain per signal sub-key; the pieces here
//! carry no key awareness of their own.

pub mod trend;
pub mod window;
pub mod zscore;

pub use trend::TrendWindow;
pub use window::{WindowModel, WindowStats};
pub use zscore::{classify, ZScoreResult};

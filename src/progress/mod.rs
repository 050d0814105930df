//! Progress module containing progress bar functionality.
//!
//! This module renders the events of a download as a terminal progress bar.
//! It is optional: the library itself never draws anything, callers feed
//! the events they receive to a [`ProgressDisplay`].
//!
//! # Overview
//!
//! - `style` - Progress bar styling options and templates
//! - `display` - Progress bar driven by download events
//!
//! # Examples
//!
//! ## Hidden Progress Bars
//!
//! ```rust
//! use tributary::progress::{ProgressBarOpts, ProgressDisplay};
//!
//! let display = ProgressDisplay::new(ProgressBarOpts::hidden());
//! ```

pub(crate) mod display;
pub(crate) mod style;

pub use display::ProgressDisplay;
pub use style::ProgressBarOpts;

// src/output/mod.rs

//! Output multiplexing.
//!
//! - [`line_buffer`] assembles raw chunks into lines (pure, no IO).
//! - [`multiplexer`] owns the shared sink and the per-stream channels that
//!   write complete lines to it under a single mutex.

pub mod line_buffer;
pub mod multiplexer;

pub use line_buffer::LineBuffer;
pub use multiplexer::{forward_stream, OutputChannel, OutputMultiplexer};

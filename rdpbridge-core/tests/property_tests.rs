//! Property-based tests for RdpBridge core library
//!
//! This module contains property-based tests for the pixel converter, the
//! UI operation queue, the input channel, the display dispatcher and the
//! connection worker.

mod properties;

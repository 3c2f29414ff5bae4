//! Property-based tests for RdpBridge core library

mod dispatcher_tests;
mod input_tests;
mod pixel_tests;
mod queue_tests;
mod worker_tests;

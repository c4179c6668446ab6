//! Test modules for the queue system
//!
//! Tests are organized by functional area; shared handlers and helpers live
//! in `support`.

mod edge_cases;
mod support;

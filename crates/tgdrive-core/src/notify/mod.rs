//! Notification sink decorators.

pub mod throttled;

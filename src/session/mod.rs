//! Session lifecycle: control queue, controller, frame interceptor, and the
//! application-facing facade.

pub mod commands;
pub mod control;
pub mod controller;
pub mod interceptor;

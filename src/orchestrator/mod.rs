//! Application-level orchestration utilities.
//!
//! This module owns the render lifecycle (serialized generation requests) and
//! post-generation processing such as recording history. UI/CLI layers call
//! into this module to keep responsibilities separated.

mod controller;
mod post_process;

pub(crate) use controller::{run_controller, UiCommand};
pub(crate) use post_process::process_generation;

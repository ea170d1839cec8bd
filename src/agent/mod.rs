//! Agent module - the plan/act control loop.
//!
//! The loop alternates two states over an append-only conversation:
//! 1. Plan: call the LLM with the full history and the declared tool schema
//! 2. Act: execute any requested tool calls and feed results back
//! 3. Repeat until the model answers without tool calls or the round cap hits

mod control_loop;
mod prompt;

pub use control_loop::{ControlLoop, LoopError, LoopEvent, LoopNode};
pub use prompt::build_system_prompt;

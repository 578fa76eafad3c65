//! Core runtime — the orchestrator that turns one user message into a final
//! assistant answer, driving repeated completion calls and tool dispatch.

pub mod turn;

pub use turn::{run_turn, ImageAttachment, TurnInput, TurnOutcome, MAX_TOOL_ITERATIONS};

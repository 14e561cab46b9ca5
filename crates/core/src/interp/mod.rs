//! Content stream interpretation.
//!
//! This module contains:
//! - `interpreter`: the resumable [`ContentInterpreter`]
//! - `commands`: drawing commands and the [`DrawingSink`] they go to
//! - `task`: interpreter states, step budgets and cancellation
//! - `form_cache`: memoized Form XObject command lists
//! - `ops`: operator implementations by category

pub mod commands;
pub mod form_cache;
pub mod interpreter;
pub mod ops;
pub mod task;

pub use commands::{
    CommandList, DrawCommand, DrawingSink, ImageCommand, PathCommand, PathSegment, TextCommand, TextItem,
    WindingRule,
};
pub use form_cache::{FormCache, FormKey};
pub use interpreter::{ContentInterpreter, InterpreterOptions};
pub use ops::parse_color_space;
pub use task::{CancellationToken, InterpreterState, StepBudget};

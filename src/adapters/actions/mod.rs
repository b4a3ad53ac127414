//! Agent action adapters.
//!
//! - `FnAction`: wraps an async closure
//! - `TemplateAction`: renders a text template from the agent's context

pub mod fn_action;
pub mod template;

pub use fn_action::FnAction;
pub use template::{render_template, TemplateAction};

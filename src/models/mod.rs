//! Entity schemas for FocusTools.
//!
//! - [`Task`]: a to-do item. Created, read, updated and deleted through the API.
//! - [`Session`]: a completed Pomodoro interval, optionally linked to a task.
//!   Append-only.
//!
//! Client documents are validated at the boundary by [`NewTask`],
//! [`TaskPatch`] and [`NewSession`], which either yield a normalized value or
//! a [`ValidationError`] naming every rejected field.

mod session;
mod task;
mod validation;

pub use session::*;
pub use task::*;
pub use validation::{FieldError, ValidationError};

//! UI helpers for a consistent CLI experience
//!
//! Interactive terminals get symbols, colors and an `indicatif` spinner;
//! CI and piped output fall back to plain bracketed prefixes.
//!
//! # Example
//!
//! ```rust,ignore
//! use vcsdeps::ui::{self, UiContext, TaskSpinner};
//!
//! let ctx = UiContext::detect();
//!
//! let mut spinner = TaskSpinner::new(&ctx);
//! spinner.start("Resolving https://example/repo.git...");
//! // ... do work ...
//! spinner.stop("Resolved 2 constraint(s)");
//!
//! ui::step_warn_hint(&ctx, "Config already exists", "Use --force to overwrite");
//! ```

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{
    remark, step_error, step_error_detail, step_info, step_ok, step_ok_detail, step_warn_hint,
};
pub use progress::TaskSpinner;

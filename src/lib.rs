//! Replays recorded screen interactions (image-based clicks, keystrokes,
//! timed waits) from a declarative YAML action script.
//!
//! The interpreter is synchronous and runs one script per [`CancelToken`];
//! the host sets the token from its own thread to stop a run. All screen
//! I/O goes through the [`Automation`] trait, so hosts plug in their own
//! driver and tests run against a scripted capability.

pub mod automation;
pub mod cancel;
pub mod interpreter;
pub mod script;

pub use automation::{Automation, LogAutomation, Point};
pub use cancel::CancelToken;
pub use interpreter::{process_steps, run, Flow, RunError};
pub use script::{Action, ParseError, Script, Step};

pub mod parser;

pub use parser::{Action, ParseError, Script, Step};

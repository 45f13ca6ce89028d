//! Link grammar.
//!
//! A link is a declarative default-value reference from one option to
//! another: `$[./]([../]*)path[?priority=N]$`. Relative links (`./`, `../`)
//! resolve against the dependent's context chain; bare links resolve from the
//! tree root. Parsing is memoised process-wide.

mod parser;


pub use parser::{is_link, parse, Link};

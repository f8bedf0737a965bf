//! # strfmt
//!
//! Brace-placeholder string interpolation. A template such as
//! `"Today is a {0,-10} day"` is expanded against positional values, a
//! key/value map, or any structured record.
//!
//! ## Features
//!
//! - Positional `{0}` and named `{Key}` placeholders
//! - Column alignment: `{0,8}` pads on the left, `{0,-8}` on the right
//! - Time re-rendering: `{0:2006-01-02}` reads a `Mon, 02 Jan 2006 15:04:05 -0700`
//!   timestamp and writes it with the given reference layout
//! - `{{` and `}}` for literal braces
//! - Records flattened through the [`Record`] trait or through `serde`
//!
//! ## Usage
//!
//! ### As a Library
//!
//! ```
//! use std::collections::HashMap;
//!
//! let text = strfmt::expand_indexed("Today is a {0} day", &["wonderful"]).unwrap();
//! assert_eq!(text, "Today is a wonderful day");
//!
//! let values = HashMap::from([("day", "Mon, 02 Jan 2006 15:04:05 -0700")]);
//! let text = strfmt::expand_named("{day:Jan 2, 2006}", &values).unwrap();
//! assert_eq!(text, "Jan 2, 2006");
//! ```
//!
//! ### As a CLI Tool
//!
//! ```bash
//! # Positional values
//! strfmt "Hello {0}, you are {1} years old" -a Ada -a 36
//!
//! # Named values
//! strfmt "{name,-10}|" -s name=Ada
//!
//! # Fields of a JSON document
//! strfmt "{title} ({year})" --json movie.json
//! ```

pub mod error;
pub mod record;
pub mod scanner;
pub mod template;
pub mod timefmt;

// Re-export main types and functions for convenience
pub use error::{ErrorKind, FormatError, Result, StrfmtError};
pub use record::{Field, FieldValue, Record, ToFieldValue, flatten, flatten_serialize};
pub use scanner::{Alignment, Selector, SelectorMode};
pub use template::{
    Named, Placeholder, Positional, Resolver, expand, expand_indexed, expand_named,
    expand_record, expand_serialize, parse_placeholders,
};

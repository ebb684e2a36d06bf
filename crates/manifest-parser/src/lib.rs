//! # manifest-parser
//!
//! Locate dependency declarations in a Cargo.toml without a full TOML parser.
//!
//! The scanner works line by line so it keeps working on manifests that are
//! half edited. For every dependency it records the requirement text, the
//! feature list and the `default-features` flag together with the byte
//! ranges needed to rewrite them in place.
//!
//! Three declaration styles are recognized:
//!
//! ```toml
//! [dependencies]
//! serde = "1.0"                                         # plain
//! tokio = { version = "1", features = ["fs", "net"] }   # inline table
//!
//! [dependencies.rand]                                   # table
//! version = "0.8"
//! default-features = false
//! ```
//!
//! Known limitations:
//! - the first `#` on a line always starts a comment, even inside quotes;
//! - arrays spanning several lines are only read up to the end of their
//!   first line;
//! - an inline table spanning several lines only contributes what is on its
//!   first line, the lines up to the closing `}` are skipped.

mod dependency;
mod features;
mod range;
mod walker;

pub use dependency::{Dependency, DependencySyntax, FeatureDecl, FieldDecl, QuoteChars};
pub use features::tokenize_features;
pub use range::Range;
pub use walker::{parse, parse_str};

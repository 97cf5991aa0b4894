//! Compile-failure checks for `STATIC_TEST` blocks.
//!
//! A block such as
//!
//! ```text
//! STATIC_TEST(Foo) {
//!   Foo foo;
//!   SHOULD_NOT_COMPILE(foo.stuff());
//!   SHOULD_NOT_COMPILE_WITH_MESSAGE(foo.other(), "has no member named 'other'");
//! }
//! ```
//!
//! is turned into one program per directive, each built with the command the
//! project's `compile_commands.json` records for the file. A directive holds
//! when the build fails and, if a message was given, the compiler output
//! contains it.

pub mod block;
pub mod braces;
pub mod command;
pub mod compdb;
pub mod directive;
pub mod error;
pub mod program;
pub mod runner;
pub mod toolchain;
pub mod verdict;

pub use error::StaticTestError;
pub use runner::{run_static_test, RunOptions};
pub use verdict::{FailureKind, RunReport, Verdict};

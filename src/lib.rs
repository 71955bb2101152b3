//! `toyscript` is the library that powers the toyscript interpreter.
//!
//! toyscript is a small, fully parenthesised scripting language evaluated by
//! walking its syntax tree. The pipeline is the usual one:
//! - `Scanner` turns source text into `Token`s and never fails; bad input
//!   becomes an error token.
//! - `Parser` builds a `Program` and reports problems as malformed nodes plus
//!   an error flag instead of bailing out on the first one.
//! - `Interpreter` evaluates the program against a root `Frame` holding the
//!   builtin runtime library, and surfaces failures as `ToyError`s.
//!
//! `@async` blocks run on their own OS threads and talk to the rest of the
//! program through rendezvous channels.
#![warn(clippy::pedantic)]

pub mod core;

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Declarative macros shared by the kestrel bytecode compiler.
//!
//! # Macros Overview
//!
//! ## Types
//! - [`index_newtype!`] - Arena handles (registers, labels, scopes, variables)
//! - [`int_enum!`] - Enums convertible to/from integers
//! - [`const_assert!`] - Compile-time assertions
//!
//! ## Instruction Set
//! - [`opcodes!`] - Opcode table with mnemonics and operand formats
//!
//! ## Error Handling
//! - [`bail!`] - Early return with an error
//! - [`ensure!`] - Assertion that returns an error instead of panicking
//!
//! ## Testing
//! - [`assert_matches!`], [`assert_ok!`], [`assert_err!`], [`assert_some!`],
//!   [`assert_contains!`]
//!
//! # Examples
//!
//! ```
//! use kestrel_macros::*;
//!
//! index_newtype! {
//!     /// A node handle.
//!     pub struct NodeRef(u32) => "n";
//! }
//!
//! #[derive(Debug, PartialEq)]
//! struct Dangling(NodeRef);
//!
//! fn lookup(nodes: &[&str], node: NodeRef) -> Result<String, Dangling> {
//!     ensure!(node.index() < nodes.len(), Dangling(node));
//!     Ok(nodes[node.index()].to_string())
//! }
//!
//! assert_eq!(lookup(&["a", "b"], NodeRef::new(1)), Ok("b".to_string()));
//! assert_eq!(lookup(&["a"], NodeRef::new(4)), Err(Dangling(NodeRef::new(4))));
//! ```

#![warn(missing_docs)]

mod error;
mod opcodes;
mod testing;
mod types;

//! Native Messaging Protocol
//!
//! Length-prefixed JSON over stdio.

pub mod framing;
pub mod stdio;
pub mod types;

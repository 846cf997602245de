//! Class-file name resolution and message framing for an instrumentation
//! agent that ships loaded classes to a remote rewriting service.
//!
//! [`ParsedClass`] indexes the constant pool of borrowed class bytes just far
//! enough to name the class, its superclass and its interfaces.
//! [`MessageChannel`] moves opaque payloads over a byte stream as
//! length-prefixed frames.

#![warn(missing_debug_implementations)]

mod class_names;
mod class_reader;
mod constant_pool;
mod error;
mod message;
mod transport;

pub use class_names::*;
pub use class_reader::*;
pub use constant_pool::*;
pub use error::*;
pub use message::*;
pub use transport::*;

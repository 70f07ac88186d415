//! Transport Implementations
//!
//! Concrete implementations of the domain transport traits.

mod memory;

pub use memory::{FaultPoint, MemoryChannel, MemoryHub, MemoryTransport};

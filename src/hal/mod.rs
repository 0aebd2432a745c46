//! Transport implementations.
//!
//! Concrete implementations of [`crate::traits::Transport`].
//!
//! # Available Implementations
//!
//! - `mock`: in-memory transport for tests
//! - `stream`: any `std::io` reader/writer pair (TCP socket, stdin/stdout, serial device file)

pub mod mock;
pub mod stream;

pub use mock::*;
pub use stream::*;

/* 📖 # Why have mockrest_base as a core library?
mockrest_base provides the error type, tracing setup and the platform abstraction
layer (filesystem + HTTP) used by the engine and the CLI. Keeping these apart from
the routing logic keeps the engine testable against MockPal without sockets or disk.
*/

pub mod error;
mod error_tests;
pub mod pal;
mod pal_tests;
pub mod tracing;

// Re-export commonly used types for convenience
pub use error::{ErrorKind, MockrestError, MockrestResult, ResultExt};
pub use pal::{FilePath, MockPal, Pal, PalHandle, RealPal};

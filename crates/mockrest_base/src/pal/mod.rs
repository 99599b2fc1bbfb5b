/* 📖 # What is the Platform Abstraction Layer?

The PAL is the only place that touches the filesystem or the network.
The engine reads documents and templates and serves HTTP through it, so:
- RealPal: std::fs relative to the working directory, tiny_http for serving
- MockPal: in-memory files and simulated requests for deterministic tests
*/

mod file_path;
pub mod http;
pub mod mock;
pub mod real_pal;
mod traits;

pub use file_path::FilePath;
pub use mock::MockPal;
pub use real_pal::RealPal;
pub use traits::{Pal, PalHandle};

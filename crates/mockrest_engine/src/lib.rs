/* 📖 # What does the engine do?

mockrest_engine turns a JSON document into a REST API. At startup the router walks
the document's top-level entries once: objects become singular resources, arrays
become plural collections, anything else aborts startup. Requests then flow through
a fixed pipeline of stages (method override, body decoding, `/db`, nested resolution,
resource routers, fallback) and end in the renderer, which answers with JSON(P) or a
hypermedia template.
*/

pub mod config;
pub mod document;
pub mod inflect;
pub mod render;
pub mod router;
pub mod store;

pub use config::{Options, load_options};
pub use document::{Document, EntryShape, classify};
pub use render::{Renderer, TemplateKey};
pub use router::{RenderContext, RoutingSurface, Stage};
pub use store::{DocumentStore, IdentityStore, InMemoryStore, JsonFileStore, StoreHandle};

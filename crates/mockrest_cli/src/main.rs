/* 📖 # What does the mockrest binary do?

It serves one JSON file as a REST API:

    mockrest db.json --port 3000

Options come from an optional TOML file (`--config`) with command line flags taking
precedence. Paths (document, config, templates) are resolved against the current
directory. Every mutation rewrites the document file, so the file always reflects
what the API has served.

Exit codes:
- 0: never reached while serving; the server runs until the process is stopped
- 1: startup failed (unreadable document, unsupported entry, bind error, ...)
*/

mod args;

use std::env;
use std::process;

use clap::Parser;
use tracing::info;

use mockrest_base::pal::http::HttpServerConfig;
use mockrest_base::tracing::init_tracing;
use mockrest_base::{FilePath, MockrestResult, Pal, PalHandle, RealPal, ResultExt};
use mockrest_engine::router::ResourceKind;
use mockrest_engine::{JsonFileStore, Options, RoutingSurface, StoreHandle, load_options};

use crate::args::Args;

fn main() {
    let args = Args::parse();

    if let Err(e) = init_tracing() {
        eprintln!("Warning: {}", e);
    }

    if let Err(e) = run(args) {
        eprintln!("Error: {:?}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> MockrestResult<()> {
    let current_dir = env::current_dir()
        .map_err(|e| mockrest_base::err!("Failed to get current directory: {}", e))?;
    let pal = PalHandle::new(RealPal::new(current_dir));

    let options = match &args.config {
        Some(path) => load_options(&*pal, &FilePath::from(path.as_path()))?,
        None => Options::default(),
    };
    let options = args.override_options(options);

    let source = FilePath::from(args.source.as_path());
    let store = StoreHandle::new(JsonFileStore::open(pal.clone(), source.clone())?);
    let surface = RoutingSurface::build(store, options, pal.clone())
        .with_context(|| format!("Failed to build routes for {}", source))?;

    println!("Resources");
    for resource in surface.resources() {
        let kind = match resource.kind {
            ResourceKind::Plural => "collection",
            ResourceKind::Singular => "object",
        };
        println!("  /{} ({})", resource.name, kind);
    }

    let config = HttpServerConfig::new(args.host.clone()).with_port(args.port);
    let handle = pal.start_http_server(Box::new(surface), config)?;
    info!(port = handle.port(), "server started");
    println!("\nServing {} at http://{}", source, handle.address(&args.host));

    // The worker thread owns the surface; keep the handle alive while serving.
    loop {
        std::thread::park();
    }
}

use std::path::PathBuf;

use clap::Parser;

use mockrest_engine::Options;

#[derive(Parser, Debug)]
#[command(name = "mockrest")]
#[command(about = "Serve a full REST API from a JSON file", long_about = None)]
pub struct Args {
    /// JSON document to serve. Created holding `{}` if it does not exist.
    pub source: PathBuf,

    /// Host to bind
    #[arg(long, default_value = "localhost")]
    pub host: String,

    /// Port to bind
    #[arg(short, long, default_value_t = 3000)]
    pub port: u16,

    /// TOML file with server options (templates, hypermedia, ...)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Suffix of foreign key fields (`postId` for the default `Id`)
    #[arg(long)]
    pub foreign_key_suffix: Option<String>,

    /// Name of the identity field
    #[arg(long)]
    pub id: Option<String>,

    /// Render responses through the configured templates
    #[arg(long)]
    pub hypermedia: bool,
}

impl Args {
    /// Apply the options given on the command line on top of `options`.
    pub fn override_options(&self, mut options: Options) -> Options {
        if let Some(suffix) = &self.foreign_key_suffix {
            options = options.with_foreign_key_suffix(suffix);
        }
        if let Some(id) = &self.id {
            options = options.with_id(id);
        }
        if self.hypermedia {
            options = options.with_hypermedia(true);
        }
        options
    }
}

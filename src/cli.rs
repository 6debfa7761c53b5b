use std::path::PathBuf;

use clap::{ArgGroup, Parser};

#[derive(Parser, Debug, Clone)]
#[command(name = "dgpt", about = "DataGPT: ask questions about tabular data", version)]
#[command(group(ArgGroup::new("cache_switch").args(["cache", "no_cache"]).multiple(false)))]
pub struct Cli {
    /// CSV or Excel file to analyze.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Question about the data; omit it (and stdin) to start an
    /// interactive session.
    #[arg(value_name = "QUESTION")]
    pub question: Option<String>,

    /// Large language model to use.
    #[arg(long)]
    pub model: Option<String>,

    /// Randomness of generated output.
    #[arg(long, default_value_t = 0.0, value_parser = clap::value_parser!(f32))]
    pub temperature: f32,

    /// Limits highest probable tokens (words).
    #[arg(long = "top-p", default_value_t = 1.0, value_parser = clap::value_parser!(f32))]
    pub top_p: f32,

    /// Use the canned generator instead of calling the API.
    #[arg(long)]
    pub offline: bool,

    /// Print the generated code before executing it.
    #[arg(long = "show-code")]
    pub show_code: bool,

    /// Skip the data preview after loading.
    #[arg(long = "no-preview")]
    pub no_preview: bool,

    /// Rows to show in the data preview.
    #[arg(long = "preview-rows")]
    pub preview_rows: Option<usize>,

    /// Cache generated completions.
    #[arg(long)]
    pub cache: bool,
    /// Disable completion caching.
    #[arg(long = "no-cache")]
    pub no_cache: bool,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}

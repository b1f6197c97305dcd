use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "blogcast",
    about = "blogcast - Turn a blog post into an avatar video",
    version,
    long_about = "Summarizes blog content into a narration script with OpenAI, lets you review it, then renders it as a HeyGen avatar video. Run `serve` to expose the same steps as an HTTP API for the browser form."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to ./blogcast.yaml or the user config directory)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the API proxy for the browser form
    Serve {
        /// Address to listen on (overrides server.bind)
        #[arg(short, long, value_name = "ADDR")]
        bind: Option<String>,
    },

    /// Summarize a blog post, review the script, and generate a video
    Generate(GenerateArgs),

    /// Check the status of a video job once
    Status {
        /// Video id returned when the job was started
        #[arg(value_name = "VIDEO_ID")]
        video_id: String,

        /// Go through a running proxy instead of calling the provider directly
        #[arg(long, value_name = "URL", env = "BLOGCAST_SERVER")]
        server: Option<String>,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show or initialize the configuration file
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,

        /// Write the default configuration file
        #[arg(long, conflicts_with = "show")]
        init: bool,
    },
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Blog text; use `-` to read from stdin
    #[arg(long, value_name = "TEXT", conflicts_with = "file", required_unless_present = "file")]
    pub text: Option<String>,

    /// File holding the blog text
    #[arg(short, long, value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Instructions for the summary (tone, key points, length)
    #[arg(short, long, value_name = "NOTES", default_value = "")]
    pub notes: String,

    /// Open the script in $EDITOR before submitting it
    #[arg(short, long)]
    pub edit: bool,

    /// Submit the script without asking for confirmation
    #[arg(short, long)]
    pub yes: bool,

    /// Go through a running proxy instead of calling the providers directly
    #[arg(long, value_name = "URL", env = "BLOGCAST_SERVER")]
    pub server: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Clone, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Plain text
    Text,
    /// JSON with job metadata
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch the transcript of one or more videos
    Fetch {
        /// Video URLs (watch, youtu.be, embed, shorts or live links)
        #[arg(required = true)]
        references: Vec<String>,

        /// Preferred transcript language, or "auto"
        #[arg(short, long)]
        language: Option<String>,

        /// Print the full result as JSON instead of plain text
        #[arg(long)]
        json: bool,

        /// Write the output to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the caption tracks available for a video
    Tracks {
        /// Video URL
        reference: String,
    },

    /// Print the video id extracted from a URL
    Resolve {
        /// Video URL
        reference: String,
    },

    /// Write the default configuration file
    InitConfig {
        /// Output path
        #[arg(short, long, default_value = "tubescribe.toml")]
        output: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fetch_batch() {
        let args = Args::try_parse_from([
            "tubescribe",
            "-v",
            "fetch",
            "https://youtu.be/abc",
            "https://youtu.be/def",
            "--language",
            "hi",
            "--json",
        ])
        .unwrap();

        assert!(args.verbose);
        match args.command {
            Commands::Fetch { references, language, json, output } => {
                assert_eq!(references.len(), 2);
                assert_eq!(language.as_deref(), Some("hi"));
                assert!(json);
                assert!(output.is_none());
            }
            _ => panic!("expected fetch"),
        }
    }

    #[test]
    fn test_fetch_requires_a_reference() {
        assert!(Args::try_parse_from(["tubescribe", "fetch"]).is_err());
    }

    #[test]
    fn test_init_config_default_path() {
        let args = Args::try_parse_from(["tubescribe", "init-config"]).unwrap();
        match args.command {
            Commands::InitConfig { output } => assert_eq!(output, PathBuf::from("tubescribe.toml")),
            _ => panic!("expected init-config"),
        }
    }
}

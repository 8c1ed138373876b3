use clap::{Parser, Subcommand};
use figma_bridge::config::TransportMethod;
use figma_bridge::figma::ImageFormat;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "figma-bridge")]
#[command(
    version,
    about = "Figma data access over the REST API or a local broker",
    long_about = "figma-bridge\n\nFetches Figma file data through a local broker when one is available and falls back to the Figma REST API otherwise.\n\nThe token is read from FIGMA_TOKEN (personal access token) or FIGMA_OAUTH_TOKEN.\nResults are printed as JSON on stdout; errors as JSON on stderr."
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, help = "Enable verbose output (debug logs and progress on stderr)")]
    pub verbose: bool,

    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "Config file (TOML); defaults to ~/.config/figma-bridge/config.toml when present"
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_enum,
        help = "Force a transport instead of detecting one from the environment"
    )]
    pub transport: Option<TransportMethod>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the resolved configuration, broker connection and cache stats
    Status {
        #[arg(long, help = "Attempt a broker connection before reporting")]
        connect: bool,
    },

    /// Fetch file metadata and the document tree
    File {
        #[arg(help = "File key from the Figma URL")]
        key: String,
    },

    /// Export thumbnail URLs for a set of nodes
    Thumbnails {
        #[arg(help = "File key from the Figma URL")]
        key: String,

        #[arg(required = true, num_args = 1.., help = "Node ids, e.g. 123:45")]
        ids: Vec<String>,

        #[arg(long, default_value = "png", help = "Image format (png, jpg, svg, pdf)")]
        format: ImageFormat,

        #[arg(long, default_value = "1", help = "Export scale (0-4]")]
        scale: f32,

        #[arg(long, default_value_t = figma_bridge::thumbnails::DEFAULT_BATCH_SIZE, help = "Ids per export request")]
        batch_size: usize,
    },

    /// Fetch file, user, comments, versions, components and styles in one go
    All {
        #[arg(help = "File key from the Figma URL")]
        key: String,
    },
}

pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_thumbnails_with_defaults() {
        let cli = Cli::parse_from(["figma-bridge", "thumbnails", "KEY", "1:2", "3:4"]);

        match cli.command {
            Commands::Thumbnails {
                key,
                ids,
                format,
                scale,
                batch_size,
            } => {
                assert_eq!(key, "KEY");
                assert_eq!(ids, vec!["1:2", "3:4"]);
                assert_eq!(format, ImageFormat::Png);
                assert_eq!(scale, 1.0);
                assert_eq!(batch_size, 20);
            }
            _ => panic!("expected thumbnails command"),
        }
    }

    #[test]
    fn thumbnails_require_at_least_one_id() {
        assert!(Cli::try_parse_from(["figma-bridge", "thumbnails", "KEY"]).is_err());
    }

    #[test]
    fn global_flags_apply_after_subcommand() {
        let cli = Cli::parse_from([
            "figma-bridge",
            "all",
            "KEY",
            "--transport",
            "broker",
            "--verbose",
        ]);

        assert!(cli.verbose);
        assert_eq!(cli.transport, Some(TransportMethod::Broker));
        assert!(matches!(cli.command, Commands::All { key } if key == "KEY"));
    }

    #[test]
    fn status_connect_flag_defaults_off() {
        let cli = Cli::parse_from(["figma-bridge", "status"]);
        assert!(matches!(cli.command, Commands::Status { connect: false }));
        assert!(cli.config.is_none());
    }
}

use crate::config::Config;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "tmpl")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Render text templates against JSON data", long_about = None)]
pub struct Args {
    /// Template source file
    #[arg(value_name = "TEMPLATE_FILE")]
    pub template_file: Option<PathBuf>,

    /// Template source given inline
    #[arg(short = 't', long = "text", value_name = "TEXT", conflicts_with = "template_file")]
    pub text: Option<String>,

    /// JSON data given inline
    #[arg(short = 'd', long = "data", value_name = "JSON")]
    pub data: Option<String>,

    /// JSON data file
    #[arg(short = 'f', long = "data-file", value_name = "FILE", conflicts_with = "data")]
    pub data_file: Option<PathBuf>,

    /// Template to execute, defaults to the parsed one
    #[arg(short = 'n', long = "name", value_name = "NAME")]
    pub name: Option<String>,

    #[arg(short, long, value_name = "OUTPUT_FILE")]
    pub out: Option<PathBuf>,

    #[arg(long = "left-delim", value_name = "DELIM")]
    pub left_delim: Option<String>,

    #[arg(long = "right-delim", value_name = "DELIM")]
    pub right_delim: Option<String>,

    /// Keep comments in the parsed tree
    #[arg(long = "keep-comments")]
    pub keep_comments: bool,

    /// Maximum nesting of template invocations
    #[arg(long = "max-depth", value_name = "N")]
    pub max_depth: Option<usize>,

    #[arg(long = "color", value_name = "WHEN", default_value = "auto")]
    pub color: ColorChoice,

    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print shell completions
    Complete {
        #[arg(value_name = "SHELL")]
        shell: Shell,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorChoice {
    Auto,
    Always,
    Never,
}

impl std::str::FromStr for ColorChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(ColorChoice::Auto),
            "always" => Ok(ColorChoice::Always),
            "never" => Ok(ColorChoice::Never),
            _ => Err(format!(
                "Invalid color choice: {}. Must be 'auto', 'always', or 'never'",
                s
            )),
        }
    }
}

pub fn generate_completions(shell: Shell) {
    let mut cmd = Args::command();
    let bin_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, &bin_name, &mut io::stdout());
}

pub struct AppConfig {
    pub color_enabled: bool,
    pub verbose: bool,
    pub template: Config,
}

impl AppConfig {
    pub fn from_args(args: &Args) -> Self {
        let color_enabled = match args.color {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => atty::is(atty::Stream::Stderr),
        };

        let mut template = Config::default().emit_comments(args.keep_comments);
        if let Some(left) = &args.left_delim {
            template.left_delim = left.clone();
        }
        if let Some(right) = &args.right_delim {
            template.right_delim = right.clone();
        }
        if let Some(depth) = args.max_depth {
            template = template.max_depth(depth);
        }

        AppConfig {
            color_enabled,
            verbose: args.verbose,
            template,
        }
    }
}

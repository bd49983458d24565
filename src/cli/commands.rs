use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Generate mdatp_onboard.json from a generated params script
#[derive(Parser, Debug)]
#[command(
    name = "mdeonboard",
    about = "Generate mdatp_onboard.json from a generated params script",
    version,
    long_about = "mdeonboard reads a generated params script, extracts the Defender for \
                  Endpoint onboarding values assigned in it, and writes the onboarding JSON \
                  consumed by mdatp on Linux. Scripts that do not parse are still scanned \
                  for recognizable quoted assignments.\n\n\
                  Examples:\n  \
                  sudo mdeonboard ./generated_params.py\n  \
                  mdeonboard ./generated_params.py --print-only\n  \
                  mdeonboard ./generated_params.py -o ./onboard.json --allow-missing"
)]
pub struct CliArgs {
    #[arg(
        value_name = "INPUT",
        help = "Path to the generated params script containing the parameters"
    )]
    pub input: PathBuf,

    #[arg(
        short = 'o',
        long = "out",
        value_name = "FILE",
        help = "Output JSON file (default: /etc/opt/microsoft/mdatp/mdatp_onboard.json, or MDEONBOARD_OUTPUT)"
    )]
    pub out: Option<PathBuf>,

    #[arg(
        long,
        help = "Do not fail on missing required fields; write what was found"
    )]
    pub allow_missing: bool,

    #[arg(long, help = "Print the payload to stdout instead of writing a file")]
    pub print_only: bool,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "json",
        help = "Output format"
    )]
    pub format: OutputFormatArg,

    #[arg(long, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        conflicts_with = "verbose",
        help = "Quiet mode - only log errors"
    )]
    pub quiet: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Json,
    Yaml,
}

impl From<OutputFormatArg> for super::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => super::output::OutputFormat::Json,
            OutputFormatArg::Yaml => super::output::OutputFormat::Yaml,
        }
    }
}

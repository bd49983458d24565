//! Command handlers. Each returns the process exit code.

use crate::cli::commands::CliArgs;
use crate::cli::output::OutputFormatter;
use crate::config::OnboardConfig;
use crate::extract::ExtractionMethod;
use crate::fs::FileSystem;
use crate::onboard::{OnboardError, OnboardService};
use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{debug, error, info};

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;

/// What a successful run produced, for the caller to print.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutput {
    /// Serialized payload to print on stdout
    Printed(String),
    Written(PathBuf),
}

pub fn handle_onboard(args: &CliArgs, config: &OnboardConfig) -> i32 {
    let service = OnboardService::new(crate::fs::RealFileSystem::new());

    match run(&service, args, config) {
        Ok(RunOutput::Printed(text)) => {
            println!("{}", text);
            EXIT_SUCCESS
        }
        Ok(RunOutput::Written(path)) => {
            println!("Wrote {}", path.display());
            EXIT_SUCCESS
        }
        Err(e) => {
            error!("{:#}", e);
            eprintln!("ERROR: {}", user_message(&e));
            EXIT_FAILURE
        }
    }
}

/// Read, extract, validate and render; write unless printing only.
pub fn run<F: FileSystem>(
    service: &OnboardService<F>,
    args: &CliArgs,
    config: &OnboardConfig,
) -> Result<RunOutput> {
    let script = service.read_script(&args.input)?;
    let outcome = service.build(&script, args.allow_missing)?;
    if outcome.method == ExtractionMethod::Fallback {
        info!("payload built from pattern matching; review the output before onboarding");
    }

    let rendered = OutputFormatter::new(args.format.into())
        .format(&outcome.payload)
        .map_err(|e| OnboardError::Serialize(format!("{:#}", e)))?;

    if args.print_only {
        return Ok(RunOutput::Printed(rendered));
    }

    let out = args
        .out
        .clone()
        .unwrap_or_else(|| config.output_path.clone());
    debug!("Output path: {}", out.display());

    service
        .write_output(&out, &rendered)
        .with_context(|| format!("writing onboarding payload to {}", out.display()))?;
    Ok(RunOutput::Written(out))
}

/// The message shown to the user: the onboarding error itself when there is
/// one, without the context chain.
fn user_message(err: &anyhow::Error) -> String {
    match err.downcast_ref::<OnboardError>() {
        Some(e) => e.to_string(),
        None => format!("{:#}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MockFileSystem;
    use clap::Parser;
    use std::path::Path;

    const SCRIPT: &str = "tenant_id = 'abc-123'\nsubscription_id = 's'\nservice_principal_id = 'sp'\nauthType = 'msi'\nazurelocation = 'eu'\ncorrelationId = 'c'\n";

    fn service_with(script: &str) -> OnboardService<MockFileSystem> {
        let fs = MockFileSystem::new();
        fs.add_file("/in/params.py", script);
        OnboardService::new(fs)
    }

    #[test]
    fn test_print_only() {
        let args = CliArgs::parse_from(["mdeonboard", "/in/params.py", "--print-only"]);
        let output = run(&service_with(SCRIPT), &args, &OnboardConfig::default()).unwrap();
        match output {
            RunOutput::Printed(text) => assert!(text.contains("\"OrgId\": \"abc-123\"")),
            other => panic!("expected printed output, got {:?}", other),
        }
    }

    #[test]
    fn test_writes_to_configured_path() {
        let config = OnboardConfig {
            output_path: PathBuf::from("/etc/mdatp/onboard.json"),
            ..OnboardConfig::default()
        };
        let args = CliArgs::parse_from(["mdeonboard", "/in/params.py"]);
        let service = service_with(SCRIPT);

        let output = run(&service, &args, &config).unwrap();
        assert_eq!(output, RunOutput::Written(config.output_path.clone()));
        let written = service.fs().contents(&config.output_path).unwrap();
        assert!(written.ends_with("}\n"));
    }

    #[test]
    fn test_out_flag_overrides_config() {
        let args = CliArgs::parse_from(["mdeonboard", "/in/params.py", "-o", "/tmp/x.json"]);
        let service = service_with(SCRIPT);
        run(&service, &args, &OnboardConfig::default()).unwrap();
        assert!(service.fs().contents(Path::new("/tmp/x.json")).is_some());
    }

    #[test]
    fn test_validation_failure_message() {
        let args = CliArgs::parse_from(["mdeonboard", "/in/params.py", "--print-only"]);
        let err = run(
            &service_with("tenant_id = 'x'\n"),
            &args,
            &OnboardConfig::default(),
        )
        .unwrap_err();
        let message = user_message(&err);
        assert!(message.starts_with("missing required onboarding fields:"));
        assert!(message.contains("AuthType (source key 'authType')"));
    }

    #[test]
    fn test_permission_denied_message() {
        let fs = MockFileSystem::new();
        fs.add_file("/in/params.py", SCRIPT);
        fs.add_file("/etc/mdatp/old.json", "{}");
        fs.set_read_only("/etc/mdatp");
        let service = OnboardService::new(fs);
        let args = CliArgs::parse_from(["mdeonboard", "/in/params.py", "-o", "/etc/mdatp/new.json"]);

        let err = run(&service, &args, &OnboardConfig::default()).unwrap_err();
        assert_eq!(
            user_message(&err),
            "permission denied writing /etc/mdatp/new.json. Try running with sudo."
        );
    }

    #[test]
    fn test_missing_input() {
        let args = CliArgs::parse_from(["mdeonboard", "/in/other.py"]);
        let err = run(&service_with(SCRIPT), &args, &OnboardConfig::default()).unwrap_err();
        assert!(user_message(&err).starts_with("unable to read /in/other.py"));
    }
}

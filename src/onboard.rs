//! Onboarding service orchestration
//!
//! Reads a params script, extracts and validates the onboarding fields, and
//! writes the rendered payload. All file access goes through a
//! [`FileSystem`] so the whole flow can run against an in-memory mock.
//!
//! # Example
//!
//! ```no_run
//! use mdeonboard::fs::RealFileSystem;
//! use mdeonboard::onboard::OnboardService;
//! use std::path::Path;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let service = OnboardService::new(RealFileSystem::new());
//! let script = service.read_script(Path::new("generated_params.py"))?;
//! let outcome = service.build(&script, false)?;
//! println!("{:?}", outcome.payload);
//! # Ok(())
//! # }
//! ```

use crate::extract::{extract_params, ExtractionMethod, KeySet};
use crate::fs::FileSystem;
use crate::output::OnboardPayload;
use crate::validation::{ValidationError, Validator};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum OnboardError {
    #[error("unable to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("unable to create directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("permission denied writing {}. Try running with sudo.", .path.display())]
    PermissionDenied { path: PathBuf },

    #[error("unable to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unable to serialize payload: {0}")]
    Serialize(String),
}

/// Result of turning a script into a payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub payload: OnboardPayload,
    pub method: ExtractionMethod,
}

pub struct OnboardService<F: FileSystem> {
    fs: F,
    keys: KeySet,
    validator: Validator,
}

impl<F: FileSystem> OnboardService<F> {
    pub fn new(fs: F) -> Self {
        Self::with_keys(fs, KeySet::mde())
    }

    pub fn with_keys(fs: F, keys: KeySet) -> Self {
        let validator = Validator::new(&keys);
        Self {
            fs,
            keys,
            validator,
        }
    }

    pub fn fs(&self) -> &F {
        &self.fs
    }

    pub fn read_script(&self, path: &Path) -> Result<String, OnboardError> {
        debug!("Reading params script {}", path.display());
        self.fs
            .read_to_string(path)
            .map_err(|source| OnboardError::Read {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Extract, validate (unless `allow_missing`) and build the payload.
    pub fn build(&self, script: &str, allow_missing: bool) -> Result<Outcome, OnboardError> {
        let extraction = extract_params(script, &self.keys);

        match self.validator.validate(&extraction.fields) {
            Ok(()) => {}
            Err(e) if allow_missing => {
                warn!(
                    missing = e.missing.len(),
                    "required fields missing, continuing because missing fields are allowed"
                );
            }
            Err(e) => return Err(e.into()),
        }

        Ok(Outcome {
            payload: OnboardPayload::from_fields(&extraction.fields),
            method: extraction.method,
        })
    }

    /// Write `contents` plus a trailing newline, creating the parent
    /// directory first.
    pub fn write_output(&self, path: &Path, contents: &str) -> Result<(), OnboardError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            self.fs
                .create_dir_all(dir)
                .map_err(|source| OnboardError::CreateDir {
                    path: dir.to_path_buf(),
                    source,
                })?;
        }

        self.fs
            .write(path, &format!("{}\n", contents))
            .map_err(|source| match source.kind() {
                io::ErrorKind::PermissionDenied => OnboardError::PermissionDenied {
                    path: path.to_path_buf(),
                },
                _ => OnboardError::Write {
                    path: path.to_path_buf(),
                    source,
                },
            })?;

        info!("Wrote onboarding payload to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MockFileSystem;
    use serde_json::json;

    const SCRIPT: &str = r#"
tenant_id = "abc-123"
subscription_id = "sub-1"
service_principal_id = "sp-1"
authType = "msi"
azurelocation = "westeurope"
correlationId = "corr-1"
cloud_propagated = {"region": "eu"}
"#;

    #[test]
    fn test_build_complete_script() {
        let service = OnboardService::new(MockFileSystem::new());
        let outcome = service.build(SCRIPT, false).unwrap();
        assert_eq!(outcome.method, ExtractionMethod::Syntax);
        assert_eq!(outcome.payload.org_id, json!("abc-123"));
        assert_eq!(
            outcome.payload.cloud_propagated_parameters,
            json!({"region": "eu"}).as_object().cloned()
        );
    }

    #[test]
    fn test_build_reports_missing_fields() {
        let service = OnboardService::new(MockFileSystem::new());
        let err = service.build("tenant_id = 'x'\n", false).unwrap_err();
        match err {
            OnboardError::Validation(e) => assert_eq!(e.missing.len(), 5),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_build_allow_missing() {
        let service = OnboardService::new(MockFileSystem::new());
        let outcome = service.build("tenant_id = 'x'\n", true).unwrap();
        assert_eq!(outcome.payload.auth_type, serde_json::Value::Null);
    }

    #[test]
    fn test_read_script_missing() {
        let service = OnboardService::new(MockFileSystem::new());
        let err = service.read_script(Path::new("/nope.py")).unwrap_err();
        assert!(err.to_string().starts_with("unable to read /nope.py"));
    }

    #[test]
    fn test_write_output_creates_directory() {
        let service = OnboardService::new(MockFileSystem::new());
        let path = Path::new("/etc/opt/microsoft/mdatp/mdatp_onboard.json");
        service.write_output(path, "{}").unwrap();
        assert_eq!(service.fs().contents(path).as_deref(), Some("{}\n"));
    }

    #[test]
    fn test_write_output_permission_denied() {
        let fs = MockFileSystem::new();
        fs.add_file("/etc/mdatp/existing.json", "{}");
        fs.set_read_only("/etc/mdatp");
        let service = OnboardService::new(fs);

        let err = service
            .write_output(Path::new("/etc/mdatp/onboard.json"), "{}")
            .unwrap_err();
        assert!(matches!(err, OnboardError::PermissionDenied { .. }));
        assert_eq!(
            err.to_string(),
            "permission denied writing /etc/mdatp/onboard.json. Try running with sudo."
        );
    }

    #[test]
    fn test_write_output_create_dir_failure() {
        let fs = MockFileSystem::new();
        fs.set_read_only("/etc");
        let service = OnboardService::new(fs);
        let err = service
            .write_output(Path::new("/etc/mdatp/onboard.json"), "{}")
            .unwrap_err();
        assert!(matches!(err, OnboardError::CreateDir { .. }));
    }
}

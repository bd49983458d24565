//! mdeonboard - onboarding JSON generator for Microsoft Defender for Endpoint on Linux
//!
//! Generated params scripts assign the onboarding values (tenant, subscription,
//! service principal, ...) as variables in a Python-like syntax. This library
//! recovers those values and turns them into the `mdatp_onboard.json` payload.
//!
//! # Core Concepts
//!
//! - **Syntax-aware extraction**: the script is parsed into a statement tree
//!   and every assignment to a known key is resolved to a literal value
//! - **Fallback extraction**: scripts that do not parse are scanned for
//!   quoted `key = "value"` pairs and a brace-delimited propagated block
//! - **Validation**: the six required fields must be present and non-empty
//!
//! # Example Usage
//!
//! ```
//! use mdeonboard::{extract_params, KeySet, OnboardPayload};
//!
//! let script = "tenant_id = 'abc-123'\ncloud_propagated = {'region': 'eu'}\n";
//! let extraction = extract_params(script, &KeySet::mde());
//! let payload = OnboardPayload::from_fields(&extraction.fields);
//!
//! assert_eq!(payload.org_id, "abc-123");
//! ```
//!
//! # Project Structure
//!
//! - [`syntax`]: lexer and parser for params scripts
//! - [`extract`]: the two extraction stages and value resolution
//! - [`validation`]: required-field checks
//! - [`output`]: the onboarding payload
//! - [`onboard`]: read/build/write orchestration over a [`fs::FileSystem`]

pub mod cli;
pub mod config;
pub mod extract;
pub mod fs;
pub mod onboard;
pub mod output;
pub mod syntax;
pub mod util;
pub mod validation;

pub use config::{ConfigError, OnboardConfig};
pub use extract::{extract_params, Extraction, ExtractionMethod, FieldMap, KeySet, ResolvedValue};
pub use onboard::{OnboardError, OnboardService};
pub use output::OnboardPayload;
pub use syntax::SyntaxError;
pub use util::{init_logging, LoggingConfig};
pub use validation::{ValidationError, Validator};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

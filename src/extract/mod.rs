//! Two-stage parameter extraction
//!
//! The syntax-aware stage runs first. If the document does not parse, the
//! pattern-based fallback recovers whatever quoted scalars and propagated
//! parameter block it can find.

pub mod fallback;
pub mod keys;
pub mod resolve;
pub mod syntax;
pub mod value;

pub use fallback::FallbackExtractor;
pub use keys::{KeyKind, KeySet, RequiredField, CLOUD_KEY, PROPAGATED_KEY};
pub use resolve::{literal_eval, resolve, LiteralError};
pub use value::{FieldMap, Mapping, ResolvedValue, Scalar};

use serde::Serialize;
use tracing::{info, warn};

/// Which stage produced an [`Extraction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    Syntax,
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub fields: FieldMap,
    pub method: ExtractionMethod,
}

/// Extract known parameters from a params script. Never fails.
pub fn extract_params(text: &str, keys: &KeySet) -> Extraction {
    match syntax::extract(text, keys) {
        Ok(fields) => {
            info!(fields = fields.len(), "extracted parameters from parsed script");
            Extraction {
                fields,
                method: ExtractionMethod::Syntax,
            }
        }
        Err(e) => {
            warn!(error = %e, "script does not parse, falling back to pattern matching");
            let fields = fallback::extract(text, keys);
            info!(fields = fields.len(), "recovered parameters by pattern matching");
            Extraction {
                fields,
                method: ExtractionMethod::Fallback,
            }
        }
    }
}

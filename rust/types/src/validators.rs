use chroma_error::{ChromaError, ErrorCodes};
use thiserror::Error;
use validator::ValidateRange;

/// Errors raised while constructing or combining configuration values.
///
/// These are raised at the offending call (a setter, a `build()`, or an update merge)
/// and always name the field or rule that was violated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("{field} must be {constraint}")]
    InvalidValue {
        field: &'static str,
        constraint: String,
    },
    #[error("cannot mix HNSW and SPANN fields on the same configuration")]
    MixedIndexParams,
    #[error("must set at least one field to update")]
    EmptyUpdate,
    #[error("cannot update both HNSW and SPANN fields in the same update")]
    UpdateBothIndexParams,
    #[error("cannot switch collection index parameters between HNSW and SPANN")]
    IndexFamilySwitch,
    #[error("a known embedding function must have a non-blank name")]
    BlankEmbeddingFunctionName,
    #[error("schema key names must not be blank")]
    BlankKey,
    #[error("value types for schema key '{0}' must not be empty")]
    EmptyValueTypes(String),
    #[error("CMEK resource '{resource}' does not match the {provider} pattern {pattern}")]
    InvalidCmek {
        provider: &'static str,
        resource: String,
        pattern: &'static str,
    },
}

impl ChromaError for ConfigurationError {
    fn code(&self) -> ErrorCodes {
        ErrorCodes::InvalidArgument
    }
}

/// An unrecognised string for one of the enumerated value types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported {kind} '{value}', expected one of: {expected}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
    pub expected: &'static str,
}

impl ChromaError for ParseEnumError {
    fn code(&self) -> ErrorCodes {
        ErrorCodes::InvalidArgument
    }
}

/// Trims and folds ASCII case. Enum parsing never depends on the process locale.
pub(crate) fn fold_token(input: &str) -> String {
    input.trim().to_ascii_lowercase()
}

fn widen(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

pub(crate) fn ensure_at_least(
    field: &'static str,
    value: i64,
    min: i64,
) -> Result<usize, ConfigurationError> {
    if !value.validate_range(Some(min), None, None, None) {
        let constraint = if min == 1 {
            "> 0".to_string()
        } else {
            format!("> {}", min - 1)
        };
        return Err(ConfigurationError::InvalidValue { field, constraint });
    }
    usize::try_from(value).map_err(|_| ConfigurationError::InvalidValue {
        field,
        constraint: format!("<= {}", usize::MAX),
    })
}

pub(crate) fn ensure_usize_at_least(
    field: &'static str,
    value: usize,
    min: i64,
) -> Result<usize, ConfigurationError> {
    ensure_at_least(field, widen(value), min)
}

pub(crate) fn ensure_in_range(
    field: &'static str,
    value: i64,
    min: i64,
    max: i64,
) -> Result<u32, ConfigurationError> {
    if !value.validate_range(Some(min), None, None, None) {
        return Err(ConfigurationError::InvalidValue {
            field,
            constraint: format!(">= {min}"),
        });
    }
    if !value.validate_range(None, Some(max), None, None) {
        return Err(ConfigurationError::InvalidValue {
            field,
            constraint: format!("<= {max}"),
        });
    }
    u32::try_from(value).map_err(|_| ConfigurationError::InvalidValue {
        field,
        constraint: format!("<= {max}"),
    })
}

pub(crate) fn ensure_positive_finite(
    field: &'static str,
    value: f64,
) -> Result<f64, ConfigurationError> {
    if !value.is_finite() || !value.validate_range(None, None, Some(0.0), None) {
        return Err(ConfigurationError::InvalidValue {
            field,
            constraint: "finite and > 0".to_string(),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_token_is_locale_independent() {
        // The dotted capital I is the classic Turkish-locale trap.
        assert_eq!(fold_token("  COSINE "), "cosine");
        assert_eq!(fold_token("IP"), "ip");
        assert_ne!(fold_token("İP"), "ip");
    }

    #[test]
    fn at_least_reports_the_bound() {
        assert_eq!(ensure_at_least("hnsw:M", 16, 1).unwrap(), 16);
        assert_eq!(
            ensure_at_least("hnsw:M", 0, 1).unwrap_err().to_string(),
            "hnsw:M must be > 0"
        );
        assert_eq!(
            ensure_at_least("hnsw:batch_size", 1, 2)
                .unwrap_err()
                .to_string(),
            "hnsw:batch_size must be > 1"
        );
        assert_eq!(
            ensure_at_least("hnsw:M", -3, 1).unwrap_err().to_string(),
            "hnsw:M must be > 0"
        );
    }

    #[test]
    fn range_reports_both_bounds() {
        assert_eq!(
            ensure_in_range("spann:search_nprobe", 0, 1, 128)
                .unwrap_err()
                .to_string(),
            "spann:search_nprobe must be >= 1"
        );
        assert_eq!(
            ensure_in_range("spann:search_nprobe", 129, 1, 128)
                .unwrap_err()
                .to_string(),
            "spann:search_nprobe must be <= 128"
        );
        assert_eq!(ensure_in_range("spann:search_nprobe", 128, 1, 128), Ok(128));
    }

    #[test]
    fn positive_finite_rejects_nan_and_infinity() {
        assert!(ensure_positive_finite("hnsw:resize_factor", f64::NAN).is_err());
        assert!(ensure_positive_finite("hnsw:resize_factor", f64::INFINITY).is_err());
        assert!(ensure_positive_finite("hnsw:resize_factor", 0.0).is_err());
        assert_eq!(ensure_positive_finite("hnsw:resize_factor", 1.25), Ok(1.25));
    }
}

//! Error handling.

use aws_sdk_cloudwatchlogs::operation::filter_log_events::FilterLogEventsError;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_smithy_types::byte_stream::error::Error as ByteStreamError;
use linfa_clustering::KMeansError;
use ndarray::ShapeError;
use thiserror::Error;

/// Benchmark harness error type
///
/// This type encapsulates the various errors that may occur. Failures that
/// affect a whole process (dataset unreachable, log store unreachable)
/// propagate to the binary entry points, which print the cause chain and
/// exit non-zero.
#[derive(Debug, Error)]
pub enum BenchmarkError {
    /// Error while retrieving an object from S3
    #[error("error retrieving object from S3 storage")]
    S3GetObject(#[from] Box<SdkError<GetObjectError>>),

    /// Error reading object data from S3
    #[error("error receiving object from S3 storage")]
    S3ByteStream(#[from] ByteStreamError),

    /// Missing Content-Length header in S3 response.
    #[error("S3 response missing Content-Length header")]
    S3ContentLengthMissing,

    /// Error querying the CloudWatch Logs store
    #[error("error calling FilterLogEvents")]
    FilterLogEvents(#[from] Box<SdkError<FilterLogEventsError>>),

    /// Error (de)serialising JSON (dataset manifest, metrics record)
    #[error("failed to decode JSON")]
    Json(#[from] serde_json::Error),

    /// Error converting from bytes to a type
    #[error("failed to convert from bytes to {type_name}")]
    FromBytes { type_name: &'static str },

    /// Error creating an ndarray from a shape
    #[error("failed to create array from shape")]
    ShapeInvalid(#[from] ShapeError),

    /// Error running the clustering step of the large job
    #[error("k-means clustering failed")]
    Clustering(#[from] KMeansError),

    /// Requested variable does not exist in the dataset manifest
    #[error("dataset has no variable named {name}")]
    NoSuchVariable { name: String },

    /// Variable dimensions do not match what the job expects
    #[error("variable {name} has dimensions {actual:?}, expected {expected:?}")]
    DimensionMismatch {
        name: String,
        expected: Vec<String>,
        actual: Vec<String>,
    },

    /// Dataset URL cannot be translated into an object storage location
    #[error("cannot derive an object storage location from URL {url}")]
    InvalidDatasetUrl { url: url::Url },

    /// Error parsing a derived URL
    #[error("failed to parse URL")]
    UrlParse(#[from] url::ParseError),

    /// Attempt to perform an invalid operation on an empty array or selection
    #[error("cannot perform {operation} on empty array or selection")]
    EmptyArray { operation: &'static str },

    /// Error converting between integer types
    #[error(transparent)]
    TryFromInt(#[from] std::num::TryFromIntError),
}

impl From<SdkError<GetObjectError>> for BenchmarkError {
    fn from(error: SdkError<GetObjectError>) -> Self {
        Self::S3GetObject(Box::new(error))
    }
}

impl From<SdkError<FilterLogEventsError>> for BenchmarkError {
    fn from(error: SdkError<FilterLogEventsError>) -> Self {
        Self::FilterLogEvents(Box::new(error))
    }
}

/// Print an error and its cause chain to the error stream.
///
/// Used by the binary entry points before exiting non-zero.
pub fn report_fatal(context: &str, error: &BenchmarkError) {
    eprintln!("{}: {}", context, error);
    let mut current = std::error::Error::source(error);
    while let Some(source) = current {
        eprintln!("Caused by: {}", source);
        current = source.source();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_such_variable_message() {
        let error = BenchmarkError::NoSuchVariable {
            name: "fwi_mean".to_string(),
        };
        assert_eq!("dataset has no variable named fwi_mean", error.to_string());
    }

    #[test]
    fn empty_array_message() {
        let error = BenchmarkError::EmptyArray {
            operation: "feature assembly",
        };
        assert_eq!(
            "cannot perform feature assembly on empty array or selection",
            error.to_string()
        );
    }

    #[test]
    fn json_error_has_source() {
        let json_error = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let error = BenchmarkError::from(json_error);
        assert_eq!("failed to decode JSON", error.to_string());
        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn dimension_mismatch_message() {
        let error = BenchmarkError::DimensionMismatch {
            name: "cams_frpfire".to_string(),
            expected: vec!["time".to_string()],
            actual: vec!["depth".to_string()],
        };
        assert_eq!(
            "variable cams_frpfire has dimensions [\"depth\"], expected [\"time\"]",
            error.to_string()
        );
    }
}

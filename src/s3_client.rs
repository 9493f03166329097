//! A simplified S3 client that supports downloading objects.
//! It attempts to hide the complexities of working with the AWS SDK for S3,
//! and provides the URL translation used to open datasets published behind
//! plain HTTP(S) URLs on S3-compatible stores.

use aws_credential_types::Credentials;
use aws_sdk_s3::config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_types::region::Region;
use bytes::Bytes;
use tracing::Instrument;
use url::{Position, Url};

use crate::error::BenchmarkError;

/// Region used when none is configured. S3-compatible stores generally
/// accept any region as long as the endpoint is explicit.
const DEFAULT_REGION: &str = "us-east-1";

/// Object storage options resolved from the runner configuration.
#[derive(Clone, Debug, Default)]
pub struct StorageOptions {
    /// Access key id; anonymous access when absent
    pub access_key: Option<String>,
    /// Secret access key
    pub secret_key: Option<String>,
    /// Session token for temporary credentials
    pub session_token: Option<String>,
    /// Endpoint override; derived from the dataset URL when absent
    pub endpoint: Option<String>,
    /// Region
    pub region: Option<String>,
}

impl StorageOptions {
    /// Returns the credentials described by these options.
    ///
    /// Credentials require both an access key and a secret key; anything
    /// less is anonymous access.
    pub fn credentials(&self) -> S3Credentials {
        match (&self.access_key, &self.secret_key) {
            (Some(access_key), Some(secret_key)) => S3Credentials::AccessKey {
                access_key: access_key.clone(),
                secret_key: secret_key.clone(),
                session_token: self.session_token.clone(),
            },
            _ => S3Credentials::None,
        }
    }
}

/// Object storage account credentials.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum S3Credentials {
    AccessKey {
        access_key: String,
        secret_key: String,
        session_token: Option<String>,
    },
    None,
}

/// Translate a dataset URL into an object storage URL and endpoint pair.
///
/// URLs already in object storage form (`s3://bucket/key`) pass through
/// verbatim, paired with the endpoint override if one was configured.
/// Otherwise the URL's first path segment is taken as the bucket and the
/// remainder as the key, and the endpoint is the override or the URL's
/// `scheme://host[:port]`.
///
/// # Arguments
///
/// * `url`: Dataset URL
/// * `endpoint_override`: Explicitly configured endpoint, if any
pub fn to_s3_location(
    url: &Url,
    endpoint_override: Option<&str>,
) -> Result<(Url, Option<String>), BenchmarkError> {
    if url.scheme() == "s3" {
        return Ok((url.clone(), endpoint_override.map(str::to_string)));
    }
    if url.host_str().is_none() {
        return Err(BenchmarkError::InvalidDatasetUrl { url: url.clone() });
    }
    let path = url.path().trim_start_matches('/');
    let (bucket, key) = match path.split_once('/') {
        Some((bucket, key)) => (bucket, key),
        None => (path, ""),
    };
    if bucket.is_empty() {
        return Err(BenchmarkError::InvalidDatasetUrl { url: url.clone() });
    }
    let s3_url = if key.is_empty() {
        format!("s3://{}", bucket)
    } else {
        format!("s3://{}/{}", bucket, key)
    };
    let endpoint = endpoint_override
        .map(str::to_string)
        .unwrap_or_else(|| url[..Position::BeforePath].to_string());
    Ok((Url::parse(&s3_url)?, Some(endpoint)))
}

/// S3 client object.
#[derive(Clone)]
pub struct S3Client {
    /// Underlying AWS SDK S3 client object.
    client: Client,
}

impl S3Client {
    /// Creates an S3Client object
    ///
    /// # Arguments
    ///
    /// * `endpoint`: Object storage API endpoint; the SDK default when absent
    /// * `region`: Object storage region; a fixed default when absent
    /// * `credentials`: Object storage account credentials
    pub async fn new(
        endpoint: Option<&str>,
        region: Option<&str>,
        credentials: S3Credentials,
    ) -> Self {
        let region = Region::new(region.unwrap_or(DEFAULT_REGION).to_string());
        let mut builder = aws_sdk_s3::Config::builder().behavior_version(BehaviorVersion::latest());
        if let S3Credentials::AccessKey {
            access_key,
            secret_key,
            session_token,
        } = credentials
        {
            let credentials = Credentials::from_keys(access_key, secret_key, session_token);
            builder = builder.credentials_provider(credentials);
        }
        if let Some(endpoint) = endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        let s3_config = builder
            .region(Some(region))
            .force_path_style(true)
            .build();
        let client = Client::from_conf(s3_config);
        Self { client }
    }

    /// Downloads an object from object storage and returns the data as Bytes
    ///
    /// # Arguments
    ///
    /// * `bucket`: Name of the bucket
    /// * `key`: Name of the object in the bucket
    /// * `range`: Optional byte range
    pub async fn download_object(
        &self,
        bucket: &str,
        key: &str,
        range: Option<String>,
    ) -> Result<Bytes, BenchmarkError> {
        let mut response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .set_range(range)
            .send()
            .instrument(tracing::Span::current())
            .await?;
        // Fail if the content length header is missing.
        let content_length: usize = response
            .content_length()
            .ok_or(BenchmarkError::S3ContentLengthMissing)?
            .try_into()?;

        // The data returned by the S3 client does not have any alignment
        // guarantees. In order to reinterpret the data as an array of numbers
        // with a higher alignment than 1, we need to return the data in a
        // Bytes object in which the underlying data has a higher alignment.
        // An alignment of 8 bytes covers every element type the datasets use.
        let mut buf = maligned::align_first::<u8, maligned::A8>(content_length);

        // Iterate over the streaming response, copying data into the aligned
        // Vec<u8>.
        while let Some(bytes) = response
            .body
            .try_next()
            .instrument(tracing::Span::current())
            .await?
        {
            buf.extend_from_slice(&bytes)
        }
        // Return as Bytes.
        Ok(buf.into())
    }
}

/// Return an optional byte range string based on the offset and size.
///
/// The returned string is compatible with the HTTP Range header.
///
/// # Arguments
///
/// * `offset`: Optional offset of data in bytes
/// * `size`: Optional size of data in bytes
pub fn get_range(offset: Option<usize>, size: Option<usize>) -> Option<String> {
    match (offset, size) {
        (offset, Some(size)) => {
            // Default offset to 0.
            let offset = offset.unwrap_or(0);
            // Range-end is inclusive.
            let end = offset + size - 1;
            Some(format!("bytes={}-{}", offset, end))
        }
        (Some(offset), None) => Some(format!("bytes={}-", offset)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_access_key() -> S3Credentials {
        S3Credentials::AccessKey {
            access_key: "user".to_string(),
            secret_key: "password".to_string(),
            session_token: None,
        }
    }

    #[tokio::test]
    async fn new() {
        S3Client::new(Some("http://example.com"), None, make_access_key()).await;
    }

    #[tokio::test]
    async fn new_no_auth() {
        S3Client::new(Some("http://example.com"), Some("eu-west-2"), S3Credentials::None).await;
    }

    #[test]
    fn to_s3_location_passthrough() {
        let url = Url::parse("s3://bucket/path/data.zarr").unwrap();
        let (s3_url, endpoint) = to_s3_location(&url, None).unwrap();
        assert_eq!(url, s3_url);
        assert_eq!(None, endpoint);
    }

    #[test]
    fn to_s3_location_passthrough_with_override() {
        let url = Url::parse("s3://bucket/data.zarr").unwrap();
        let (s3_url, endpoint) = to_s3_location(&url, Some("https://s3.example.com")).unwrap();
        assert_eq!(url, s3_url);
        assert_eq!(Some("https://s3.example.com".to_string()), endpoint);
    }

    #[test]
    fn to_s3_location_https_with_key() {
        let url = Url::parse("https://s3.example.com/bucket/path/data.zarr").unwrap();
        let (s3_url, endpoint) = to_s3_location(&url, None).unwrap();
        assert_eq!("s3://bucket/path/data.zarr", s3_url.as_str());
        assert_eq!(Some("https://s3.example.com".to_string()), endpoint);
    }

    #[test]
    fn to_s3_location_bucket_only() {
        let url = Url::parse("https://s3.example.com/bucket").unwrap();
        let (s3_url, endpoint) = to_s3_location(&url, None).unwrap();
        assert_eq!("s3://bucket", s3_url.as_str());
        assert_eq!(Some("https://s3.example.com".to_string()), endpoint);
    }

    #[test]
    fn to_s3_location_preserves_port() {
        let url = Url::parse("http://localhost:9000/bucket/data").unwrap();
        let (_, endpoint) = to_s3_location(&url, None).unwrap();
        assert_eq!(Some("http://localhost:9000".to_string()), endpoint);
    }

    #[test]
    fn to_s3_location_override_wins() {
        let url = Url::parse("https://s3.example.com/bucket/data").unwrap();
        let (_, endpoint) = to_s3_location(&url, Some("https://other.example.com")).unwrap();
        assert_eq!(Some("https://other.example.com".to_string()), endpoint);
    }

    #[test]
    fn to_s3_location_no_bucket() {
        let url = Url::parse("https://s3.example.com/").unwrap();
        let result = to_s3_location(&url, None);
        assert!(matches!(
            result,
            Err(BenchmarkError::InvalidDatasetUrl { .. })
        ));
    }

    #[test]
    fn get_range_none() {
        assert_eq!(None, get_range(None, None));
    }

    #[test]
    fn get_range_both() {
        assert_eq!(Some("bytes=1-2".to_string()), get_range(Some(1), Some(2)));
    }

    #[test]
    fn get_range_offset() {
        assert_eq!(Some("bytes=1-".to_string()), get_range(Some(1), None));
    }

    #[test]
    fn get_range_size() {
        assert_eq!(Some("bytes=0-1".to_string()), get_range(None, Some(2)));
    }
}

//! Remote dataset access.
//!
//! A dataset is a collection of named multi-dimensional array variables
//! stored as raw little-endian objects in an S3-compatible store, described
//! by a JSON manifest stored alongside them. Opening a dataset fetches only
//! the manifest; variable data is read lazily, and reads of a trailing
//! window along the leading axis translate to HTTP ranged GETs so that only
//! the selected time steps are transferred.

use std::collections::HashMap;

use bytes::Bytes;
use ndarray::{ArrayD, IxDyn};
use serde::Deserialize;
use url::Url;

use crate::error::BenchmarkError;
use crate::s3_client::{get_range, to_s3_location, S3Client, StorageOptions};

/// Name of the manifest object stored under the dataset prefix.
pub const MANIFEST_OBJECT: &str = "manifest.json";

/// Supported numerical data types
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    /// [f32]
    Float32,
    /// [f64]
    Float64,
}

impl DType {
    /// Returns the size of the associated type in bytes.
    pub fn size_of(self) -> usize {
        match self {
            Self::Float32 => std::mem::size_of::<f32>(),
            Self::Float64 => std::mem::size_of::<f64>(),
        }
    }
}

/// Description of one dataset variable.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct VariableMeta {
    /// Shape of the multi-dimensional array, leading axis first
    pub shape: Vec<usize>,
    /// Element data type
    pub dtype: DType,
    /// Dimension names corresponding to the shape; may be empty when the
    /// publisher did not label the axes
    #[serde(default)]
    pub dims: Vec<String>,
}

/// Dataset manifest, mapping variable names to their descriptions.
#[derive(Debug, Deserialize)]
pub struct DatasetManifest {
    pub variables: HashMap<String, VariableMeta>,
}

/// A remotely hosted dataset.
pub struct Dataset {
    client: S3Client,
    bucket: String,
    prefix: String,
    manifest: DatasetManifest,
}

impl Dataset {
    /// Open a dataset, fetching and decoding its manifest.
    ///
    /// The URL is translated into an object storage location whether or not
    /// credentials were supplied, since the S3 client always needs a bucket
    /// and endpoint; absent credentials mean anonymous access.
    ///
    /// # Arguments
    ///
    /// * `url`: Dataset URL, either `s3://bucket/prefix` or an HTTP(S) URL
    ///   whose first path segment is the bucket
    /// * `options`: Object storage options from the runner configuration
    pub async fn open(url: &Url, options: &StorageOptions) -> Result<Self, BenchmarkError> {
        let (s3_url, endpoint) = to_s3_location(url, options.endpoint.as_deref())?;
        let bucket = s3_url
            .host_str()
            .ok_or_else(|| BenchmarkError::InvalidDatasetUrl { url: s3_url.clone() })?
            .to_string();
        let prefix = s3_url.path().trim_matches('/').to_string();
        let client = S3Client::new(
            endpoint.as_deref(),
            options.region.as_deref(),
            options.credentials(),
        )
        .await;
        let manifest_key = object_key(&prefix, MANIFEST_OBJECT);
        let bytes = client.download_object(&bucket, &manifest_key, None).await?;
        let manifest: DatasetManifest = serde_json::from_slice(&bytes)?;
        tracing::info!(
            "opened dataset {} ({} variables)",
            url,
            manifest.variables.len()
        );
        Ok(Dataset {
            client,
            bucket,
            prefix,
            manifest,
        })
    }

    /// Return a lazy handle for a named variable.
    pub fn variable(&self, name: &str) -> Result<Variable<'_>, BenchmarkError> {
        let meta = self
            .manifest
            .variables
            .get(name)
            .ok_or_else(|| BenchmarkError::NoSuchVariable {
                name: name.to_string(),
            })?
            .clone();
        Ok(Variable {
            dataset: self,
            key: object_key(&self.prefix, name),
            name: name.to_string(),
            meta,
        })
    }
}

/// A lazy handle for one dataset variable. No data is transferred until one
/// of the read methods is called.
pub struct Variable<'a> {
    dataset: &'a Dataset,
    key: String,
    name: String,
    meta: VariableMeta,
}

impl Variable<'_> {
    /// The variable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The variable description from the manifest.
    pub fn meta(&self) -> &VariableMeta {
        &self.meta
    }

    /// Read the full variable into an array.
    pub async fn read(&self) -> Result<ArrayD<f64>, BenchmarkError> {
        let bytes = self
            .dataset
            .client
            .download_object(&self.dataset.bucket, &self.key, None)
            .await?;
        decode_array(&bytes, self.meta.dtype, &self.meta.shape)
    }

    /// Read the last `steps` entries along the leading axis, clamped to the
    /// axis length. Only the selected window is transferred.
    pub async fn read_last(&self, steps: usize) -> Result<ArrayD<f64>, BenchmarkError> {
        let (offset, size, rows) = tail_range(&self.meta.shape, self.meta.dtype.size_of(), steps);
        let bytes = self
            .dataset
            .client
            .download_object(
                &self.dataset.bucket,
                &self.key,
                get_range(Some(offset), Some(size)),
            )
            .await?;
        let mut shape = self.meta.shape.clone();
        if let Some(leading) = shape.first_mut() {
            *leading = rows;
        }
        decode_array(&bytes, self.meta.dtype, &shape)
    }
}

/// Join a dataset prefix and an object name into an object key.
fn object_key(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}

/// Return the byte `(offset, size, rows)` of the trailing `steps` entries of
/// the leading axis of a row-major array.
///
/// `rows` is `steps` clamped to the leading axis length. A scalar (empty
/// shape) is treated as a single row.
pub fn tail_range(shape: &[usize], elem_size: usize, steps: usize) -> (usize, usize, usize) {
    let leading = shape.first().copied().unwrap_or(1);
    let row_elems: usize = shape.iter().skip(1).product();
    let rows = steps.min(leading);
    let row_bytes = row_elems * elem_size;
    ((leading - rows) * row_bytes, rows * row_bytes, rows)
}

/// Convert from Bytes to `&[T]`.
///
/// Zerocopy provides a mechanism for converting between types. Correct
/// alignment of the data is necessary; the S3 client downloads into 8-byte
/// aligned buffers.
fn from_bytes<T: zerocopy::FromBytes>(data: &Bytes) -> Result<&[T], BenchmarkError> {
    let layout = zerocopy::LayoutVerified::<_, [T]>::new_slice(&data[..]).ok_or(
        BenchmarkError::FromBytes {
            type_name: std::any::type_name::<T>(),
        },
    )?;
    Ok(layout.into_slice())
}

/// Decode raw little-endian object bytes into an f64 array of the given
/// shape. Float32 sources are widened so that the numeric pipelines operate
/// on a single element type.
fn decode_array(bytes: &Bytes, dtype: DType, shape: &[usize]) -> Result<ArrayD<f64>, BenchmarkError> {
    let values: Vec<f64> = match dtype {
        DType::Float32 => from_bytes::<f32>(bytes)?
            .iter()
            .map(|value| f64::from(*value))
            .collect(),
        DType::Float64 => from_bytes::<f64>(bytes)?.to_vec(),
    };
    Ok(ArrayD::from_shape_vec(IxDyn(shape), values)?)
}

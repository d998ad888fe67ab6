//! Generalized file descriptor, allowing a recording to be described as a
//! plain local path, a multi-chunk set, or a full URI with extra
//! parameters — without every call site needing to know which.

use indexmap::IndexMap;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use serde::{Deserialize, Serialize};
use std::fmt;

const FRAGMENT: &AsciiSet = &CONTROLS.add(b' ').add(b'"').add(b'#').add(b'%').add(b'&');

#[derive(Debug, thiserror::Error)]
pub enum FileSpecError {
    #[error("invalid uri: missing scheme in '{0}'")]
    MissingScheme(String),
    #[error("invalid uri query parameter '{0}'")]
    BadQueryParam(String),
    #[error("invalid json file spec: {0}")]
    Json(#[from] serde_json::Error),
}

/// A file object that may be a single path, a set of chunks, or a URI with
/// extra parameters understood by a particular storage backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSpec {
    pub file_handler_name: String,
    pub file_name: String,
    pub uri: String,
    pub chunks: Vec<String>,
    pub chunk_sizes: Vec<i64>,
    pub extras: IndexMap<String, String>,
}

#[derive(Serialize, Deserialize)]
struct FileSpecJson {
    #[serde(default)]
    storage: String,
    #[serde(default)]
    chunks: Vec<String>,
    #[serde(default)]
    filename: String,
    #[serde(default)]
    extras: IndexMap<String, String>,
}

impl FileSpec {
    pub fn new(file_handler_name: impl Into<String>, chunks: Vec<String>) -> Self {
        FileSpec {
            file_handler_name: file_handler_name.into(),
            chunks,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.file_handler_name.is_empty()
            && self.file_name.is_empty()
            && self.uri.is_empty()
            && self.chunks.is_empty()
    }

    /// A local-disk file has no handler name (or the default `"diskfile"`)
    /// and no URI.
    pub fn is_disk_file(&self) -> bool {
        self.uri.is_empty()
            && (self.file_handler_name.is_empty() || self.file_handler_name == "diskfile")
    }

    /// Splits a URI into scheme, path and query params, e.g.
    /// `s3://bucket/key?region=us-east-1` -> ("s3", "bucket/key", {"region": "us-east-1"}).
    pub fn parse_uri(uri: &str) -> Result<(String, String, IndexMap<String, String>), FileSpecError> {
        let (scheme, rest) = uri
            .split_once("://")
            .ok_or_else(|| FileSpecError::MissingScheme(uri.to_string()))?;
        let (path, query) = match rest.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (rest, None),
        };
        let mut params = IndexMap::new();
        if let Some(query) = query {
            for pair in query.split('&') {
                if pair.is_empty() {
                    continue;
                }
                let (k, v) = Self::decode_query_pair(pair)?;
                params.insert(k, v);
            }
        }
        Ok((scheme.to_string(), Self::urldecode(path), params))
    }

    fn decode_query_pair(pair: &str) -> Result<(String, String), FileSpecError> {
        let (k, v) = pair
            .split_once('=')
            .ok_or_else(|| FileSpecError::BadQueryParam(pair.to_string()))?;
        Ok((Self::urldecode(k), Self::urldecode(v)))
    }

    pub fn urldecode(input: &str) -> String {
        percent_decode_str(input).decode_utf8_lossy().into_owned()
    }

    fn urlencode(input: &str) -> String {
        utf8_percent_encode(input, FRAGMENT).to_string()
    }

    /// Smart setter: determines whether `path_json_uri` is a plain path, a
    /// JSON spec, or a URI, and fills `self` accordingly.
    pub fn from_path_json_uri(
        &mut self,
        path_json_uri: &str,
        default_file_handler_name: &str,
    ) -> Result<(), FileSpecError> {
        self.clear();
        let trimmed = path_json_uri.trim();
        if trimmed.starts_with('{') {
            return self.from_json(trimmed);
        }
        if trimmed.contains("://") {
            let (scheme, path, params) = Self::parse_uri(trimmed)?;
            self.uri = trimmed.to_string();
            self.file_handler_name = scheme;
            self.chunks = vec![path];
            self.extras = params;
            return Ok(());
        }
        self.file_handler_name = if default_file_handler_name.is_empty() {
            "diskfile".to_string()
        } else {
            default_file_handler_name.to_string()
        };
        self.chunks = vec![trimmed.to_string()];
        Ok(())
    }

    pub fn to_path_json_uri(&self) -> String {
        if !self.uri.is_empty() {
            return self.uri.clone();
        }
        if self.is_disk_file() && self.chunks.len() == 1 && self.extras.is_empty() {
            return self.chunks[0].clone();
        }
        self.to_json()
    }

    pub fn from_json(json_str: &str) -> Result<Self, FileSpecError> {
        let parsed: FileSpecJson = serde_json::from_str(json_str)?;
        Ok(FileSpec {
            file_handler_name: parsed.storage,
            file_name: parsed.filename,
            uri: String::new(),
            chunks: parsed.chunks,
            chunk_sizes: Vec::new(),
            extras: parsed.extras,
        })
    }

    pub fn to_json(&self) -> String {
        let json = FileSpecJson {
            storage: self.file_handler_name.clone(),
            chunks: self.chunks.clone(),
            filename: self.file_name.clone(),
            extras: self.extras.clone(),
        };
        serde_json::to_string(&json).expect("FileSpecJson always serializes")
    }

    pub fn has_chunk_sizes(&self) -> bool {
        !self.chunk_sizes.is_empty() && self.chunk_sizes.len() == self.chunks.len()
    }

    pub fn file_size(&self) -> Option<i64> {
        if self.has_chunk_sizes() {
            Some(self.chunk_sizes.iter().sum())
        } else {
            None
        }
    }

    pub fn source_location(&self) -> String {
        if !self.uri.is_empty() {
            self.uri.clone()
        } else {
            self.file_handler_name.clone()
        }
    }

    pub fn file_name(&self) -> String {
        if !self.file_name.is_empty() {
            return self.file_name.clone();
        }
        self.chunks
            .first()
            .and_then(|c| c.rsplit('/').next())
            .unwrap_or_default()
            .to_string()
    }

    pub fn get_extra(&self, name: &str) -> Option<&str> {
        self.extras.get(name).map(String::as_str)
    }

    pub fn has_extra(&self, name: &str) -> bool {
        self.extras.contains_key(name)
    }

    pub fn get_extra_as_bool(&self, name: &str, default: bool) -> bool {
        match self.get_extra(name) {
            Some("1") | Some("true") => true,
            Some(_) => false,
            None => default,
        }
    }

    pub fn get_extra_as_int64(&self, name: &str, default: i64) -> i64 {
        self.get_extra(name)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    pub fn get_extra_as_double(&self, name: &str, default: f64) -> f64 {
        self.get_extra(name)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    pub fn set_extra(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.extras.insert(name.into(), value.into());
    }

    pub fn unset_extra(&mut self, name: &str) {
        self.extras.shift_remove(name);
    }

    pub fn clear(&mut self) {
        *self = FileSpec::default();
    }

    /// Reconstitutes a URI from scheme/path/params, the reverse of
    /// [`Self::parse_uri`]. Useful for tooling that edits extras and needs
    /// to rewrite `self.uri`.
    pub fn build_uri(scheme: &str, path: &str, params: &IndexMap<String, String>) -> String {
        let mut uri = format!("{scheme}://{}", Self::urlencode(path));
        if !params.is_empty() {
            uri.push('?');
            let pairs: Vec<String> = params
                .iter()
                .map(|(k, v)| format!("{}={}", Self::urlencode(k), Self::urlencode(v)))
                .collect();
            uri.push_str(&pairs.join("&"));
        }
        uri
    }
}

impl fmt::Display for FileSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_path_json_uri())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_path_round_trips() {
        let mut spec = FileSpec::default();
        spec.from_path_json_uri("/data/recording.vrs", "").unwrap();
        assert!(spec.is_disk_file());
        assert_eq!(spec.to_path_json_uri(), "/data/recording.vrs");
    }

    #[test]
    fn uri_parses_scheme_path_and_query() {
        let mut spec = FileSpec::default();
        spec.from_path_json_uri("s3://bucket/key.vrs?region=us-east-1", "")
            .unwrap();
        assert_eq!(spec.file_handler_name, "s3");
        assert!(!spec.is_disk_file());
        assert_eq!(spec.get_extra("region"), Some("us-east-1"));
    }

    #[test]
    fn json_spec_round_trips_chunks_and_extras() {
        let mut spec = FileSpec::default();
        spec.file_handler_name = "chunked".to_string();
        spec.chunks = vec!["a.vrs_0".to_string(), "a.vrs_1".to_string()];
        spec.set_extra("checksum", "deadbeef");
        let json = spec.to_json();
        let back = FileSpec::from_json(&json).unwrap();
        assert_eq!(back.chunks, spec.chunks);
        assert_eq!(back.get_extra("checksum"), Some("deadbeef"));
    }

    #[test]
    fn extras_parse_as_typed_values() {
        let mut spec = FileSpec::default();
        spec.set_extra("retry", "3");
        spec.set_extra("strict", "true");
        assert_eq!(spec.get_extra_as_int64("retry", 0), 3);
        assert!(spec.get_extra_as_bool("strict", false));
        assert!(!spec.get_extra_as_bool("missing", false));
    }

    #[test]
    fn percent_encoded_query_values_decode() {
        let (_, _, params) = FileSpec::parse_uri("http://host/p?name=a%20b").unwrap();
        assert_eq!(params.get("name").map(String::as_str), Some("a b"));
    }
}

//! `Decoder` trait: the dispatch seam for content-block payloads this
//! crate doesn't decode itself (video codecs, custom application codecs).
//! Built-in content (raw images, PCM audio) never goes through this trait;
//! it's only for the `ImageVideo`/`ImageCustomCodec` block kinds.

use crate::error::RecordFormatError;

/// An external decoder registered by name in the process-wide
/// [`crate::registry::DecoderFactory`].
pub trait Decoder: Send + Sync {
    fn name(&self) -> &str;
    fn decode(&self, data: &[u8]) -> Result<Vec<u8>, RecordFormatError>;
}

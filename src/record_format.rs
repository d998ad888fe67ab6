//! `RecordFormat`: the ordered sequence of content-block specs describing
//! how to slice a record's payload back into its typed pieces.
//!
//! A stream may emit multiple `RecordFormat` versions over its life
//! (`format_version` on [`crate::model::Record`]); each version is stored
//! as a `RF:<record_type>_<version>` tag, serialized as a `"+"`-joined
//! string of block-type tokens.

use crate::error::RecordFormatError;
use std::fmt;

/// One block within a record's content, in write order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentBlock {
    /// A `DataLayout` block; `size` is `None` when the block's size must be
    /// inferred from what's left in the record (rule 3), and `Some(n)`
    /// when it's explicitly declared (rule 1).
    DataLayout { size: Option<usize> },
    ImageRaw,
    ImageJpeg,
    ImageVideo { codec: String },
    ImageCustomCodec { codec: String },
    AudioPcm,
    Custom { size: usize },
}

impl ContentBlock {
    /// Resolves this block's on-wire size given `remaining`, the bytes left
    /// in the record after preceding blocks were consumed, applying the
    /// priority rules: (1) an explicit size carried by the block spec
    /// itself, (2) `size_hint`, normally the value of a preceding
    /// `DataLayout`'s `next_content_block_size` field, read by the caller
    /// before calling `split`, (3) "whatever remains", valid only for the
    /// last block in the format.
    pub fn resolve_size(&self, remaining: usize, is_last: bool, size_hint: Option<usize>) -> Result<usize, RecordFormatError> {
        match self {
            ContentBlock::DataLayout { size: Some(n) } => Ok(*n),
            ContentBlock::Custom { size } => Ok(*size),
            _ => match size_hint {
                Some(n) => Ok(n),
                None if is_last => Ok(remaining),
                None => Err(RecordFormatError::ContentBlockTooShort {
                    index: 0,
                    expected: 0,
                    remaining,
                }),
            },
        }
    }

    fn token(&self) -> String {
        match self {
            ContentBlock::DataLayout { size: Some(n) } => format!("data_layout/size={n}"),
            ContentBlock::DataLayout { size: None } => "data_layout".to_string(),
            ContentBlock::ImageRaw => "image/raw".to_string(),
            ContentBlock::ImageJpeg => "image/jpg".to_string(),
            ContentBlock::ImageVideo { codec } => format!("image/video/codec={codec}"),
            ContentBlock::ImageCustomCodec { codec } => format!("image/custom_codec/codec={codec}"),
            ContentBlock::AudioPcm => "audio/pcm".to_string(),
            ContentBlock::Custom { size } => format!("custom/size={size}"),
        }
    }

    fn parse_token(token: &str) -> Result<ContentBlock, RecordFormatError> {
        let bad = || RecordFormatError::NotFound {
            stream: String::new(),
            record_type: String::new(),
            version: 0,
        };
        if token == "data_layout" {
            return Ok(ContentBlock::DataLayout { size: None });
        }
        if let Some(n) = token.strip_prefix("data_layout/size=") {
            return Ok(ContentBlock::DataLayout {
                size: Some(n.parse().map_err(|_| bad())?),
            });
        }
        if token == "image/raw" {
            return Ok(ContentBlock::ImageRaw);
        }
        if token == "image/jpg" {
            return Ok(ContentBlock::ImageJpeg);
        }
        if let Some(codec) = token.strip_prefix("image/video/codec=") {
            return Ok(ContentBlock::ImageVideo { codec: codec.to_string() });
        }
        if let Some(codec) = token.strip_prefix("image/custom_codec/codec=") {
            return Ok(ContentBlock::ImageCustomCodec { codec: codec.to_string() });
        }
        if token == "audio/pcm" {
            return Ok(ContentBlock::AudioPcm);
        }
        if let Some(n) = token.strip_prefix("custom/size=") {
            return Ok(ContentBlock::Custom {
                size: n.parse().map_err(|_| bad())?,
            });
        }
        Err(bad())
    }
}

/// Ordered sequence of [`ContentBlock`]s for one `(record_type, format_version)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFormat {
    pub record_type: String,
    pub format_version: u32,
    pub blocks: Vec<ContentBlock>,
}

impl RecordFormat {
    pub fn new(record_type: impl Into<String>, format_version: u32, blocks: Vec<ContentBlock>) -> Self {
        RecordFormat {
            record_type: record_type.into(),
            format_version,
            blocks,
        }
    }

    /// Serializes to the `RF:<record_type>_<version> = "<block>+<block>+..."`
    /// tag value (the key half is produced by `tags::TagConventions`).
    pub fn to_tag_value(&self) -> String {
        self.blocks.iter().map(ContentBlock::token).collect::<Vec<_>>().join("+")
    }

    pub fn from_tag_value(
        record_type: impl Into<String>,
        format_version: u32,
        tag_value: &str,
    ) -> Result<Self, RecordFormatError> {
        let blocks = tag_value
            .split('+')
            .map(ContentBlock::parse_token)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RecordFormat::new(record_type, format_version, blocks))
    }

    /// Splits `payload` into one byte slice per block, resolving sizes left
    /// to right per [`ContentBlock::resolve_size`]. `size_hints[i]`, when
    /// present, is the size to use for block `i` under rule 2 — the caller
    /// is expected to have already unpacked a preceding `DataLayout` block
    /// and read its `next_content_block_size` field, since `split` itself
    /// has no schema to do that unpacking with. Blocks with no hint (most
    /// of them, in practice) pass `None`, or the slice may simply be
    /// shorter than `self.blocks`.
    pub fn split<'a>(&self, payload: &'a [u8], size_hints: &[Option<usize>]) -> Result<Vec<&'a [u8]>, RecordFormatError> {
        let mut out = Vec::with_capacity(self.blocks.len());
        let mut offset = 0usize;
        for (i, block) in self.blocks.iter().enumerate() {
            let remaining = payload.len() - offset;
            let is_last = i + 1 == self.blocks.len();
            let hint = size_hints.get(i).copied().flatten();
            let size = block.resolve_size(remaining, is_last, hint).map_err(|_| {
                RecordFormatError::ContentBlockTooShort {
                    index: i,
                    expected: 0,
                    remaining,
                }
            })?;
            if size > remaining {
                return Err(RecordFormatError::ContentBlockTooShort {
                    index: i,
                    expected: size,
                    remaining,
                });
            }
            out.push(&payload[offset..offset + size]);
            offset += size;
        }
        Ok(out)
    }
}

impl fmt::Display for RecordFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{} = \"{}\"", self.record_type, self.format_version, self.to_tag_value())
    }
}

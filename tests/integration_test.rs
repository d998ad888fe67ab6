use std::cell::Cell;
use std::sync::Arc;
use tempfile::tempdir;
use vrs::content_block::codec::Decoder;
use vrs::error::RecordFormatError;
use vrs::file_reader::RecordFileReader;
use vrs::file_writer::{RecordFileWriter, WriteOptions};
use vrs::filter::decimate::{DecimateAction, Decimator, DefaultDecimator};
use vrs::filter::{filter_copy, Copier, FilteredFileReader, StreamSelector, ThrottledWriter, TimeRange};
use vrs::model::{Record, RecordType, RecordableTypeId, StreamId};
use vrs::multi_file_reader::MultiRecordFileReader;
use vrs::registry::decoder_factory;
use vrs::{ContentBlock, RecordFormat, RecordHeaderInfo, StreamPlayer, VideoAwareStreamPlayer};

fn sid(type_id: u16, instance: u16) -> StreamId {
    StreamId::new(RecordableTypeId(type_id), instance)
}

fn write_fixture(path: &std::path::Path, streams: &[StreamId], records_per_stream: usize) {
    let mut writer = RecordFileWriter::create(path, WriteOptions::default()).unwrap();
    writer.set_tag("session_id", "fixture");
    for &stream in streams {
        let mut batch = Vec::with_capacity(records_per_stream + 1);
        batch.push(Record::new(stream, 0.0, RecordType::Configuration, 1, vec![0xC0]));
        for i in 0..records_per_stream {
            batch.push(Record::new(stream, (i + 1) as f64, RecordType::Data, 1, vec![i as u8; 16]));
        }
        writer.write_records_async(batch).unwrap();
    }
    writer.finalize().unwrap();
}

#[test]
fn round_trip_preserves_every_record_and_payload() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("round_trip.vrs");
    let streams = [sid(214, 0), sid(1201, 0), sid(1202, 0)];
    write_fixture(&path, &streams, 100);

    let mut reader = RecordFileReader::open_file(&path, false).unwrap();
    assert_eq!(reader.record_count(), streams.len() * 101);
    assert_eq!(reader.streams().len(), streams.len());
    assert_eq!(reader.tags().get("session_id"), Some("fixture"));

    for pos in 0..reader.record_count() {
        let record = reader.read_record(pos).unwrap();
        if record.record_type == RecordType::Data {
            assert_eq!(record.payload.len(), 16);
        }
    }
}

#[test]
fn index_positions_are_consistent_with_stream_membership() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("index.vrs");
    let streams = [sid(214, 0), sid(214, 1)];
    write_fixture(&path, &streams, 20);

    let reader = RecordFileReader::open_file(&path, false).unwrap();
    for &stream in &streams {
        let positions = reader.stream_positions(stream);
        assert_eq!(positions.len(), 21);
        for &pos in positions {
            assert_eq!(reader.entry_stream_id(pos), Some(stream));
        }
    }
}

#[test]
fn timestamps_are_non_decreasing_within_each_stream() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("monotone.vrs");
    let streams = [sid(214, 0), sid(1201, 0)];
    write_fixture(&path, &streams, 200);

    let reader = RecordFileReader::open_file(&path, false).unwrap();
    for &stream in &streams {
        let positions = reader.stream_positions(stream);
        let timestamps: Vec<f64> = positions.iter().map(|&p| reader.entry_timestamp(p).unwrap()).collect();
        assert!(timestamps.windows(2).all(|w| w[0] <= w[1]));
    }
}

#[test]
fn filtered_copy_keeps_only_records_in_range_and_selector() {
    let dir = tempdir().unwrap();
    let src_path = dir.path().join("src.vrs");
    write_fixture(&src_path, &[sid(214, 0), sid(1201, 0)], 50);

    let reader = RecordFileReader::open_file(&src_path, false).unwrap();
    let selector = StreamSelector::parse_tokens(&["+214"]).unwrap();
    let filtered = FilteredFileReader::new(reader)
        .with_time_range(TimeRange::new(Some(10.0), Some(20.0)))
        .with_selector(selector);
    let positions = filtered.filtered_positions();
    assert!(!positions.is_empty());

    let dst_path = dir.path().join("dst.vrs");
    let dst_writer = RecordFileWriter::create(&dst_path, WriteOptions::default()).unwrap();
    let mut throttled = ThrottledWriter::new(dst_writer);
    let mut filtered = filtered;
    let copied = filter_copy(filtered.reader(), &positions, &mut throttled, Copier).unwrap();
    throttled.finalize().unwrap();
    assert_eq!(copied, positions.len());

    let dst_reader = RecordFileReader::open_file(&dst_path, false).unwrap();
    assert_eq!(dst_reader.record_count(), copied);
    for pos in 0..dst_reader.record_count() {
        assert_eq!(dst_reader.entry_stream_id(pos), Some(sid(214, 0)));
        let timestamp = dst_reader.entry_timestamp(pos).unwrap();
        assert!((10.0..=20.0).contains(&timestamp));
    }
}

#[test]
fn merge_fuses_two_files_into_one_non_decreasing_timeline() {
    let dir = tempdir().unwrap();
    let p0 = dir.path().join("a.vrs");
    let p1 = dir.path().join("b.vrs");
    write_fixture(&p0, &[sid(214, 0)], 30);
    write_fixture(&p1, &[sid(214, 0)], 30);

    let mut multi = MultiRecordFileReader::open_files(&[&p0, &p1], false).unwrap();
    assert_eq!(multi.record_count(), 62);
    assert_eq!(multi.streams().len(), 2); // colliding StreamId(214,0) remapped in the second file

    let mut last = f64::MIN;
    for pos in 0..multi.record_count() {
        let record = multi.read_record(pos).unwrap();
        assert!(record.timestamp >= last);
        last = record.timestamp;
    }
}

#[test]
fn auto_reconstructed_index_matches_the_original_after_a_truncated_trailer() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("truncated.vrs");
    write_fixture(&path, &[sid(214, 0), sid(1201, 0)], 40);
    let expected_count = RecordFileReader::open_file(&path, false).unwrap().record_count();

    {
        use std::io::{Seek, SeekFrom, Write};
        let mut f = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
        f.seek(SeekFrom::Start(20)).unwrap();
        f.write_all(&[0u8; 16]).unwrap();
    }

    let reconstructed = RecordFileReader::open_file(&path, true).unwrap();
    assert_eq!(reconstructed.record_count(), expected_count);
}

#[test]
fn interval_decimation_is_deterministic_across_runs() {
    let stream = sid(214, 0);
    let timestamps = [0.0, 0.2, 0.4, 0.6, 0.8, 1.0, 1.3, 1.9];
    let run = || {
        let mut intervals = std::collections::HashMap::new();
        intervals.insert(stream, 0.5);
        let mut decimator = DefaultDecimator::new(intervals, 0.0, 0.0);
        timestamps
            .iter()
            .map(|&t| decimator.decimate(stream, t, RecordType::Data))
            .collect::<Vec<_>>()
    };
    assert_eq!(run(), run());
    assert_eq!(run().iter().filter(|a| **a == DecimateAction::Keep).count(), 4);
}

struct PassthroughVideoDecoder;
impl Decoder for PassthroughVideoDecoder {
    fn name(&self) -> &str {
        "fixture-video-codec"
    }
    fn decode(&self, data: &[u8]) -> Result<Vec<u8>, RecordFormatError> {
        Ok(data.to_vec())
    }
}

#[derive(Default)]
struct FrameCollector {
    decoded: Vec<Vec<u8>>,
}
impl StreamPlayer for FrameCollector {
    fn on_image_opaque_read(&mut self, _header: &RecordHeaderInfo, _block_index: usize, _codec: &str, bytes: &[u8]) -> bool {
        self.decoded.push(bytes.to_vec());
        true
    }
}

#[test]
fn video_aware_player_reports_and_recovers_from_an_out_of_order_pframe() {
    if decoder_factory().get("fixture-video-codec").is_none() {
        decoder_factory().register("fixture-video-codec", Arc::new(PassthroughVideoDecoder));
    }

    let dir = tempdir().unwrap();
    let path = dir.path().join("video.vrs");
    let stream = sid(214, 0);
    let format = RecordFormat::new(
        "video",
        1,
        vec![ContentBlock::ImageVideo {
            codec: "fixture-video-codec".to_string(),
        }],
    );

    {
        let mut writer = RecordFileWriter::create(&path, WriteOptions::default()).unwrap();
        writer
            .write_records_async(vec![
                Record::new(stream, 0.0, RecordType::Data, 1, b"key0".to_vec()),
                Record::new(stream, 1.0, RecordType::Data, 1, b"pfr1".to_vec()),
                Record::new(stream, 2.0, RecordType::Data, 1, b"pfr2".to_vec()),
            ])
            .unwrap();
        writer.finalize().unwrap();
    }

    let mut reader = RecordFileReader::open_file(&path, false).unwrap();
    let mut collector = FrameCollector::default();
    let dispatched = Cell::new(0usize);

    {
        let mut video_player = VideoAwareStreamPlayer::new(&mut collector);
        // The second record (the middle p-frame) is dropped before dispatch,
        // as a decimation pass might drop it, so the third record arrives at
        // the handler looking like an out-of-order p-frame.
        reader
            .for_each_record(
                &mut video_player,
                |record_stream, _record_type, _version| {
                    let n = dispatched.get();
                    dispatched.set(n + 1);
                    if record_stream == stream && n != 1 {
                        Some(format.clone())
                    } else {
                        None
                    }
                },
                |record| record.timestamp == 0.0,
            )
            .unwrap();

        assert!(video_player.is_missing_frames(stream));
        assert_eq!(collector.decoded, vec![b"key0".to_vec()]);

        video_player
            .read_missing_frames(&mut reader, stream, "fixture-video-codec", |record| record.timestamp == 0.0, true)
            .unwrap();
        assert!(!video_player.is_missing_frames(stream));
    }

    // The inner player only sees what was dispatched live; the replay above
    // repairs the handler's sequencing state but doesn't re-deliver frames.
    assert_eq!(collector.decoded, vec![b"key0".to_vec()]);
}

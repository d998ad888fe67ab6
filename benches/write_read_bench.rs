use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tempfile::tempdir;
use vrs::compression::{compress, decompress, CompressionPreset};
use vrs::file_reader::RecordFileReader;
use vrs::file_writer::{RecordFileWriter, WriteOptions};
use vrs::model::{Record, RecordType, RecordableTypeId, StreamId};

fn stream() -> StreamId {
    StreamId::new(RecordableTypeId(214), 0)
}

fn bench_compression(c: &mut Criterion) {
    let data = vec![0u8; 1024 * 1024];

    c.bench_function("zstd_light_compress_1mb", |b| {
        b.iter(|| compress(black_box(&data), CompressionPreset::ZstdLight).unwrap())
    });
    c.bench_function("lz4_fast_compress_1mb", |b| {
        b.iter(|| compress(black_box(&data), CompressionPreset::Lz4Fast).unwrap())
    });

    let (compression_type, compressed) = compress(&data, CompressionPreset::ZstdLight).unwrap();
    c.bench_function("zstd_light_decompress_1mb", |b| {
        b.iter(|| decompress(black_box(&compressed), compression_type, data.len()).unwrap())
    });
}

fn bench_write_and_read(c: &mut Criterion) {
    c.bench_function("write_10k_small_records", |b| {
        b.iter(|| {
            let dir = tempdir().unwrap();
            let path = dir.path().join("bench.vrs");
            let mut writer = RecordFileWriter::create(&path, WriteOptions::default()).unwrap();
            let batch: Vec<Record> =
                (0..10_000).map(|i| Record::new(stream(), i as f64, RecordType::Data, 1, vec![0u8; 64])).collect();
            writer.write_records_async(black_box(batch)).unwrap();
            writer.finalize().unwrap();
        })
    });

    let dir = tempdir().unwrap();
    let path = dir.path().join("bench_read.vrs");
    {
        let mut writer = RecordFileWriter::create(&path, WriteOptions::default()).unwrap();
        let batch: Vec<Record> =
            (0..10_000).map(|i| Record::new(stream(), i as f64, RecordType::Data, 1, vec![0u8; 64])).collect();
        writer.write_records_async(batch).unwrap();
        writer.finalize().unwrap();
    }
    c.bench_function("read_10k_small_records_sequentially", |b| {
        b.iter(|| {
            let mut reader = RecordFileReader::open_file(&path, false).unwrap();
            for pos in 0..reader.record_count() {
                black_box(reader.read_record(pos).unwrap());
            }
        })
    });
}

criterion_group!(benches, bench_compression, bench_write_and_read);
criterion_main!(benches);

use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use vrs::compression::CompressionPreset;
use vrs::error::VrsError;
use vrs::file_reader::RecordFileReader;
use vrs::file_writer::{RecordFileWriter, WriteOptions};
use vrs::filter::decimate::{DecimateAction, Decimator, DefaultDecimator};
use vrs::filter::{Copier, FilteredFileReader, StreamSelector, ThrottledWriter, TimeRange};
use vrs::model::{RecordableTypeId, StreamId};
use vrs::multi_file_reader::MultiRecordFileReader;

#[derive(Parser)]
#[command(name = "vrs", version = "1.0.0", about = "Versatile Record System CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy a file, optionally filtering by time range, stream selector,
    /// and decimation
    Copy {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long, value_name = "T")]
        after: Option<f64>,
        #[arg(long, value_name = "T")]
        before: Option<f64>,
        #[arg(long, num_args = 2, value_names = ["A", "B"])]
        range: Option<Vec<f64>>,
        #[arg(long, num_args = 2, value_names = ["CENTER", "RADIUS"])]
        around: Option<Vec<f64>>,
        /// Keep only the first N records that pass every other filter
        #[arg(long)]
        first_records: Option<usize>,
        #[arg(long, num_args = 2, value_names = ["STREAM", "INTERVAL"])]
        decimate: Option<Vec<String>>,
        #[arg(long, value_name = "S")]
        bucket_interval: Option<f64>,
        #[arg(long, default_value_t = 1.0 / 30.0, value_name = "S")]
        bucket_max_delta: f64,
        /// Compression preset: none, lz4-fast, lz4-tight, zstd-faster, ...
        #[arg(long)]
        compression: Option<String>,
        /// Chunk size, e.g. "4M" or "1G"; rolls over to "<output>_1",
        /// "<output>_2", ... once a chunk reaches this size
        #[arg(long)]
        chunk_size: Option<String>,
        /// Background compression worker count
        #[arg(long)]
        mt: Option<usize>,
        #[arg(long = "file-tag", num_args = 2, value_names = ["KEY", "VALUE"])]
        file_tag: Vec<String>,
        #[arg(long = "stream-tag", num_args = 3, value_names = ["STREAM", "KEY", "VALUE"])]
        stream_tag: Vec<String>,
        #[arg(long)]
        no_progress: bool,
        /// `+<selector>` / `-<selector>` stream filters
        selectors: Vec<String>,
    },
    /// Merge several files into one timeline, remapping colliding StreamIds
    Merge {
        #[arg(num_args = 2..)]
        inputs: Vec<PathBuf>,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long)]
        compression: Option<String>,
        #[arg(long)]
        mt: Option<usize>,
        #[arg(long)]
        no_progress: bool,
    },
    /// Validate a file's header, index, and record sequence
    Check {
        input: PathBuf,
        /// Force a sequential scan instead of trusting the trailer index
        #[arg(long)]
        rebuild_index: bool,
    },
}

fn write_options(compression: Option<&str>, mt: Option<usize>, chunk_size: Option<&str>) -> WriteOptions {
    let mut options = WriteOptions::default();
    if let Some(name) = compression {
        match parse_preset(name) {
            Some(preset) => options.default_preset = preset,
            None => eprintln!("unknown compression preset '{name}', using default"),
        }
    }
    if let Some(workers) = mt {
        options = options.with_worker_count(workers);
    }
    if let Some(raw) = chunk_size {
        match parse_byte_size(raw) {
            Some(bytes) => options = options.with_max_chunk_size(bytes),
            None => eprintln!("unrecognized chunk size '{raw}', writing a single unbounded chunk"),
        }
    }
    options
}

/// Parses a plain byte count or a `<number><K|M|G>` suffix (case
/// insensitive, powers of 1024) into a byte count.
fn parse_byte_size(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    let (digits, multiplier) = match raw.chars().last() {
        Some(c) if c.eq_ignore_ascii_case(&'k') => (&raw[..raw.len() - 1], 1024u64),
        Some(c) if c.eq_ignore_ascii_case(&'m') => (&raw[..raw.len() - 1], 1024 * 1024),
        Some(c) if c.eq_ignore_ascii_case(&'g') => (&raw[..raw.len() - 1], 1024 * 1024 * 1024),
        _ => (raw, 1),
    };
    digits.trim().parse::<u64>().ok().map(|n| n * multiplier)
}

fn parse_preset(name: &str) -> Option<CompressionPreset> {
    match name {
        "none" => Some(CompressionPreset::None),
        "lz4-fast" => Some(CompressionPreset::Lz4Fast),
        "lz4-tight" => Some(CompressionPreset::Lz4Tight),
        "zstd-faster" => Some(CompressionPreset::ZstdFaster),
        "zstd-fast" => Some(CompressionPreset::ZstdFast),
        "zstd-light" => Some(CompressionPreset::ZstdLight),
        "zstd-medium" => Some(CompressionPreset::ZstdMedium),
        "zstd-heavy" => Some(CompressionPreset::ZstdHeavy),
        "zstd-high" => Some(CompressionPreset::ZstdHigh),
        "zstd-tight" => Some(CompressionPreset::ZstdTight),
        "zstd-max" => Some(CompressionPreset::ZstdMax),
        _ => None,
    }
}

/// Parses a `--decimate`/`--stream-tag` stream argument: either a bare
/// `RecordableTypeId` (applies to instance 0) or a `"type-instance"` pair.
fn parse_stream_arg(s: &str) -> Option<StreamId> {
    if let Some((type_part, instance_part)) = s.split_once('-') {
        if let (Ok(type_id), Ok(instance_id)) = (type_part.parse::<u16>(), instance_part.parse::<u16>()) {
            return Some(StreamId::new(RecordableTypeId(type_id), instance_id));
        }
    }
    s.parse::<u16>().ok().map(|type_id| StreamId::new(RecordableTypeId(type_id), 0))
}

#[allow(clippy::too_many_arguments)]
fn run_copy(
    input: PathBuf,
    output: PathBuf,
    after: Option<f64>,
    before: Option<f64>,
    range: Option<Vec<f64>>,
    around: Option<Vec<f64>>,
    first_records: Option<usize>,
    decimate: Option<Vec<String>>,
    bucket_interval: Option<f64>,
    bucket_max_delta: f64,
    compression: Option<String>,
    chunk_size: Option<String>,
    mt: Option<usize>,
    file_tag: Vec<String>,
    stream_tag: Vec<String>,
    selectors: Vec<String>,
) -> Result<(), VrsError> {
    let reader = RecordFileReader::open_file(&input, true)?;

    let time_range = if let Some(pair) = &range {
        TimeRange::new(Some(pair[0]), Some(pair[1]))
    } else if let Some(pair) = &around {
        TimeRange::around(pair[0], pair[1])
    } else {
        TimeRange::new(after, before)
    };

    let selector_tokens: Vec<&str> = selectors.iter().map(String::as_str).collect();
    let selector = StreamSelector::parse_tokens(&selector_tokens)?;

    let mut filtered = FilteredFileReader::new(reader).with_time_range(time_range).with_selector(selector);
    let mut positions = filtered.filtered_positions();
    if let Some(limit) = first_records {
        positions.truncate(limit);
    }

    if decimate.is_some() || bucket_interval.is_some() {
        let mut decimation_intervals: HashMap<StreamId, f64> = HashMap::new();
        if let Some(pair) = &decimate {
            if let (Some(stream_id), Ok(interval)) = (parse_stream_arg(&pair[0]), pair[1].parse::<f64>()) {
                decimation_intervals.insert(stream_id, interval);
            }
        }
        let mut decimator = DefaultDecimator::new(decimation_intervals, bucket_interval.unwrap_or(0.0), bucket_max_delta);
        let entries: Vec<(usize, StreamId, f64)> = {
            let reader = filtered.reader();
            positions
                .iter()
                .map(|&pos| (pos, reader.entry_stream_id(pos).unwrap(), reader.entry_timestamp(pos).unwrap()))
                .collect()
        };
        let mut kept = Vec::new();
        for &(pos, stream_id, timestamp) in &entries {
            let record_type = filtered.reader().entry_record_type(pos).unwrap();
            match decimator.decimate(stream_id, timestamp, record_type) {
                DecimateAction::Keep => kept.push(pos),
                DecimateAction::Drop | DecimateAction::Buffered => {}
            }
        }
        for (stream_id, timestamp) in decimator.flush() {
            if let Some(&(pos, ..)) =
                entries.iter().find(|&&(_, sid, ts)| sid == stream_id && (ts - timestamp).abs() < f64::EPSILON)
            {
                kept.push(pos);
            }
        }
        kept.sort_unstable();
        positions = kept;
    }

    let mut writer =
        RecordFileWriter::create(&output, write_options(compression.as_deref(), mt, chunk_size.as_deref()))?;
    for pair in file_tag.chunks(2) {
        if let [key, value] = pair {
            writer.set_tag(key.clone(), value.clone());
        }
    }
    for triple in stream_tag.chunks(3) {
        if let [stream, key, value] = triple {
            if let Some(stream_id) = parse_stream_arg(stream) {
                writer.set_tag(format!("{stream_id}:{key}"), value.clone());
            }
        }
    }
    let mut throttled = ThrottledWriter::new(writer);
    let copied = vrs::filter::filter_copy(filtered.reader(), &positions, &mut throttled, Copier)?;
    throttled.finalize()?;
    println!("copied {copied} records to {}", output.display());
    Ok(())
}

fn run_merge(inputs: Vec<PathBuf>, output: PathBuf, compression: Option<String>, mt: Option<usize>) -> Result<(), VrsError> {
    let mut multi = MultiRecordFileReader::open_files(&inputs, true)?;
    let writer = RecordFileWriter::create(&output, write_options(compression.as_deref(), mt, None))?;
    let mut throttled = ThrottledWriter::new(writer);
    let mut batch = Vec::with_capacity(multi.record_count());
    for pos in 0..multi.record_count() {
        batch.push(multi.read_record(pos)?);
    }
    let count = batch.len();
    throttled.write(batch)?;
    throttled.finalize()?;
    println!("merged {} file(s) ({count} records) into {}", inputs.len(), output.display());
    Ok(())
}

fn run_check(input: PathBuf, rebuild_index: bool) -> Result<(), VrsError> {
    let reader = RecordFileReader::open_file(&input, rebuild_index)?;
    println!(
        "{}: {} records across {} streams",
        input.display(),
        reader.record_count(),
        reader.streams().len()
    );
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Copy {
            input,
            output,
            after,
            before,
            range,
            around,
            first_records,
            decimate,
            bucket_interval,
            bucket_max_delta,
            compression,
            chunk_size,
            mt,
            file_tag,
            stream_tag,
            no_progress: _,
            selectors,
        } => run_copy(
            input,
            output,
            after,
            before,
            range,
            around,
            first_records,
            decimate,
            bucket_interval,
            bucket_max_delta,
            compression,
            chunk_size,
            mt,
            file_tag,
            stream_tag,
            selectors,
        ),
        Commands::Merge { inputs, output, compression, mt, no_progress: _ } => run_merge(inputs, output, compression, mt),
        Commands::Check { input, rebuild_index } => run_check(input, rebuild_index),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

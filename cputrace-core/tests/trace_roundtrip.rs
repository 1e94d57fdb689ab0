//! Saving channels to trace files and loading them back.

mod common;

use common::{
    capture, counting_events, expected_after_reload, read_all, save_to_vec, synthetic_events,
    test_history_config,
};
use cputrace_core::format::{Codec, Column, ColumnKind};
use cputrace_core::trace_io::{
    ContainerWriter, LoadOptions, SaveOptions, TraceManifest, load_cpu_history, read_trace_info,
    save_cpu_history,
};
use cputrace_core::types::{EA_NONE, HistoryEntry};
use parking_lot::Mutex;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::sync::Arc;

fn load(bytes: &[u8]) -> cputrace_core::CpuHistoryChannel {
    load_cpu_history(bytes, &LoadOptions::default()).unwrap()
}

/// Write a trace with a hand-built manifest and raw rows.
fn custom_trace(manifest: &TraceManifest, rows: &[u8]) -> Vec<u8> {
    let row_size = manifest.byte_count as usize;
    let group_bytes = manifest.row_group_size as usize * row_size;
    let mut out = Vec::new();
    let mut writer =
        ContainerWriter::new(&mut out, &manifest.to_json().unwrap(), manifest.expected_blocks())
            .unwrap();
    for group in rows.chunks(group_bytes) {
        let mut block = Vec::new();
        manifest.codec.encode(group, row_size, &mut block).unwrap();
        writer.write_block(&block).unwrap();
    }
    writer.finish().unwrap();
    out
}

fn cycle_only_manifest(bit_width: u32, rows: u32) -> TraceManifest {
    TraceManifest {
        channel: "CPU".to_string(),
        row_count: rows,
        row_group_size: 64,
        byte_count: bit_width / 8,
        codec: Codec::Null,
        columns: vec![Column::new(ColumnKind::Cycle, 0, bit_width)],
        predictors: Vec::new(),
        tick_scale: 1.0,
    }
}

#[test]
fn round_trip_across_row_counts() {
    for rows in [0usize, 1, 63, 64, 65, 511, 512, 513, 1000, 10_000] {
        let events = synthetic_events(rows, rows as u64);
        let mut channel = capture(&events, test_history_config());
        let options = SaveOptions::default().with_row_group_size(512);
        let bytes = save_to_vec(&mut channel, &options);

        let mut loaded = load(&bytes);
        assert_eq!(loaded.event_count(), rows as u32, "rows = {}", rows);
        assert_eq!(loaded.name(), "CPU");
        assert_eq!(loaded.tick_scale(), 1.0);
        assert_eq!(
            read_all(&mut loaded),
            expected_after_reload(&events, channel.history_base_cycle()),
            "rows = {}",
            rows
        );
    }
}

#[test]
fn null_codec_round_trip() {
    let events = synthetic_events(3000, 8);
    let mut channel = capture(&events, test_history_config());
    let sparse = save_to_vec(&mut channel, &SaveOptions::default());
    let raw = save_to_vec(&mut channel, &SaveOptions::default().with_codec(Codec::Null));
    assert!(raw.len() > sparse.len());

    let mut loaded = load(&raw);
    assert_eq!(read_all(&mut loaded), expected_after_reload(&events, 0));
}

#[test]
fn saving_twice_is_identical() {
    let events = synthetic_events(20_000, 13);
    let mut channel = capture(&events, test_history_config());
    let options = SaveOptions::default().with_row_group_size(4096);
    let first = save_to_vec(&mut channel, &options);
    let second = save_to_vec(&mut channel, &options);
    assert_eq!(first, second);

    let mut a = load(&first);
    let mut b = load(&first);
    assert_eq!(read_all(&mut a), read_all(&mut b));
}

#[test]
fn resaving_a_loaded_trace_is_byte_identical() {
    let events = synthetic_events(5000, 17);
    let mut channel = capture(&events, test_history_config());
    let options = SaveOptions::default().with_row_group_size(1000);
    let first = save_to_vec(&mut channel, &options);

    let mut loaded = load(&first);
    assert_eq!(save_to_vec(&mut loaded, &options), first);
}

#[test]
fn unhalted_cycles_are_relative_to_the_first_row() {
    let events = synthetic_events(2000, 19);
    let shifted: Vec<_> = events
        .iter()
        .map(|&(tick, mut he)| {
            he.unhalted_cycle = he.unhalted_cycle.wrapping_add(0x00AB_0000);
            (tick, he)
        })
        .collect();
    let mut channel = capture(&shifted, test_history_config());
    let mut loaded = load(&save_to_vec(&mut channel, &SaveOptions::default()));

    let rows = read_all(&mut loaded);
    assert_eq!(rows[0].unhalted_cycle, 0);
    assert_eq!(rows, expected_after_reload(&shifted, 0));
}

#[test]
fn event_times_survive_reload() {
    let events = synthetic_events(3000, 23);
    let mut channel = capture(&events, test_history_config());
    let mut loaded = load(&save_to_vec(&mut channel, &SaveOptions::default()));

    channel.start_history_iteration(0.0, 0).unwrap();
    loaded.start_history_iteration(0.0, 0).unwrap();
    for index in (0..3000).step_by(37) {
        assert_eq!(
            loaded.event_time(index).unwrap(),
            channel.event_time(index).unwrap()
        );
    }
    assert_eq!(loaded.duration(), channel.duration());
}

#[test]
fn effective_address_sentinel_round_trip() {
    let eas = [
        EA_NONE,
        0x0000_1234,
        EA_NONE,
        EA_NONE,
        0x0000_1236,
        0xFF00_0001,
        0x0000_00FF,
        0xFFFF_FF00,
        0x0000_1234,
    ];
    let events: Vec<_> = counting_events(eas.len() as u32 * 50)
        .into_iter()
        .enumerate()
        .map(|(i, (tick, mut he))| {
            he.ea = eas[i % eas.len()];
            (tick, he)
        })
        .collect();
    let mut channel = capture(&events, test_history_config());
    let mut loaded = load(&save_to_vec(&mut channel, &SaveOptions::default()));

    let rows = read_all(&mut loaded);
    for (i, he) in rows.iter().enumerate() {
        let ea = eas[i % eas.len()];
        let expected = if ea >= 0xFF00_0000 { EA_NONE } else { ea };
        assert_eq!(he.ea, expected, "row {}", i);
    }
}

#[test]
fn row_groups_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("counting.trace");

    let events = counting_events(4096);
    let mut channel = capture(&events, test_history_config());
    let options = SaveOptions::default().with_row_group_size(512);
    let summary = {
        let mut file = BufWriter::new(File::create(&path).unwrap());
        save_cpu_history(&mut channel, &mut file, &options).unwrap()
    };
    assert_eq!(summary.rows, 4096);
    assert_eq!(summary.blocks, 8);
    assert_eq!(summary.bytes_written, std::fs::metadata(&path).unwrap().len());

    let info = read_trace_info(BufReader::new(File::open(&path).unwrap())).unwrap();
    assert_eq!(info.header.block_count, 8);
    assert_eq!(info.block_sizes.len(), 8);
    assert_eq!(info.manifest.row_group_size, 512);
    assert!(info.compression_ratio() > 1.0);

    let reader = BufReader::new(File::open(&path).unwrap());
    let mut loaded = load_cpu_history(reader, &LoadOptions::default()).unwrap();
    assert_eq!(loaded.event_count(), 4096);
    assert_eq!(loaded.event(2047).unwrap().map(|he| he.cycle), Some(2047));
    assert_eq!(loaded.event(4095).unwrap().map(|he| he.unhalted_cycle), Some(4095));
    assert_eq!(read_all(&mut loaded), expected_after_reload(&events, 0));
}

#[test]
fn progress_is_reported_per_group() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let options = SaveOptions::default()
        .with_row_group_size(100)
        .with_progress(move |done, total| sink.lock().push((done, total)));

    let mut channel = capture(&counting_events(250), test_history_config());
    let bytes = save_to_vec(&mut channel, &options);
    assert_eq!(*seen.lock(), vec![(0, 3), (1, 3), (2, 3)]);

    seen.lock().clear();
    let sink = Arc::clone(&seen);
    let load_options =
        LoadOptions::default().with_progress(move |done, total| sink.lock().push((done, total)));
    load_cpu_history(bytes.as_slice(), &load_options).unwrap();
    assert_eq!(seen.lock().len(), 3);
}

#[test]
fn load_carries_wrapped_cycle_counters() {
    let cycles = [0xFFFF_FFF0u32, 0xFFFF_FFF8, 0x0000_0010, 0x0000_0020];
    let rows: Vec<u8> = cycles.iter().flat_map(|c| c.to_le_bytes()).collect();
    let manifest = cycle_only_manifest(32, cycles.len() as u32);
    let mut loaded = load(&custom_trace(&manifest, &rows));

    loaded.start_history_iteration(0.0, 0).unwrap();
    let first = loaded.event_time(0).unwrap();
    assert_eq!(first, f64::from(0xFFFF_FFF0u32));
    assert_eq!(loaded.event_time(2).unwrap() - first, 32.0);
    assert_eq!(loaded.duration() - first, 48.0);

    let he = loaded.event(3).unwrap().unwrap();
    assert_eq!(he.cycle, 0x20);
    assert_eq!(he.ea, EA_NONE);
    assert_eq!(he.p, 0x30);
}

#[test]
fn narrow_cycle_columns_are_widened() {
    let count = 300u32;
    let rows: Vec<u8> = (0..count).map(|i| (i * 3) as u8).collect();
    let manifest = cycle_only_manifest(8, count);
    let mut loaded = load(&custom_trace(&manifest, &rows));

    let cycles: Vec<u32> = read_all(&mut loaded).iter().map(|he| he.cycle).collect();
    let expected: Vec<u32> = (0..count).map(|i| i * 3).collect();
    assert_eq!(cycles, expected);
}

#[test]
fn custom_schema_with_sparse_codec() {
    let manifest = TraceManifest {
        channel: "SA-1".to_string(),
        row_count: 200,
        row_group_size: 64,
        byte_count: 8,
        codec: Codec::Sparse,
        columns: vec![
            Column::new(ColumnKind::Cycle, 0, 32),
            Column::new(ColumnKind::Pc, 32, 16),
            Column::new(ColumnKind::A, 48, 8),
            Column::new(ColumnKind::Irq, 56, 1),
            Column::new(ColumnKind::Nmi, 57, 1),
        ],
        predictors: Vec::new(),
        tick_scale: 0.5,
    };
    let mut rows = Vec::new();
    for i in 0..200u32 {
        rows.extend_from_slice(&(i * 2).to_le_bytes());
        rows.extend_from_slice(&(0x8000 + i as u16).to_le_bytes());
        rows.push(i as u8);
        rows.push(if i % 10 == 0 { 0b01 } else if i % 10 == 5 { 0b10 } else { 0 });
    }
    let bytes = custom_trace(&manifest, &rows);
    let mut loaded = load(&bytes);

    assert_eq!(loaded.name(), "SA-1");
    assert_eq!(loaded.tick_scale(), 0.5);
    let entries = read_all(&mut loaded);
    for (i, he) in entries.iter().enumerate() {
        let i = i as u32;
        assert_eq!(he.cycle, i * 2);
        assert_eq!(he.pc, 0x8000 + i as u16);
        assert_eq!(he.a, i as u8);
        assert_eq!(he.irq, i % 10 == 0);
        assert_eq!(he.nmi, i % 10 == 5);
        assert_eq!(he.unhalted_cycle, 0);
        assert_eq!(he.opcode, [0; 4]);
    }
    assert_eq!(loaded.duration(), 199.0);
}

#[test]
fn empty_channel_round_trip() {
    let mut channel = capture(&[], test_history_config());
    let bytes = save_to_vec(&mut channel, &SaveOptions::default());
    let info = read_trace_info(bytes.as_slice()).unwrap();
    assert_eq!(info.header.block_count, 0);
    assert_eq!(info.compression_ratio(), 0.0);

    let mut loaded = load(&bytes);
    assert_eq!(loaded.event_count(), 0);
    assert_eq!(loaded.event(0).unwrap(), None::<HistoryEntry>);
}

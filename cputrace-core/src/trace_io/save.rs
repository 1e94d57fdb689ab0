//! Writing a channel's history to a trace file.

use super::container::ContainerWriter;
use super::manifest::TraceManifest;
use super::options::SaveOptions;
use crate::error::{Result, TraceError};
use crate::format::{PredictorPipeline, RowSchema, STANDARD_ROW_SIZE};
use crate::history::CpuHistoryChannel;
use crate::types::HistoryEntry;
use byteorder::{ByteOrder, LittleEndian};
use std::io::Write;
use tracing::{debug, info};

/// Rows fetched from the channel per read.
const READ_BATCH: usize = 256;

/// What a save wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveSummary {
    /// Rows written.
    pub rows: u32,
    /// Blocks written.
    pub blocks: u32,
    /// Bytes written, container framing included.
    pub bytes_written: u64,
}

/// Pack `he` into a standard 24-byte row. Cycle counters are stored as 16-bit
/// deltas from the given bases.
pub fn pack_standard_row(he: &HistoryEntry, base_cycle: u32, base_unhalted: u32, out: &mut [u8]) {
    LittleEndian::write_u16(&mut out[0..], he.cycle.wrapping_sub(base_cycle) as u16);
    LittleEndian::write_u16(
        &mut out[2..],
        he.unhalted_cycle.wrapping_sub(base_unhalted) as u16,
    );
    out[4] = he.a;
    out[5] = he.x;
    out[6] = he.y;
    out[7] = he.s;
    LittleEndian::write_u16(&mut out[8..], he.pc);
    out[10] = he.p;
    out[11] = u8::from(he.irq) | (u8::from(he.nmi) << 1);
    LittleEndian::write_u32(&mut out[12..], he.ea);
    out[16..20].copy_from_slice(&he.opcode);
    LittleEndian::write_u32(&mut out[20..], he.global_pc_base);
}

/// Write every row of `channel` to `writer`.
///
/// Waits for outstanding packing first and fails with
/// [`TraceError::CaptureFaulted`] if capture was disabled. Rows are stored in
/// the standard 24-byte layout, one block per row group, coded with the
/// standard predictor pipeline and `options.codec`.
pub fn save_cpu_history<W: Write>(
    channel: &mut CpuHistoryChannel,
    writer: W,
    options: &SaveOptions,
) -> Result<SaveSummary> {
    channel.flush()?;
    if channel.in_session() {
        debug!(
            channel = %channel.name(),
            rows = channel.event_count(),
            "saving an open capture; later rows are not included"
        );
    }

    let group_size = options.row_group_size;
    if group_size == 0 {
        return Err(TraceError::RowGeometry {
            cause: "row group size is zero".to_string(),
        });
    }
    options.codec.validate(STANDARD_ROW_SIZE)?;

    let manifest = TraceManifest {
        channel: channel.name().to_string(),
        row_count: channel.event_count(),
        row_group_size: group_size,
        byte_count: STANDARD_ROW_SIZE,
        codec: options.codec,
        columns: RowSchema::standard().columns().to_vec(),
        predictors: PredictorPipeline::standard_predictors(),
        tick_scale: channel.tick_scale(),
    };
    let row_count = manifest.row_count;
    let block_count = manifest.expected_blocks();
    let mut out = ContainerWriter::new(writer, &manifest.to_json()?, block_count)?;

    let mut pipeline = PredictorPipeline::standard()?;
    let row_size = STANDARD_ROW_SIZE as usize;
    let mut batch = [HistoryEntry::default(); READ_BATCH];
    let mut bases: Option<(u32, u32)> = None;
    let mut raw = Vec::new();
    let mut packed = Vec::new();

    channel.start_history_iteration(0.0, 0)?;
    for group in 0..block_count {
        if let Some(progress) = &options.progress {
            progress(group, block_count);
        }

        let first = group * group_size;
        let rows = group_size.min(row_count - first) as usize;
        raw.clear();
        raw.resize(rows * row_size, 0);

        let mut offset = 0;
        while offset < rows {
            let want = (rows - offset).min(READ_BATCH);
            let got = channel.read_history_events(&mut batch[..want], first + offset as u32)?;
            if got < want {
                return Err(TraceError::UnexpectedEof {
                    what: "CPU history events",
                });
            }

            let (base_cycle, base_unhalted) =
                *bases.get_or_insert((channel.history_base_cycle(), batch[0].unhalted_cycle));
            let dst = raw[offset * row_size..].chunks_exact_mut(row_size);
            for (he, row) in batch[..got].iter().zip(dst) {
                pack_standard_row(he, base_cycle, base_unhalted, row);
            }
            offset += got;
        }

        pipeline.reset();
        pipeline.encode(&mut raw);
        packed.clear();
        options.codec.encode(&raw, row_size, &mut packed)?;
        out.write_block(&packed)?;
        debug!(group, rows, bytes = packed.len(), "row group written");
    }

    let bytes_written = out.finish()?;
    info!(
        channel = %manifest.channel,
        rows = row_count,
        blocks = block_count,
        bytes = bytes_written,
        "trace saved"
    );
    Ok(SaveSummary {
        rows: row_count,
        blocks: block_count,
        bytes_written,
    })
}

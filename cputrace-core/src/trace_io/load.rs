//! Rebuilding a channel from a trace file.

use super::container::{ContainerReader, TraceHeader};
use super::manifest::TraceManifest;
use super::options::LoadOptions;
use super::replay::HistoryDecoder;
use crate::error::{Result, TraceError};
use crate::format::{PredictorPipeline, RowSchema};
use crate::history::CpuHistoryChannel;
use std::io::Read;
use tracing::{debug, info};

/// Most predictors a manifest may list.
pub const MAX_PREDICTORS: usize = 100;

/// Widest row accepted on load.
pub const MAX_LOAD_ROW_SIZE: u32 = 256;

/// A validated decoding plan for one trace.
struct LoadPlan {
    schema: RowSchema,
    pipeline: PredictorPipeline,
}

/// Check everything about the manifest before any block is touched.
fn plan(manifest: &TraceManifest, header: &TraceHeader) -> Result<LoadPlan> {
    if manifest.row_group_size == 0 {
        return Err(TraceError::RowGeometry {
            cause: "row group size is zero".to_string(),
        });
    }
    if manifest.predictors.len() > MAX_PREDICTORS {
        return Err(TraceError::UnsupportedGeometry {
            cause: format!(
                "{} predictors exceeds {}",
                manifest.predictors.len(),
                MAX_PREDICTORS
            ),
        });
    }
    if manifest.byte_count > MAX_LOAD_ROW_SIZE {
        return Err(TraceError::UnsupportedGeometry {
            cause: format!(
                "row size {} exceeds {} bytes",
                manifest.byte_count, MAX_LOAD_ROW_SIZE
            ),
        });
    }
    if !manifest.tick_scale.is_finite() || manifest.tick_scale <= 0.0 {
        return Err(TraceError::Manifest {
            cause: format!("tick scale {} is not positive", manifest.tick_scale),
        });
    }

    let schema = RowSchema::new(manifest.byte_count, manifest.columns.clone())?;
    manifest.codec.validate(manifest.byte_count)?;
    let pipeline =
        PredictorPipeline::new(manifest.byte_count, manifest.predictors.clone())?.optimized()?;

    let expected = manifest.expected_blocks();
    if header.block_count != expected {
        return Err(TraceError::BlockCount {
            expected,
            found: header.block_count,
        });
    }

    Ok(LoadPlan { schema, pipeline })
}

/// Read a trace file into a new channel.
///
/// The whole file is validated and decoded; on any failure no channel is
/// returned. Rows are replayed with `tick = tick_base + cycle`, where
/// `tick_base` advances by 2^32 each time the cycle counter wraps.
pub fn load_cpu_history<R: Read>(reader: R, options: &LoadOptions) -> Result<CpuHistoryChannel> {
    let mut container = ContainerReader::open(reader)?;
    let manifest = TraceManifest::from_json(container.manifest())?;
    let config = options
        .history
        .clone()
        .with_name(manifest.channel.clone())
        .with_tick_scale(manifest.tick_scale);

    if manifest.row_count == 0 {
        return CpuHistoryChannel::new(config);
    }

    let LoadPlan {
        schema,
        mut pipeline,
    } = plan(&manifest, container.header())?;
    debug!(
        stages = pipeline.stages().len(),
        persisted = manifest.predictors.len(),
        "predictors optimized"
    );

    let row_size = manifest.byte_count as usize;
    let group_size = manifest.row_group_size;
    let group_count = manifest.expected_blocks();
    let mut decoder = HistoryDecoder::new(&schema);
    let mut channel = CpuHistoryChannel::new(config)?;
    channel.begin_events();

    let mut rows = Vec::new();
    let mut entries = Vec::new();
    let mut tick_base = 0u64;
    let mut last_cycle = 0u32;
    for group in 0..group_count {
        if let Some(progress) = &options.progress {
            progress(group, group_count);
        }

        let block = container
            .next_block()?
            .ok_or(TraceError::BlockCount {
                expected: group_count,
                found: group,
            })?;
        let row_total = group_size.min(manifest.row_count - group * group_size) as usize;
        manifest
            .codec
            .check_encoded_len(block.len(), row_total, row_size)?;

        rows.clear();
        rows.resize(row_total * row_size, 0);
        manifest.codec.decode(&block, row_size, &mut rows)?;
        pipeline.reset();
        pipeline.decode(&mut rows);

        entries.clear();
        decoder.decode(&rows, &mut entries);
        for he in &entries {
            if he.cycle < last_cycle {
                tick_base += 1 << 32;
            }
            last_cycle = he.cycle;
            channel.add_event(tick_base + u64::from(he.cycle), he);
        }
        debug!(group, rows = row_total, "row group loaded");
    }

    channel.end_events()?;
    info!(
        channel = %manifest.channel,
        rows = channel.event_count(),
        groups = group_count,
        "trace loaded"
    );
    Ok(channel)
}

/// Container and manifest facts, read without decoding any rows.
#[derive(Debug, Clone)]
pub struct TraceInfo {
    /// Container header.
    pub header: TraceHeader,
    /// Parsed manifest.
    pub manifest: TraceManifest,
    /// Stored size of each block.
    pub block_sizes: Vec<u32>,
}

impl TraceInfo {
    /// Bytes of block payload.
    pub fn packed_bytes(&self) -> u64 {
        self.block_sizes.iter().map(|&n| u64::from(n)).sum()
    }

    /// Unpacked size over packed size.
    pub fn compression_ratio(&self) -> f64 {
        let raw = u64::from(self.manifest.row_count) * u64::from(self.manifest.byte_count);
        match self.packed_bytes() {
            0 => 0.0,
            packed => raw as f64 / packed as f64,
        }
    }
}

/// Read a trace file's header, manifest, and block sizes, verifying every
/// block checksum.
pub fn read_trace_info<R: Read>(reader: R) -> Result<TraceInfo> {
    let mut container = ContainerReader::open(reader)?;
    let manifest = TraceManifest::from_json(container.manifest())?;
    let header = *container.header();

    let mut block_sizes = Vec::with_capacity(header.block_count as usize);
    while let Some(block) = container.next_block()? {
        block_sizes.push(block.len() as u32);
    }

    Ok(TraceInfo {
        header,
        manifest,
        block_sizes,
    })
}

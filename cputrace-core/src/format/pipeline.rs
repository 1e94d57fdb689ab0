//! Ordered predictor stages applied to a buffer of fixed-width rows.

use super::fusion::optimize_predictors;
use super::predictor::{
    Delta16TablePrev8, EffectiveAddress, HorizDelta16, HorizDelta32, Insn, Pc, Predictor,
    SignMag16, SignMag32, VertDelta8, VertDelta16, VertDelta32, Xor, Xor32Table8,
    Xor32TablePrev16,
};
use crate::error::Result;

/// Width of the on-disk row written by the save path.
pub const STANDARD_ROW_SIZE: u32 = 24;

/// Width of a [`HistoryEntry`](crate::types::HistoryEntry) packed for a live block.
pub const LIVE_ROW_SIZE: u32 = 32;

/// Rows decoded per band; every stage runs over one band before the next.
pub const DECODE_BAND_ROWS: usize = 1024;

/// A validated stage list for one row width.
///
/// Stages are listed in decode order. [`encode`](Self::encode) runs them back
/// to front.
#[derive(Debug, Clone)]
pub struct PredictorPipeline {
    row_size: u32,
    stages: Vec<Predictor>,
}

impl PredictorPipeline {
    /// Validate every stage against rows of `row_size` bytes.
    pub fn new(row_size: u32, stages: Vec<Predictor>) -> Result<Self> {
        for stage in &stages {
            stage.access_mask(row_size)?;
        }
        Ok(Self { row_size, stages })
    }

    /// The stage list persisted for the standard 24-byte row.
    #[must_use]
    pub fn standard_predictors() -> Vec<Predictor> {
        vec![
            Xor::new(10, 2).into(),
            EffectiveAddress::new(12).into(),
            Pc::new(8).into(),
            Xor32TablePrev16::new(4, 8).into(),
            VertDelta8::new(4, 4).into(),
            Insn::new(16, 4, 8, 92).into(),
            SignMag16::new(0, 1).into(),
            SignMag16::new(2, 1).into(),
            Delta16TablePrev8::new(2, 16).into(),
            HorizDelta16::new(0, 2).into(),
            VertDelta16::new(0, 2).into(),
            VertDelta16::new(2, 2).into(),
            Xor32Table8::new(20, 16).into(),
        ]
    }

    /// The standard pipeline in its fused form, ready to code rows.
    pub fn standard() -> Result<Self> {
        Self::new(STANDARD_ROW_SIZE, Self::standard_predictors())?.optimized()
    }

    /// The stage list used for live 64-row blocks.
    ///
    /// Only small tables appear here since every block starts from reset
    /// state.
    #[must_use]
    pub fn live_predictors() -> Vec<Predictor> {
        vec![
            Xor::new(14, 2).into(),
            EffectiveAddress::new(16).into(),
            VertDelta8::new(8, 4).into(),
            SignMag16::new(12, 1).into(),
            VertDelta16::new(12, 0).into(),
            Xor32Table8::new(20, 12).into(),
            Xor32Table8::new(24, 20).into(),
            SignMag32::new(0, 1).into(),
            SignMag32::new(4, 1).into(),
            HorizDelta32::new(0, 4).into(),
            VertDelta32::new(0, 0).into(),
            VertDelta32::new(4, 0).into(),
        ]
    }

    /// The live block pipeline.
    pub fn live() -> Result<Self> {
        Self::new(LIVE_ROW_SIZE, Self::live_predictors())
    }

    /// Replace stage sequences with their fused equivalents.
    pub fn optimized(self) -> Result<Self> {
        let stages = optimize_predictors(self.row_size, self.stages)?;
        Ok(Self {
            row_size: self.row_size,
            stages,
        })
    }

    /// Row width in bytes.
    #[must_use]
    pub fn row_size(&self) -> u32 {
        self.row_size
    }

    /// Stages in decode order.
    #[must_use]
    pub fn stages(&self) -> &[Predictor] {
        &self.stages
    }

    /// Return every stage to stream-start state.
    pub fn reset(&mut self) {
        for stage in &mut self.stages {
            stage.reset();
        }
    }

    /// Replace fields with residuals, running stages back to front.
    pub fn encode(&mut self, rows: &mut [u8]) {
        let row_size = self.row_size as usize;
        for band in rows.chunks_mut(DECODE_BAND_ROWS * row_size) {
            for stage in self.stages.iter_mut().rev() {
                stage.encode(band, row_size);
            }
        }
    }

    /// Restore rows from residuals, one band at a time.
    pub fn decode(&mut self, rows: &mut [u8]) {
        let row_size = self.row_size as usize;
        for band in rows.chunks_mut(DECODE_BAND_ROWS * row_size) {
            for stage in &mut self.stages {
                stage.decode(band, row_size);
            }
        }
    }
}

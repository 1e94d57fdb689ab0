//! Row encoding: predictors, codecs, the fusion pass, and row schemas.

pub mod access_mask;
pub mod codec;
mod fusion;
mod pipeline;
pub mod predictor;
mod schema;

pub use access_mask::{AccessMask, ByteMask};
pub use codec::{Codec, NullCodec, RowCodec, SparseCodec};
pub use fusion::optimize_predictors;
pub use pipeline::{DECODE_BAND_ROWS, LIVE_ROW_SIZE, PredictorPipeline, STANDARD_ROW_SIZE};
pub use predictor::{Predictor, RowPredictor};
pub use schema::{Column, ColumnKind, MAX_SCHEMA_ROW_SIZE, RowSchema};

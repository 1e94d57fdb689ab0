use super::RowCodec;
use crate::error::{Result, TraceError};

/// Stores rows verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCodec;

impl RowCodec for NullCodec {
    const NAME: &'static str = "null";

    fn validate(&self, _row_size: u32) -> Result<()> {
        Ok(())
    }

    fn encode(&self, rows: &[u8], _row_size: usize, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(rows);
        Ok(())
    }

    fn decode(&self, input: &[u8], _row_size: usize, out: &mut [u8]) -> Result<()> {
        if input.len() != out.len() {
            return Err(TraceError::CorruptStream {
                codec: Self::NAME,
                cause: format!("expected {} bytes, found {}", out.len(), input.len()),
            });
        }
        out.copy_from_slice(input);
        Ok(())
    }
}

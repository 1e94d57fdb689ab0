//! Predictor pipelines and codecs over the supported row widths.

use cputrace_core::format::predictor::{SignMag16, VertDelta8, VertDelta16, Xor};
use cputrace_core::format::{Codec, Predictor, PredictorPipeline};
use proptest::prelude::*;

const ROW_SIZES: [usize; 5] = [4, 8, 16, 24, 32];

/// A generic chain for any row of at least four bytes.
fn pipeline_for(row_size: usize) -> PredictorPipeline {
    let rest = row_size as u32 - 2;
    let stages: Vec<Predictor> = vec![
        Xor::new(2, rest.min(2)).into(),
        VertDelta8::new(2, rest).into(),
        SignMag16::new(0, 1).into(),
        VertDelta16::new(0, 3).into(),
    ];
    PredictorPipeline::new(row_size as u32, stages).unwrap()
}

/// Rows shaped like trace data: a counter, slowly changing bytes, and noise.
fn trace_like_rows(row_size: usize, rows: usize, seed: u64) -> Vec<u8> {
    let mut state = seed | 1;
    let mut out = vec![0u8; rows * row_size];
    for (i, row) in out.chunks_exact_mut(row_size).enumerate() {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        row[..2].copy_from_slice(&((i * 3) as u16).to_le_bytes());
        row[2] = (i / 16) as u8;
        if state % 4 == 0 {
            row[row_size - 1] = state as u8;
        }
    }
    out
}

fn round_trip(rows: &[u8], row_size: usize, codec: Codec) -> usize {
    let mut encoded = rows.to_vec();
    let mut pipeline = pipeline_for(row_size);
    pipeline.encode(&mut encoded);
    let mut packed = Vec::new();
    codec.encode(&encoded, row_size, &mut packed).unwrap();

    let mut decoded = vec![0u8; rows.len()];
    codec.decode(&packed, row_size, &mut decoded).unwrap();
    let mut pipeline = pipeline_for(row_size);
    pipeline.decode(&mut decoded);
    assert_eq!(decoded, rows, "row size {}", row_size);
    packed.len()
}

#[test]
fn every_row_size_round_trips() {
    for row_size in ROW_SIZES {
        for count in [0, 1, 2, 63, 64, 65, 1023, 1024, 1025, 10_000] {
            let rows = trace_like_rows(row_size, count, count as u64 + 1);
            for codec in [Codec::Sparse, Codec::Null] {
                round_trip(&rows, row_size, codec);
            }
        }
    }
}

#[test]
fn predictors_shrink_trace_like_rows() {
    for row_size in ROW_SIZES {
        let rows = trace_like_rows(row_size, 4096, 99);
        let mut plain = Vec::new();
        Codec::Sparse.encode(&rows, row_size, &mut plain).unwrap();
        let predicted = round_trip(&rows, row_size, Codec::Sparse);
        assert!(predicted < plain.len(), "row size {}", row_size);
    }
}

#[test]
fn sparse_extremes() {
    for row_size in ROW_SIZES {
        let mask_bytes = row_size.div_ceil(8);

        let zeros = vec![0u8; row_size * 100];
        let mut packed = Vec::new();
        Codec::Sparse.encode(&zeros, row_size, &mut packed).unwrap();
        assert_eq!(packed.len(), mask_bytes * 100);

        let full = vec![0x5Au8; row_size * 100];
        packed.clear();
        Codec::Sparse.encode(&full, row_size, &mut packed).unwrap();
        assert_eq!(packed.len(), (mask_bytes + row_size) * 100);

        let mut out = vec![0u8; full.len()];
        Codec::Sparse.decode(&packed, row_size, &mut out).unwrap();
        assert_eq!(out, full);

        let mut last_only = vec![0u8; row_size];
        last_only[row_size - 1] = 0x80;
        packed.clear();
        Codec::Sparse.encode(&last_only, row_size, &mut packed).unwrap();
        assert_eq!(packed.len(), mask_bytes + 1);
        assert_eq!(packed[mask_bytes - 1], 1 << ((row_size - 1) % 8));
        assert_eq!(packed[mask_bytes], 0x80);
    }
}

#[test]
fn standard_pipeline_fuses_and_agrees() {
    let mut fused = PredictorPipeline::standard().unwrap();
    let mut plain =
        PredictorPipeline::new(24, PredictorPipeline::standard_predictors()).unwrap();
    assert!(fused.stages().len() < plain.stages().len());

    let rows = trace_like_rows(24, 5000, 7);
    let mut a = rows.clone();
    let mut b = rows.clone();
    fused.encode(&mut a);
    plain.encode(&mut b);
    assert_eq!(a, b);

    plain.reset();
    plain.decode(&mut a);
    assert_eq!(a, rows);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn arbitrary_rows_round_trip(
        size_index in 0usize..ROW_SIZES.len(),
        data in prop::collection::vec(
            prop_oneof![4 => Just(0u8), 1 => any::<u8>()],
            0..4096,
        ),
    ) {
        let row_size = ROW_SIZES[size_index];
        let whole = data.len() / row_size * row_size;
        let rows = &data[..whole];
        round_trip(rows, row_size, Codec::Sparse);
        round_trip(rows, row_size, Codec::Null);
    }
}

//! Greedy fusion of adjacent predictor stages.
//!
//! Each rule names a leading stage and the partners that must follow it. A
//! partner need not be adjacent: it may be pulled up past intervening stages
//! as long as its access mask can swap with everything it passes. After each
//! successful fusion the scan restarts from the top.

use super::access_mask::AccessMask;
use super::predictor::{HvDelta16x2, Predictor, Xor32VertDeltaTablePrev16};
use crate::error::Result;
use tracing::trace;

struct Stages {
    row_size: u32,
    stages: Vec<Predictor>,
    masks: Vec<AccessMask>,
}

impl Stages {
    fn new(row_size: u32, stages: Vec<Predictor>) -> Result<Self> {
        let masks = stages
            .iter()
            .map(|s| s.access_mask(row_size))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            row_size,
            stages,
            masks,
        })
    }

    /// Find the first stage after `after` matching `want` that can be moved
    /// to `after + 1`, and move it there.
    fn pull_up(&mut self, after: usize, want: impl Fn(&Predictor) -> bool) -> bool {
        let mut passed = AccessMask::new(self.row_size);
        for j in after + 1..self.stages.len() {
            if want(&self.stages[j]) && self.masks[j].can_swap_with(&passed) {
                let stage = self.stages.remove(j);
                let mask = self.masks.remove(j);
                self.stages.insert(after + 1, stage);
                self.masks.insert(after + 1, mask);
                return true;
            }
            passed.merge(&self.masks[j]);
        }
        false
    }

    /// Replace `stages[at..at + len]` with `fused`.
    fn splice(&mut self, at: usize, len: usize, fused: Predictor) -> Result<()> {
        let mask = fused.access_mask(self.row_size)?;
        trace!(stage = fused.name(), replaced = len, "fused predictor stages");
        self.stages.drain(at + 1..at + len);
        self.masks.drain(at + 1..at + len);
        self.stages[at] = fused;
        self.masks[at] = mask;
        Ok(())
    }

    fn fuse_sign_mag(&mut self, i: usize) -> Result<bool> {
        let Predictor::SignMag16(lead) = &self.stages[i] else {
            return Ok(false);
        };
        let lead = lead.clone();
        let mergeable = |p: &Predictor| match p {
            Predictor::SignMag16(other) => lead.clone().try_merge(other),
            _ => false,
        };
        if !self.pull_up(i, mergeable) {
            return Ok(false);
        }
        let Predictor::SignMag16(other) = &self.stages[i + 1] else {
            return Ok(false);
        };
        let mut merged = lead;
        merged.try_merge(other);
        self.splice(i, 2, merged.into())?;
        Ok(true)
    }

    fn fuse_hv_delta(&mut self, i: usize) -> Result<bool> {
        let Predictor::HorizDelta16(h) = &self.stages[i] else {
            return Ok(false);
        };
        let n = h.dst_offset();
        if h.pred_offset() != n.wrapping_add(2) {
            return Ok(false);
        }

        let first = |p: &Predictor| matches!(p, Predictor::VertDelta16(v) if v.offset() == n);
        if !self.pull_up(i, first) {
            return Ok(false);
        }
        let Predictor::VertDelta16(v) = &self.stages[i + 1] else {
            return Ok(false);
        };
        let bias = v.bias();

        let second = |p: &Predictor| {
            matches!(p, Predictor::VertDelta16(v) if v.offset() == n + 2 && v.bias() == bias)
        };
        if !self.pull_up(i + 1, second) {
            return Ok(false);
        }
        self.splice(i, 3, HvDelta16x2::new(n, bias).into())?;
        Ok(true)
    }

    fn fuse_xor_vert_delta(&mut self, i: usize) -> Result<bool> {
        let Predictor::Xor32TablePrev16(x) = &self.stages[i] else {
            return Ok(false);
        };
        let (value, pc) = (x.value_offset(), x.pc_offset());
        let partner =
            |p: &Predictor| matches!(p, Predictor::VertDelta8(v) if v.offset() == value && v.count() == 4);
        if !self.pull_up(i, partner) {
            return Ok(false);
        }
        self.splice(i, 2, Xor32VertDeltaTablePrev16::new(value, pc).into())?;
        Ok(true)
    }

    fn fuse_once(&mut self) -> Result<bool> {
        type Rule = fn(&mut Stages, usize) -> Result<bool>;
        const RULES: [Rule; 3] = [
            Stages::fuse_sign_mag,
            Stages::fuse_hv_delta,
            Stages::fuse_xor_vert_delta,
        ];

        for rule in RULES {
            for i in 0..self.stages.len() {
                if rule(self, i)? {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}

/// Fuse stage sequences into single-pass equivalents.
///
/// Every stage must already validate against `row_size`. The result codes
/// rows identically to the input list.
pub fn optimize_predictors(row_size: u32, stages: Vec<Predictor>) -> Result<Vec<Predictor>> {
    let before = stages.len();
    let mut stages = Stages::new(row_size, stages)?;
    while stages.fuse_once()? {}
    trace!(before, after = stages.stages.len(), "predictor fusion complete");
    Ok(stages.stages)
}

#[cfg(test)]
mod tests {
    use super::super::predictor::{
        HorizDelta16, SignMag16, VertDelta8, VertDelta16, Xor, Xor32TablePrev16,
    };
    use super::*;

    fn names(stages: &[Predictor]) -> Vec<&'static str> {
        stages.iter().map(Predictor::name).collect()
    }

    #[test]
    fn sign_mag_pair_merges() {
        let out = optimize_predictors(
            8,
            vec![SignMag16::new(2, 1).into(), SignMag16::new(0, 1).into()],
        )
        .unwrap();
        assert_eq!(out.len(), 1);
        let Predictor::SignMag16(s) = &out[0] else {
            panic!("expected sign_mag16");
        };
        assert_eq!((s.offset(), s.count()), (0, 2));
    }

    #[test]
    fn partner_moves_past_independent_stage() {
        let out = optimize_predictors(
            12,
            vec![
                HorizDelta16::new(0, 2).into(),
                VertDelta16::new(0, 2).into(),
                Xor::new(8, 4).into(),
                VertDelta16::new(2, 2).into(),
            ],
        )
        .unwrap();
        assert_eq!(names(&out), vec!["hv_delta16x2", "xor"]);
    }

    #[test]
    fn partner_blocked_by_conflicting_stage() {
        // The xor touches the second vertical field, so it cannot be passed.
        let stages: Vec<Predictor> = vec![
            HorizDelta16::new(0, 2).into(),
            VertDelta16::new(0, 2).into(),
            Xor::new(2, 2).into(),
            VertDelta16::new(2, 2).into(),
        ];
        let out = optimize_predictors(8, stages).unwrap();
        assert_eq!(out.len(), 4);
        assert!(out.iter().all(Predictor::is_persisted));
    }

    #[test]
    fn mismatched_bias_does_not_fuse() {
        let out = optimize_predictors(
            8,
            vec![
                HorizDelta16::new(0, 2).into(),
                VertDelta16::new(0, 2).into(),
                VertDelta16::new(2, 1).into(),
            ],
        )
        .unwrap();
        assert!(!names(&out).contains(&"hv_delta16x2"));
    }

    #[test]
    fn xor_table_requires_full_vert_delta() {
        let partial = optimize_predictors(
            12,
            vec![
                Xor32TablePrev16::new(4, 8).into(),
                VertDelta8::new(4, 2).into(),
            ],
        )
        .unwrap();
        assert_eq!(partial.len(), 2);

        let full = optimize_predictors(
            12,
            vec![
                Xor32TablePrev16::new(4, 8).into(),
                VertDelta8::new(4, 4).into(),
            ],
        )
        .unwrap();
        assert_eq!(names(&full), vec!["xor32_vert_delta_table_prev16"]);
    }

    #[test]
    fn invalid_input_is_reported() {
        assert!(optimize_predictors(4, vec![Xor::new(2, 4).into()]).is_err());
    }
}

//! Reversible per-field transforms applied to fixed-width rows.
//!
//! A predictor replaces a field with a residual that is usually zero or small
//! (the difference from the previous row, from another field, or from a
//! value remembered in a lookup table). Every predictor implements
//! [`RowPredictor`]; the closed set of kinds is wrapped by [`Predictor`] for
//! storage in pipelines and manifests.
//!
//! # Ordering
//!
//! A pipeline lists stages in *decode* order. Encoding runs the same stages
//! back to front, so a stage may key its prediction off a field that an
//! earlier-listed stage has already restored during decode.
//!
//! # Row buffers
//!
//! All methods take a contiguous buffer of rows and the row width. The buffer
//! length must be a multiple of the row width. Byte offsets have been checked
//! against the row width by [`RowPredictor::validate`] before any coding runs.

mod basic;
mod delta;
mod fused;
mod signmag;
mod table;

pub use basic::{EffectiveAddress, Insn, Pc, Xor};
pub use delta::{HorizDelta16, HorizDelta32, VertDelta8, VertDelta16, VertDelta32};
pub use fused::{HvDelta16x2, Xor32VertDeltaTablePrev16};
pub use signmag::{SignMag16, SignMag32};
pub use table::{Delta16TablePrev8, Delta32TablePrev8, Xor32Table8, Xor32TablePrev16};

use super::access_mask::AccessMask;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};

/// A stateful, invertible row transform.
pub trait RowPredictor {
    /// Persisted type name.
    const NAME: &'static str;

    /// Declare accessed bytes and check configuration preconditions.
    fn validate(&self, mask: &mut AccessMask) -> Result<()>;

    /// Return to stream-start state.
    fn reset(&mut self);

    /// Replace fields with residuals.
    fn encode(&mut self, rows: &mut [u8], row_size: usize);

    /// Restore fields from residuals.
    fn decode(&mut self, rows: &mut [u8], row_size: usize);
}

/// Zero-initialized lookup table of `N` entries.
#[derive(Clone)]
pub struct LookupTable<T, const N: usize>(Box<[T]>);

impl<T: Copy + Default, const N: usize> LookupTable<T, N> {
    /// Zero every entry.
    pub fn clear(&mut self) {
        self.0.fill(T::default());
    }
}

impl<T: Copy + Default, const N: usize> Default for LookupTable<T, N> {
    fn default() -> Self {
        Self(vec![T::default(); N].into_boxed_slice())
    }
}

impl<T, const N: usize> fmt::Debug for LookupTable<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LookupTable[{}]", N)
    }
}

impl<T, const N: usize> Index<usize> for LookupTable<T, N> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.0[index]
    }
}

impl<T, const N: usize> IndexMut<usize> for LookupTable<T, N> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        &mut self.0[index]
    }
}

/// Any predictor kind.
///
/// Fused kinds are produced by the optimization pass and are never written
/// to a manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Predictor {
    /// XOR with the previous row.
    Xor(Xor),
    /// XOR with the previous address, with a "no address" sentinel.
    EffectiveAddress(EffectiveAddress),
    /// Program counter delta predicted from the previous PC.
    Pc(Pc),
    /// Instruction bytes predicted from the bytes last seen at the same PC.
    Insn(Insn),
    /// 16-bit difference from another field of the same row.
    HorizDelta16(HorizDelta16),
    /// 32-bit difference from another field of the same row.
    HorizDelta32(HorizDelta32),
    /// Per-byte difference from the previous row.
    VertDelta8(VertDelta8),
    /// 16-bit difference from the previous row plus a bias.
    VertDelta16(VertDelta16),
    /// 32-bit difference from the previous row plus a bias.
    VertDelta32(VertDelta32),
    /// 16-bit delta from a table keyed by the previous row's opcode.
    Delta16TablePrev8(Delta16TablePrev8),
    /// 32-bit delta from a table keyed by the previous row's opcode.
    Delta32TablePrev8(Delta32TablePrev8),
    /// 32-bit XOR with a table keyed by a byte of the current row.
    Xor32Table8(Xor32Table8),
    /// 32-bit XOR with a table keyed by the previous row's PC.
    Xor32TablePrev16(Xor32TablePrev16),
    /// Sign-magnitude folding of 16-bit fields.
    SignMag16(SignMag16),
    /// Sign-magnitude folding of 32-bit fields.
    SignMag32(SignMag32),
    /// Fused `HorizDelta16` + two `VertDelta16`.
    #[serde(skip)]
    HvDelta16x2(HvDelta16x2),
    /// Fused `Xor32TablePrev16` + `VertDelta8`.
    #[serde(skip)]
    Xor32VertDeltaTablePrev16(Xor32VertDeltaTablePrev16),
}

macro_rules! dispatch {
    ($self:expr, $p:ident => $body:expr) => {
        match $self {
            Predictor::Xor($p) => $body,
            Predictor::EffectiveAddress($p) => $body,
            Predictor::Pc($p) => $body,
            Predictor::Insn($p) => $body,
            Predictor::HorizDelta16($p) => $body,
            Predictor::HorizDelta32($p) => $body,
            Predictor::VertDelta8($p) => $body,
            Predictor::VertDelta16($p) => $body,
            Predictor::VertDelta32($p) => $body,
            Predictor::Delta16TablePrev8($p) => $body,
            Predictor::Delta32TablePrev8($p) => $body,
            Predictor::Xor32Table8($p) => $body,
            Predictor::Xor32TablePrev16($p) => $body,
            Predictor::SignMag16($p) => $body,
            Predictor::SignMag32($p) => $body,
            Predictor::HvDelta16x2($p) => $body,
            Predictor::Xor32VertDeltaTablePrev16($p) => $body,
        }
    };
}

fn name_of<P: RowPredictor>(_: &P) -> &'static str {
    P::NAME
}

impl Predictor {
    /// Type names that may appear in a manifest.
    pub const PERSISTED_NAMES: &'static [&'static str] = &[
        Xor::NAME,
        EffectiveAddress::NAME,
        Pc::NAME,
        Insn::NAME,
        HorizDelta16::NAME,
        HorizDelta32::NAME,
        VertDelta8::NAME,
        VertDelta16::NAME,
        VertDelta32::NAME,
        Delta16TablePrev8::NAME,
        Delta32TablePrev8::NAME,
        Xor32Table8::NAME,
        Xor32TablePrev16::NAME,
        SignMag16::NAME,
        SignMag32::NAME,
    ];

    /// Type name of this predictor.
    #[must_use]
    pub fn name(&self) -> &'static str {
        dispatch!(self, p => name_of(p))
    }

    /// Check whether this predictor can be written to a manifest.
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        !matches!(
            self,
            Self::HvDelta16x2(_) | Self::Xor32VertDeltaTablePrev16(_)
        )
    }

    /// Declare accessed bytes and check preconditions.
    pub fn validate(&self, mask: &mut AccessMask) -> Result<()> {
        dispatch!(self, p => p.validate(mask))
    }

    /// Compute this predictor's access mask for rows of `row_size` bytes.
    pub fn access_mask(&self, row_size: u32) -> Result<AccessMask> {
        let mut mask = AccessMask::new(row_size);
        self.validate(&mut mask)?;
        Ok(mask)
    }

    /// Return to stream-start state.
    pub fn reset(&mut self) {
        dispatch!(self, p => p.reset())
    }

    /// Replace fields with residuals.
    pub fn encode(&mut self, rows: &mut [u8], row_size: usize) {
        dispatch!(self, p => p.encode(rows, row_size))
    }

    /// Restore fields from residuals.
    pub fn decode(&mut self, rows: &mut [u8], row_size: usize) {
        dispatch!(self, p => p.decode(rows, row_size))
    }
}

macro_rules! impl_from {
    ($($kind:ident),* $(,)?) => {
        $(
            impl From<$kind> for Predictor {
                fn from(p: $kind) -> Self {
                    Predictor::$kind(p)
                }
            }
        )*
    };
}

impl_from!(
    Xor,
    EffectiveAddress,
    Pc,
    Insn,
    HorizDelta16,
    HorizDelta32,
    VertDelta8,
    VertDelta16,
    VertDelta32,
    Delta16TablePrev8,
    Delta32TablePrev8,
    Xor32Table8,
    Xor32TablePrev16,
    SignMag16,
    SignMag32,
    HvDelta16x2,
    Xor32VertDeltaTablePrev16,
);

/// Check that two byte ranges are disjoint.
pub(crate) fn disjoint(a: u32, a_len: u32, b: u32, b_len: u32) -> bool {
    a.saturating_add(a_len) <= b || b.saturating_add(b_len) <= a
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Random rows with a bias toward small changes between rows.
    pub fn noisy_rows(row_size: usize, row_count: usize, seed: u64) -> Vec<u8> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut rows = vec![0u8; row_size * row_count];
        for r in 0..row_count {
            for b in 0..row_size {
                let prev = if r > 0 { rows[(r - 1) * row_size + b] } else { 0 };
                rows[r * row_size + b] = if rng.gen_bool(0.7) {
                    prev.wrapping_add(rng.gen_range(0..3))
                } else {
                    rng.r#gen()
                };
            }
        }
        rows
    }

    /// Encode then decode with fresh state and assert the rows survive.
    pub fn assert_round_trip(mut predictor: Predictor, rows: &[u8], row_size: usize) {
        predictor
            .access_mask(row_size as u32)
            .expect("predictor must validate");

        let mut buf = rows.to_vec();
        predictor.reset();
        predictor.encode(&mut buf, row_size);

        predictor.reset();
        predictor.decode(&mut buf, row_size);
        assert_eq!(buf, rows, "{} did not round-trip", predictor.name());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_snake_case_tags() {
        let p = Predictor::from(Xor::new(10, 2));
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["type"], "xor");
        assert_eq!(json["offset"], 10);
        assert_eq!(json["size"], 2);

        let p = Predictor::from(Xor32TablePrev16::new(4, 8));
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["type"], Xor32TablePrev16::NAME);
    }

    #[test]
    fn persisted_names_match_serde_tags() {
        for name in Predictor::PERSISTED_NAMES {
            let json = serde_json::json!({ "type": name });
            // Missing fields are fine to reject, but the tag itself must be known.
            let err = serde_json::from_value::<Predictor>(json).err();
            if let Some(err) = err {
                assert!(
                    !err.to_string().contains("unknown variant"),
                    "{} is not a serde tag",
                    name
                );
            }
        }
    }

    #[test]
    fn fused_kinds_are_not_persisted() {
        let fused = Predictor::from(HvDelta16x2::new(0, 2));
        assert!(!fused.is_persisted());
        assert!(serde_json::to_value(&fused).is_err());
        assert!(Predictor::from(Pc::new(8)).is_persisted());
    }

    #[test]
    fn deserialized_tables_are_usable() {
        let json = serde_json::json!({ "type": "pc", "offset": 0 });
        let mut p: Predictor = serde_json::from_value(json).unwrap();
        let mut rows = vec![0x00, 0x20, 0x03, 0x20];
        p.reset();
        p.encode(&mut rows, 2);
        p.reset();
        p.decode(&mut rows, 2);
        assert_eq!(rows, vec![0x00, 0x20, 0x03, 0x20]);
    }

    #[test]
    fn disjoint_ranges() {
        assert!(disjoint(0, 2, 2, 2));
        assert!(disjoint(4, 4, 0, 4));
        assert!(!disjoint(0, 4, 3, 1));
        assert!(!disjoint(8, 2, 7, 2));
    }
}

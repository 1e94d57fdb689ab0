//! Column layout of a persisted trace row.

use crate::error::{Result, TraceError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest row width a schema may declare.
pub const MAX_SCHEMA_ROW_SIZE: u32 = 4096;

/// The fields a column can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    /// Padding or predictor-owned bits.
    None,
    /// Accumulator.
    A,
    /// X index register.
    X,
    /// Y index register.
    Y,
    /// Stack pointer.
    S,
    /// Processor status.
    P,
    /// Program counter.
    Pc,
    /// Instruction bytes.
    Opcode,
    /// Cycle counter.
    Cycle,
    /// Cycles the CPU was not halted.
    UnhaltedCycle,
    /// IRQ line.
    Irq,
    /// NMI line.
    Nmi,
    /// Effective address of the memory operand.
    EffectiveAddress,
    /// Bank base added to the PC.
    GlobalPcBase,
}

impl ColumnKind {
    /// Every kind, in declaration order.
    pub const ALL: [ColumnKind; 14] = [
        Self::None,
        Self::A,
        Self::X,
        Self::Y,
        Self::S,
        Self::P,
        Self::Pc,
        Self::Opcode,
        Self::Cycle,
        Self::UnhaltedCycle,
        Self::Irq,
        Self::Nmi,
        Self::EffectiveAddress,
        Self::GlobalPcBase,
    ];

    /// Persisted type name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::A => "a",
            Self::X => "x",
            Self::Y => "y",
            Self::S => "s",
            Self::P => "p",
            Self::Pc => "pc",
            Self::Opcode => "opcode",
            Self::Cycle => "cycle",
            Self::UnhaltedCycle => "unhalted_cycle",
            Self::Irq => "irq",
            Self::Nmi => "nmi",
            Self::EffectiveAddress => "effective_address",
            Self::GlobalPcBase => "global_pc_base",
        }
    }

    /// Look up a kind by its persisted name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    /// Whether the column may start or end inside a byte.
    #[must_use]
    pub fn is_bit_field(self) -> bool {
        matches!(self, Self::None | Self::Irq | Self::Nmi)
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One field of a row, addressed in bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// What the column carries.
    #[serde(rename = "type")]
    pub kind: ColumnKind,
    /// First bit of the column.
    pub bit_offset: u32,
    /// Width in bits.
    pub bit_width: u32,
}

impl Column {
    /// Create a column.
    #[must_use]
    pub const fn new(kind: ColumnKind, bit_offset: u32, bit_width: u32) -> Self {
        Self {
            kind,
            bit_offset,
            bit_width,
        }
    }

    /// First byte of a byte-aligned column.
    #[must_use]
    pub fn byte_offset(&self) -> usize {
        (self.bit_offset / 8) as usize
    }

    /// Width in bytes of a byte-aligned column.
    #[must_use]
    pub fn byte_width(&self) -> usize {
        (self.bit_width / 8) as usize
    }

    fn bit_end(&self) -> u64 {
        u64::from(self.bit_offset) + u64::from(self.bit_width)
    }
}

/// A validated column layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowSchema {
    row_size: u32,
    columns: Vec<Column>,
}

impl RowSchema {
    /// Validate `columns` against rows of `row_size` bytes.
    pub fn new(row_size: u32, columns: Vec<Column>) -> Result<Self> {
        if row_size == 0 {
            return Err(TraceError::RowGeometry {
                cause: "row size is zero".to_string(),
            });
        }
        if row_size > MAX_SCHEMA_ROW_SIZE {
            return Err(TraceError::UnsupportedGeometry {
                cause: format!(
                    "row size {} exceeds {} bytes",
                    row_size, MAX_SCHEMA_ROW_SIZE
                ),
            });
        }
        if columns.is_empty() {
            return Err(TraceError::RowGeometry {
                cause: "schema has no columns".to_string(),
            });
        }

        let row_bits = u64::from(row_size) * 8;
        let mut next_free = 0u64;
        for (index, column) in columns.iter().enumerate() {
            let reject = |cause: String| TraceError::ColumnLayout { index, cause };

            if column.bit_width == 0 {
                return Err(reject(format!("{} has zero width", column.kind)));
            }
            if u64::from(column.bit_offset) < next_free {
                return Err(reject(format!(
                    "{} at bit {} overlaps or precedes the previous column",
                    column.kind, column.bit_offset
                )));
            }
            if column.bit_end() > row_bits {
                return Err(reject(format!(
                    "{} ends at bit {}, past the {}-bit row",
                    column.kind,
                    column.bit_end(),
                    row_bits
                )));
            }
            if !column.kind.is_bit_field() && (column.bit_offset % 8 != 0 || column.bit_width % 8 != 0)
            {
                return Err(reject(format!("{} is not byte aligned", column.kind)));
            }
            next_free = column.bit_end();
        }

        Ok(Self { row_size, columns })
    }

    /// The 24-byte layout written by the save path.
    #[must_use]
    pub fn standard() -> Self {
        use ColumnKind::*;
        Self {
            row_size: 24,
            columns: vec![
                Column::new(Cycle, 0, 16),
                Column::new(UnhaltedCycle, 16, 16),
                Column::new(A, 32, 8),
                Column::new(X, 40, 8),
                Column::new(Y, 48, 8),
                Column::new(S, 56, 8),
                Column::new(Pc, 64, 16),
                Column::new(P, 80, 8),
                Column::new(Irq, 88, 1),
                Column::new(Nmi, 89, 1),
                Column::new(None, 92, 4),
                Column::new(EffectiveAddress, 96, 32),
                Column::new(Opcode, 128, 32),
                Column::new(GlobalPcBase, 160, 32),
            ],
        }
    }

    /// Row width in bytes.
    #[must_use]
    pub fn row_size(&self) -> u32 {
        self.row_size
    }

    /// Columns in ascending bit order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// The first column of `kind`, if present.
    #[must_use]
    pub fn column(&self, kind: ColumnKind) -> Option<&Column> {
        self.columns.iter().find(|c| c.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ColumnKind::*;

    #[test]
    fn standard_schema_validates() {
        let standard = RowSchema::standard();
        let rebuilt = RowSchema::new(24, standard.columns().to_vec()).unwrap();
        assert_eq!(rebuilt, standard);
        assert_eq!(standard.column(Pc).unwrap().byte_offset(), 8);
        assert_eq!(standard.column(Opcode).unwrap().byte_width(), 4);
    }

    #[test]
    fn geometry_errors() {
        let cols = vec![Column::new(A, 0, 8)];
        assert!(RowSchema::new(0, cols.clone()).unwrap_err().is_invalid());
        assert!(RowSchema::new(4097, cols).unwrap_err().is_unsupported());
        assert!(RowSchema::new(4, vec![]).unwrap_err().is_invalid());
    }

    #[test]
    fn column_errors() {
        let bad = [
            vec![Column::new(A, 0, 0)],
            vec![Column::new(A, 8, 8), Column::new(X, 0, 8)],
            vec![Column::new(A, 0, 16), Column::new(X, 8, 8)],
            vec![Column::new(Opcode, 0, 40)],
            vec![Column::new(Pc, 4, 16)],
            vec![Column::new(Pc, 0, 12)],
        ];
        for columns in bad {
            let err = RowSchema::new(4, columns.clone()).unwrap_err();
            assert!(err.is_invalid(), "{:?} accepted", columns);
            assert_eq!(err.code(), "E002");
        }
    }

    #[test]
    fn bit_fields_and_gaps_are_allowed() {
        let schema = RowSchema::new(
            4,
            vec![
                Column::new(Irq, 3, 1),
                Column::new(Nmi, 4, 2),
                Column::new(A, 16, 8),
            ],
        );
        assert!(schema.is_ok());
    }

    #[test]
    fn names_round_trip() {
        for kind in ColumnKind::ALL {
            assert_eq!(ColumnKind::from_name(kind.name()), Some(kind));
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, kind.name());
        }
        assert_eq!(ColumnKind::from_name("carry"), Option::None);
    }
}

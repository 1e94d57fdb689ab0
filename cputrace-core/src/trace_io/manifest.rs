//! The self-describing JSON manifest of a CPU history trace.

use crate::error::{Result, TraceError};
use crate::format::{Codec, Column, ColumnKind, Predictor};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Describes how the blocks of a trace are laid out and coded.
#[derive(Debug, Clone, Serialize)]
pub struct TraceManifest {
    /// Channel name.
    pub channel: String,
    /// Total rows.
    pub row_count: u32,
    /// Rows per block; the last block may be short.
    pub row_group_size: u32,
    /// Row width in bytes.
    pub byte_count: u32,
    /// Block codec.
    pub codec: Codec,
    /// Row layout.
    pub columns: Vec<Column>,
    /// Predictors in decode order.
    pub predictors: Vec<Predictor>,
    /// Seconds per tick.
    pub tick_scale: f64,
}

fn invalid(cause: impl Into<String>) -> TraceError {
    TraceError::Manifest {
        cause: cause.into(),
    }
}

fn field<'a>(object: &'a serde_json::Map<String, Value>, name: &str) -> Result<&'a Value> {
    object
        .get(name)
        .ok_or_else(|| invalid(format!("missing field '{}'", name)))
}

fn parse<T: DeserializeOwned>(value: &Value, what: &str) -> Result<T> {
    serde_json::from_value(value.clone()).map_err(|e| invalid(format!("{}: {}", what, e)))
}

/// The `type` tag of a tagged object.
fn type_name<'a>(value: &'a Value, what: &str) -> Result<&'a str> {
    value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid(format!("{} has no type", what)))
}

fn array<'a>(object: &'a serde_json::Map<String, Value>, name: &str) -> Result<&'a [Value]> {
    field(object, name)?
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| invalid(format!("'{}' is not an array", name)))
}

impl TraceManifest {
    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| TraceError::Serialization(e.to_string()))
    }

    /// Parse a manifest.
    ///
    /// Type names this build does not know are reported as unsupported before
    /// any field is decoded; structural problems are invalid.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let root: Value = serde_json::from_slice(bytes).map_err(|e| invalid(e.to_string()))?;
        let object = root
            .as_object()
            .ok_or_else(|| invalid("manifest is not an object"))?;

        let codec = match object.get("codec") {
            None | Some(Value::Null) => return Err(TraceError::MissingCodec),
            Some(codec) => {
                let name = type_name(codec, "codec")?;
                if !Codec::PERSISTED_NAMES.contains(&name) {
                    return Err(TraceError::UnsupportedType {
                        kind: "codec",
                        name: name.to_string(),
                    });
                }
                parse::<Codec>(codec, "codec")?
            }
        };

        let mut columns = Vec::new();
        for (i, column) in array(object, "columns")?.iter().enumerate() {
            let name = type_name(column, "column")?;
            if ColumnKind::from_name(name).is_none() {
                return Err(TraceError::UnsupportedType {
                    kind: "column",
                    name: name.to_string(),
                });
            }
            columns.push(parse::<Column>(column, &format!("column {}", i))?);
        }

        let mut predictors = Vec::new();
        for (i, predictor) in array(object, "predictors")?.iter().enumerate() {
            let name = type_name(predictor, "predictor")?;
            if !Predictor::PERSISTED_NAMES.contains(&name) {
                return Err(TraceError::UnsupportedType {
                    kind: "predictor",
                    name: name.to_string(),
                });
            }
            predictors.push(parse::<Predictor>(predictor, &format!("predictor {}", i))?);
        }

        Ok(Self {
            channel: parse(field(object, "channel")?, "channel")?,
            row_count: parse(field(object, "row_count")?, "row_count")?,
            row_group_size: parse(field(object, "row_group_size")?, "row_group_size")?,
            byte_count: parse(field(object, "byte_count")?, "byte_count")?,
            codec,
            columns,
            predictors,
            tick_scale: parse(field(object, "tick_scale")?, "tick_scale")?,
        })
    }

    /// Blocks implied by the row count and group size.
    pub fn expected_blocks(&self) -> u32 {
        if self.row_count == 0 || self.row_group_size == 0 {
            0
        } else {
            self.row_count.div_ceil(self.row_group_size)
        }
    }
}

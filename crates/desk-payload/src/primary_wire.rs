//! Primary (structured binary) encoding.
//!
//! bincode with varint integers, trailing bytes rejected and a hard size limit.
//! The format is not self-describing, so `DynamicValue` travels as the tagged
//! `WireValue` mirror and typed records use their own serde derives.
//!
//! The serde path recurses once per nesting level, so nesting is bounded at
//! [`MAX_NESTING_DEPTH`] in both directions. Incoming bytes are walked by a
//! non-recursive scanner before bincode sees them.

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::dynamic_value::{DynamicNumber, DynamicValue, MAX_NESTING_DEPTH};

/// Upper bound on primary payload size, applied to both directions.
pub const PRIMARY_PAYLOAD_LIMIT_BYTES: u64 = 8 * 1024 * 1024;

fn wire_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_limit(PRIMARY_PAYLOAD_LIMIT_BYTES)
        .reject_trailing_bytes()
}

#[derive(Debug, Serialize, Deserialize)]
enum WireValue {
    Null,
    Bool(bool),
    PosInt(u64),
    NegInt(i64),
    Float(f64),
    String(String),
    List(Vec<WireValue>),
    Map(Vec<(String, WireValue)>),
}

impl From<&DynamicValue> for WireValue {
    fn from(value: &DynamicValue) -> Self {
        match value {
            DynamicValue::Null => Self::Null,
            DynamicValue::Bool(flag) => Self::Bool(*flag),
            DynamicValue::Number(DynamicNumber::PosInt(value)) => Self::PosInt(*value),
            DynamicValue::Number(DynamicNumber::NegInt(value)) => Self::NegInt(*value),
            DynamicValue::Number(DynamicNumber::Float(value)) => Self::Float(*value),
            DynamicValue::String(text) => Self::String(text.clone()),
            DynamicValue::List(items) => Self::List(items.iter().map(Self::from).collect()),
            DynamicValue::Map(entries) => Self::Map(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), Self::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<WireValue> for DynamicValue {
    fn from(value: WireValue) -> Self {
        match value {
            WireValue::Null => Self::Null,
            WireValue::Bool(flag) => Self::Bool(flag),
            WireValue::PosInt(value) => Self::Number(DynamicNumber::PosInt(value)),
            WireValue::NegInt(value) => Self::Number(DynamicNumber::from_i64(value)),
            WireValue::Float(value) => Self::Number(DynamicNumber::Float(value)),
            WireValue::String(text) => Self::String(text),
            WireValue::List(items) => Self::List(items.into_iter().map(Self::from).collect()),
            WireValue::Map(entries) => Self::Map(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, Self::from(value)))
                    .collect(),
            ),
        }
    }
}

const STRING_VARIANT: u64 = 5;
const LIST_VARIANT: u64 = 6;
const MAP_VARIANT: u64 = 7;

fn wire_error(message: String) -> bincode::Error {
    Box::new(bincode::ErrorKind::Custom(message))
}

/// Forward-only reader over the bincode varint stream.
struct WireScanner<'a> {
    bytes: &'a [u8],
}

impl<'a> WireScanner<'a> {
    fn take(&mut self, len: u64) -> Option<&'a [u8]> {
        let len = usize::try_from(len).ok()?;
        if len > self.bytes.len() {
            return None;
        }
        let (head, rest) = self.bytes.split_at(len);
        self.bytes = rest;
        Some(head)
    }

    fn varint(&mut self) -> Option<u64> {
        let (&marker, rest) = self.bytes.split_first()?;
        self.bytes = rest;
        match marker {
            0..=250 => Some(u64::from(marker)),
            251 => self
                .take(2)
                .and_then(|raw| raw.try_into().ok())
                .map(|raw| u64::from(u16::from_le_bytes(raw))),
            252 => self
                .take(4)
                .and_then(|raw| raw.try_into().ok())
                .map(|raw| u64::from(u32::from_le_bytes(raw))),
            253 => self
                .take(8)
                .and_then(|raw| raw.try_into().ok())
                .map(u64::from_le_bytes),
            _ => None,
        }
    }

    fn skip_string(&mut self) -> Option<()> {
        let len = self.varint()?;
        self.take(len).map(|_| ())
    }
}

struct OpenContainer {
    remaining: u64,
    keyed: bool,
}

/// Walks an encoded `WireValue` with an explicit stack and fails once nesting
/// exceeds `max_depth`. Anything the scanner cannot follow is rejected too;
/// bincode would refuse it anyway.
fn check_wire_depth(bytes: &[u8], max_depth: usize) -> Result<(), String> {
    let mut scanner = WireScanner { bytes };
    let mut open: Vec<OpenContainer> = Vec::new();
    loop {
        if open.last().is_some_and(|container| container.keyed) {
            scanner.skip_string().ok_or("truncated map key")?;
        }
        let variant = scanner.varint().ok_or("truncated value tag")?;
        match variant {
            0 => {}
            1 => {
                scanner.take(1).ok_or("truncated bool")?;
            }
            2 | 3 => {
                scanner.varint().ok_or("truncated integer")?;
            }
            4 => {
                scanner.take(8).ok_or("truncated float")?;
            }
            STRING_VARIANT => {
                scanner.skip_string().ok_or("truncated string")?;
            }
            LIST_VARIANT | MAP_VARIANT => {
                if open.len() >= max_depth {
                    return Err(format!(
                        "primary payload nests deeper than {max_depth} levels"
                    ));
                }
                let len = scanner.varint().ok_or("truncated container length")?;
                if len > 0 {
                    open.push(OpenContainer {
                        remaining: len,
                        keyed: variant == MAP_VARIANT,
                    });
                    continue;
                }
            }
            other => return Err(format!("unknown primary value tag {other}")),
        }

        // One value finished; close every container it completes.
        loop {
            let Some(container) = open.last_mut() else {
                return Ok(());
            };
            container.remaining -= 1;
            if container.remaining > 0 {
                break;
            }
            open.pop();
        }
    }
}

/// Encodes a dynamic value in the primary format.
pub fn encode_dynamic(value: &DynamicValue) -> Result<Vec<u8>, bincode::Error> {
    let depth = value.depth();
    if depth > MAX_NESTING_DEPTH {
        return Err(wire_error(format!(
            "value nests {depth} levels, limit is {MAX_NESTING_DEPTH}"
        )));
    }
    wire_options().serialize(&WireValue::from(value))
}

/// Decodes a dynamic value from the primary format.
pub fn decode_dynamic(bytes: &[u8]) -> Result<DynamicValue, bincode::Error> {
    check_wire_depth(bytes, MAX_NESTING_DEPTH).map_err(wire_error)?;
    wire_options()
        .deserialize::<WireValue>(bytes)
        .map(DynamicValue::from)
}

/// Encodes a typed record in the primary format.
pub fn encode_typed<T: Serialize>(value: &T) -> Result<Vec<u8>, bincode::Error> {
    wire_options().serialize(value)
}

/// Decodes a typed record from the primary format.
pub fn decode_typed<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, bincode::Error> {
    wire_options().deserialize::<T>(bytes)
}

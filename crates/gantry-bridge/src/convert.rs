//! Bounded conversion of managed input into engine input
//!
//! The managed side hands `run` an input map living in its own heap; the
//! engine wants a self-contained [`InputValue`] tree. Conversion walks the
//! managed structure under the caller's [`Limits`]: nesting beyond
//! `max_depth` converts as an empty container, the total node count is
//! capped by `max_elements` (excess children are dropped), and strings are
//! truncated to `max_string_size` bytes on a character boundary.
//!
//! Every managed reference touched during the walk is transient and is
//! released before the conversion returns.

use crate::error::BridgeResult;
use crate::input::InputValue;
use crate::limits::Limits;
use gantry_core::{HeapKind, Runtime, Value, VmException};

/// Convert a managed value into the engine's input representation.
pub fn to_engine_input(rt: &Runtime, value: Value, limits: &Limits) -> BridgeResult<InputValue> {
    // All references registered while walking the structure die with this
    // frame; only plain data crosses to the engine.
    let _frame = rt.push_local_frame();
    let mut budget = limits.max_elements;
    let converted = convert_value(rt, value, limits, 0, &mut budget)?;
    Ok(converted.unwrap_or(InputValue::Null))
}

/// One node. `None` means the element budget was exhausted and the node
/// (and its subtree) was dropped.
fn convert_value(
    rt: &Runtime,
    value: Value,
    limits: &Limits,
    depth: usize,
    budget: &mut usize,
) -> Result<Option<InputValue>, VmException> {
    if *budget == 0 {
        return Ok(None);
    }
    *budget -= 1;

    let converted = match value {
        Value::Null => InputValue::Null,
        Value::Bool(b) => InputValue::Bool(b),
        Value::I32(i) => InputValue::I64(i64::from(i)),
        Value::I64(i) => InputValue::I64(i),
        Value::F64(f) => InputValue::F64(f),
        Value::Obj(r) => match rt.heap_kind(r)? {
            HeapKind::Str => {
                InputValue::Str(truncate(&rt.string_value(r)?, limits.max_string_size))
            }
            HeapKind::Array => {
                let mut items = Vec::new();
                if depth < limits.max_depth {
                    for element in rt.array_values(r)? {
                        match convert_value(rt, element, limits, depth + 1, budget)? {
                            Some(item) => items.push(item),
                            None => break,
                        }
                    }
                }
                InputValue::Array(items)
            }
            HeapKind::Map => {
                let mut entries = Vec::new();
                if depth < limits.max_depth {
                    for (key, element) in rt.map_entries(r)? {
                        let key = map_key(rt, key, limits)?;
                        match convert_value(rt, element, limits, depth + 1, budget)? {
                            Some(item) => entries.push((key, item)),
                            None => break,
                        }
                    }
                }
                InputValue::Map(entries)
            }
            // Opaque managed objects have no engine representation
            HeapKind::Instance | HeapKind::Class => InputValue::Null,
        },
    };
    Ok(Some(converted))
}

fn map_key(rt: &Runtime, key: Value, limits: &Limits) -> Result<String, VmException> {
    match key {
        Value::Obj(r) => match rt.heap_kind(r)? {
            HeapKind::Str => Ok(truncate(&rt.string_value(r)?, limits.max_string_size)),
            _ => Err(VmException::new(
                gantry_core::well_known::STATE_ERROR,
                "input map key is not a string",
            )),
        },
        Value::Null => Ok("null".to_string()),
        other => Ok(other.to_string()),
    }
}

fn truncate(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

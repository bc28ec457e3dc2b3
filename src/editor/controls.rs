//! Control inference for parameter specs.
//!
//! The graph server describes parameters by shape only:
//!
//! - a list containing anything that is not a number -> choose one option
//! - `[default, min, max, step]`, all numbers -> stepped range
//! - a boolean -> flag
//!
//! Every other shape is reported as unsupported rather than skipped.

use serde_json::{json, Value};
use std::fmt;

use crate::models::editor::ControlWidget;

#[derive(Clone, Debug, PartialEq)]
pub enum ControlKind {
    Enum {
        options: Vec<Value>,
    },
    Range {
        default: f64,
        min: f64,
        max: f64,
        step: f64,
        /// All four spec numbers were JSON integers; writes stay integers.
        integral: bool,
    },
    Boolean,
}

impl ControlKind {
    pub fn widget(&self) -> ControlWidget {
        match self {
            ControlKind::Enum { options } => ControlWidget::Dropdown {
                options: options.clone(),
            },
            ControlKind::Range { min, max, step, .. } => ControlWidget::Slider {
                min: *min,
                max: *max,
                step: *step,
            },
            ControlKind::Boolean => ControlWidget::Checkbox,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum UnsupportedShape {
    /// All-numeric list that is not a 4-tuple.
    NumericArity(usize),
    InvalidRange { min: f64, max: f64, step: f64 },
    /// A scalar other than a boolean (JSON type name).
    Scalar(&'static str),
}

impl fmt::Display for UnsupportedShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnsupportedShape::NumericArity(len) => write!(
                f,
                "numeric list of length {} (expected [default, min, max, step])",
                len
            ),
            UnsupportedShape::InvalidRange { min, max, step } => write!(
                f,
                "invalid range min={} max={} step={}",
                min, max, step
            ),
            UnsupportedShape::Scalar(kind) => write!(f, "plain {} value", kind),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct UnsupportedSchemaError {
    pub parameter: String,
    pub shape: UnsupportedShape,
}

impl fmt::Display for UnsupportedSchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Parameter '{}' has an unsupported schema: {}",
            self.parameter, self.shape
        )
    }
}

impl std::error::Error for UnsupportedSchemaError {}

/// Infer the control for a raw spec descriptor.
pub fn classify(spec: &Value) -> Result<ControlKind, UnsupportedShape> {
    match spec {
        Value::Array(items) if items.iter().all(Value::is_number) => {
            let [default, min, max, step] = items.as_slice() else {
                return Err(UnsupportedShape::NumericArity(items.len()));
            };
            let integral = items.iter().all(|v| v.is_i64() || v.is_u64());
            let (default, min, max, step) =
                (number(default), number(min), number(max), number(step));

            let well_formed = min.is_finite()
                && max.is_finite()
                && step.is_finite()
                && step > 0.0
                && min <= max;
            if !well_formed {
                return Err(UnsupportedShape::InvalidRange { min, max, step });
            }

            Ok(ControlKind::Range {
                default,
                min,
                max,
                step,
                integral,
            })
        }
        Value::Array(items) => Ok(ControlKind::Enum {
            options: items.clone(),
        }),
        Value::Bool(_) => Ok(ControlKind::Boolean),
        other => Err(UnsupportedShape::Scalar(json_type(other))),
    }
}

pub fn classify_parameter(name: &str, spec: &Value) -> Result<ControlKind, UnsupportedSchemaError> {
    classify(spec).map_err(|shape| UnsupportedSchemaError {
        parameter: name.to_string(),
        shape,
    })
}

/// Clamp into `[min, max]` and snap to the nearest `min + k * step`.
///
/// `min <= max` and `step > 0` must hold.
pub fn quantize(value: f64, min: f64, max: f64, step: f64) -> f64 {
    let clamped = value.clamp(min, max);
    let mut steps = ((clamped - min) / step).round();
    if min + steps * step > max + step * 1e-9 {
        steps -= 1.0;
    }

    let snapped = min + steps * step;
    // shed float noise; grids finer than 12 places are left as computed
    let precision = decimals(min).max(decimals(step));
    let snapped = if precision <= 12 {
        let factor = 10f64.powi(precision);
        (snapped * factor).round() / factor
    } else {
        snapped
    };
    snapped.clamp(min, max)
}

/// JSON value for a quantized range write.
pub(crate) fn range_value(value: f64, integral: bool) -> Value {
    if integral {
        json!(value.round() as i64)
    } else {
        json!(value)
    }
}

/// Equality that treats `1` and `1.0` as the same option.
pub(crate) fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn number(value: &Value) -> f64 {
    value.as_f64().unwrap_or(f64::NAN)
}

fn decimals(x: f64) -> i32 {
    let text = x.abs().to_string();
    text.split_once('.')
        .map(|(_, fraction)| fraction.len() as i32)
        .unwrap_or(0)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

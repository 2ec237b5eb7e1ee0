//! Recursive encoder from boxed values to script literal syntax

use crate::core::Value;

/// Encode `value` as a script expression.
///
/// Mirrors and native proxies become their namespace path. Opaque values have no
/// script form and degrade to a quoted description.
pub fn serialize(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

/// Comma-separated argument list, without the parentheses
pub fn serialize_args(args: &[Value]) -> String {
    let mut out = String::new();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_value(&mut out, arg);
    }
    out
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Undefined => out.push_str("undefined"),
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Int(n) => out.push_str(&n.to_string()),
        Value::UInt(n) => out.push_str(&n.to_string()),
        Value::Float(x) => write_number(out, *x),
        Value::String(s) => write_string(out, s),
        Value::Date(ms) => {
            out.push_str("(new Date(");
            write_number(out, *ms);
            out.push_str("))");
        }
        Value::Array(items) => {
            out.push('[');
            out.push_str(&serialize_args(items));
            out.push(']');
        }
        Value::Object(map) => {
            out.push('{');
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_string(out, key);
                out.push_str(": ");
                write_value(out, item);
            }
            out.push('}');
        }
        Value::Mirror(mirror) => out.push_str(mirror.namespace()),
        Value::Native(proxy) => out.push_str(proxy.namespace()),
        Value::Opaque(description) => write_string(out, description),
    }
}

fn write_number(out: &mut String, x: f64) {
    if x.is_nan() {
        out.push_str("NaN");
    } else if x.is_infinite() {
        out.push_str(if x > 0.0 { "Infinity" } else { "-Infinity" });
    } else {
        out.push_str(&x.to_string());
    }
}

fn write_string(out: &mut String, s: &str) {
    match serde_json::to_string(s) {
        Ok(quoted) => out.push_str(&quoted),
        // Serializing a str cannot fail; keep a valid literal anyway
        Err(_) => out.push_str("''"),
    }
}

//! Wire shape of script → native messages

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Opcode {
    /// `"-"`: release an instance, or the whole channel for target 0
    Release,
    /// `"+"`: construct an instance under the target id
    Create,
    /// Any other opcode names a member of the capability table
    Member(String),
}

impl Opcode {
    pub fn parse(opcode: &str) -> Self {
        match opcode {
            "-" => Self::Release,
            "+" => Self::Create,
            name => Self::Member(name.to_string()),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct Wire {
    #[serde(rename = "$opcode")]
    opcode: String,
    #[serde(rename = "$target", default)]
    target: Option<serde_json::Value>,
    #[serde(rename = "$operand", default)]
    operand: Option<serde_json::Value>,
}

/// A decoded protocol record
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub opcode: Opcode,
    /// Instance id; 0 (the principal) when absent
    pub target: i64,
    pub operand: Option<serde_json::Value>,
}

impl Message {
    /// Decode a posted body; `None` if it is not a protocol record
    pub fn decode(body: &serde_json::Value) -> Option<Self> {
        let wire = Wire::deserialize(body).ok()?;
        let target = wire
            .target
            .as_ref()
            .and_then(|t| t.as_i64().or_else(|| t.as_f64().map(|f| f as i64)))
            .unwrap_or(0);
        Some(Self { opcode: Opcode::parse(&wire.opcode), target, operand: wire.operand })
    }

    /// Operand as a method argument list: absent or null is empty, a non-sequence is `None`
    pub fn arguments(&self) -> Option<&[serde_json::Value]> {
        match &self.operand {
            None | Some(serde_json::Value::Null) => Some(&[]),
            Some(serde_json::Value::Array(items)) => Some(items),
            Some(_) => None,
        }
    }
}

//! Typed shapes of the JSON-RPC responses the pipeline reads
//!
//! Only the fields we use are modelled; everything optional upstream has an
//! explicit default here.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Entry of `getSignaturesForAddress`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureInfo {
    pub signature: String,
    #[serde(default)]
    pub slot: u64,
    #[serde(default)]
    pub err: Option<Value>,
    #[serde(default)]
    pub memo: Option<String>,
    #[serde(default)]
    pub block_time: Option<i64>,
    #[serde(default)]
    pub confirmation_status: Option<String>,
}

impl SignatureInfo {
    pub fn is_failed(&self) -> bool {
        matches!(&self.err, Some(v) if !v.is_null())
    }
}

/// `getTransaction` with `jsonParsed` encoding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedTransaction {
    #[serde(default)]
    pub slot: u64,
    #[serde(default)]
    pub block_time: Option<i64>,
    #[serde(default)]
    pub meta: Option<TransactionMeta>,
    pub transaction: TransactionEnvelope,
}

impl ParsedTransaction {
    pub fn is_failed(&self) -> bool {
        self.meta
            .as_ref()
            .map(|m| matches!(&m.err, Some(v) if !v.is_null()))
            .unwrap_or(false)
    }

    pub fn top_level_instructions(&self) -> &[Instruction] {
        &self.transaction.message.instructions
    }

    /// Inner instructions flattened in execution order
    pub fn inner_instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.meta
            .iter()
            .flat_map(|m| m.inner_instructions.iter().flatten())
            .flat_map(|group| group.instructions.iter())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMeta {
    #[serde(default)]
    pub err: Option<Value>,
    #[serde(default)]
    pub inner_instructions: Option<Vec<InnerInstructions>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InnerInstructions {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub instructions: Vec<Instruction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionEnvelope {
    #[serde(default)]
    pub signatures: Vec<String>,
    #[serde(default)]
    pub message: ParsedMessage,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedMessage {
    #[serde(default)]
    pub instructions: Vec<Instruction>,
}

/// An instruction is either decoded by the node (`parsed`) or left raw
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Instruction {
    Parsed(ParsedInstruction),
    Raw(RawInstruction),
}

impl Instruction {
    pub fn as_parsed(&self) -> Option<&ParsedInstruction> {
        match self {
            Instruction::Parsed(p) => Some(p),
            Instruction::Raw(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedInstruction {
    #[serde(default)]
    pub program: String,
    #[serde(default)]
    pub program_id: String,
    pub parsed: ParsedBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawInstruction {
    #[serde(default)]
    pub program_id: String,
    #[serde(default)]
    pub accounts: Vec<String>,
    #[serde(default)]
    pub data: String,
}

/// `parsed` is usually `{type, info}`, but some programs (memo) emit a string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParsedBody {
    Typed {
        #[serde(rename = "type")]
        kind: String,
        #[serde(default)]
        info: Map<String, Value>,
    },
    Text(String),
    Other(Value),
}

impl ParsedInstruction {
    pub fn kind(&self) -> Option<&str> {
        match &self.parsed {
            ParsedBody::Typed { kind, .. } => Some(kind.as_str()),
            _ => None,
        }
    }

    fn info(&self) -> Option<&Map<String, Value>> {
        match &self.parsed {
            ParsedBody::Typed { info, .. } => Some(info),
            _ => None,
        }
    }

    pub fn info_str(&self, key: &str) -> Option<&str> {
        self.info()?.get(key)?.as_str()
    }

    /// Raw integer amount from `amount` or `tokenAmount.amount`
    pub fn raw_amount(&self) -> Option<u64> {
        let info = self.info()?;
        let value = info
            .get("amount")
            .or_else(|| info.get("tokenAmount").and_then(|t| t.get("amount")))?;
        match value {
            Value::String(s) => s.parse::<u64>().ok(),
            Value::Number(n) => n.as_u64(),
            _ => None,
        }
    }

    /// Decimals reported by checked instructions (`tokenAmount.decimals`)
    pub fn reported_decimals(&self) -> Option<u8> {
        let info = self.info()?;
        info.get("tokenAmount")
            .and_then(|t| t.get("decimals"))
            .or_else(|| info.get("decimals"))
            .and_then(|d| d.as_u64())
            .and_then(|d| u8::try_from(d).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_signature_info_defaults() {
        let info: SignatureInfo = serde_json::from_value(json!({
            "signature": "abc",
            "slot": 5,
            "err": null,
            "blockTime": 1_700_000_000
        }))
        .unwrap();
        assert!(!info.is_failed());
        assert_eq!(info.block_time, Some(1_700_000_000));

        let failed: SignatureInfo = serde_json::from_value(json!({
            "signature": "def",
            "err": {"InstructionError": [0, "Custom"]}
        }))
        .unwrap();
        assert!(failed.is_failed());
        assert_eq!(failed.block_time, None);
    }

    #[test]
    fn test_instruction_shapes() {
        let tx: ParsedTransaction = serde_json::from_value(json!({
            "slot": 1,
            "blockTime": 100,
            "meta": {
                "err": null,
                "innerInstructions": [{
                    "index": 0,
                    "instructions": [{
                        "program": "spl-token",
                        "programId": "Tokenkeg",
                        "parsed": {"type": "burnChecked", "info": {
                            "mint": "M", "authority": "A",
                            "tokenAmount": {"amount": "2500", "decimals": 3}
                        }}
                    }]
                }]
            },
            "transaction": {
                "signatures": ["sig"],
                "message": {"instructions": [
                    {"programId": "Other", "accounts": [], "data": "3Bxs"},
                    {"program": "spl-memo", "programId": "Memo", "parsed": "hello"}
                ]}
            }
        }))
        .unwrap();

        assert!(!tx.is_failed());
        assert_eq!(tx.top_level_instructions().len(), 2);
        assert!(tx.top_level_instructions()[0].as_parsed().is_none());
        let memo = tx.top_level_instructions()[1].as_parsed().unwrap();
        assert_eq!(memo.kind(), None);

        let inner: Vec<_> = tx.inner_instructions().collect();
        assert_eq!(inner.len(), 1);
        let burn = inner[0].as_parsed().unwrap();
        assert_eq!(burn.kind(), Some("burnChecked"));
        assert_eq!(burn.raw_amount(), Some(2500));
        assert_eq!(burn.reported_decimals(), Some(3));
        assert_eq!(burn.info_str("authority"), Some("A"));
    }
}

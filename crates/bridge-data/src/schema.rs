//! Line schema for the three trace blobs.
//!
//! Every line is comma-separated with an exact field count. A wrong field
//! count fails the whole transaction's decode; partial or best-effort parses
//! would silently corrupt correlation results downstream.

use alloy::primitives::U256;

use crate::error::{EngineError, Result};

/// Call kind recorded by the tracer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallKind {
    Call,
    StaticCall,
    DelegateCall,
    Create,
    CallCode,
}

impl CallKind {
    fn parse(value: &str) -> Result<Self> {
        match value {
            "call" => Ok(CallKind::Call),
            "staticcall" => Ok(CallKind::StaticCall),
            "delegatecall" => Ok(CallKind::DelegateCall),
            "create" => Ok(CallKind::Create),
            "callcode" => Ok(CallKind::CallCode),
            other => Err(EngineError::MalformedField {
                kind: "call",
                field: "kind",
                value: other.to_string(),
            }),
        }
    }

    /// Wire name as emitted by the tracer.
    pub fn as_str(self) -> &'static str {
        match self {
            CallKind::Call => "call",
            CallKind::StaticCall => "staticcall",
            CallKind::DelegateCall => "delegatecall",
            CallKind::Create => "create",
            CallKind::CallCode => "callcode",
        }
    }
}

/// One line of the call trace:
/// `index,kind,depth,from,to,value,gas,input,output`
#[derive(Clone, Debug, PartialEq)]
pub struct CallLine {
    pub index: u32,
    pub kind: CallKind,
    pub depth: u32,
    pub from: String,
    pub to: String,
    pub value: U256,
    pub gas: u64,
    /// Raw 0x-prefixed calldata; selector and word decoding happen in the
    /// trace decoder, not here.
    pub input: String,
    pub output: String,
}

impl CallLine {
    pub const FIELDS: usize = 9;

    pub fn parse(line: &str) -> Result<Self> {
        let fields = split_exact(line, "call", Self::FIELDS)?;
        Ok(CallLine {
            index: parse_u32("call", "index", fields[0])?,
            kind: CallKind::parse(fields[1])?,
            depth: parse_u32("call", "depth", fields[2])?,
            from: fields[3].to_string(),
            to: fields[4].to_string(),
            value: parse_u256("call", "value", fields[5])?,
            gas: parse_u64("call", "gas", fields[6])?,
            input: fields[7].to_string(),
            output: fields[8].to_string(),
        })
    }
}

/// One line of the transfer log: `from,to,token,amount,depth`
#[derive(Clone, Debug, PartialEq)]
pub struct TransferLine {
    pub from: String,
    pub to: String,
    pub token: String,
    pub amount: U256,
    pub depth: u32,
}

impl TransferLine {
    pub const FIELDS: usize = 5;

    pub fn parse(line: &str) -> Result<Self> {
        let fields = split_exact(line, "transfer", Self::FIELDS)?;
        Ok(TransferLine {
            from: fields[0].to_string(),
            to: fields[1].to_string(),
            token: fields[2].to_string(),
            amount: parse_u256("transfer", "amount", fields[3])?,
            depth: parse_u32("transfer", "depth", fields[4])?,
        })
    }
}

/// One line of the event trace: `address,topics,data,kind,call_index`
///
/// `topics` is a `|`-separated list of 32-byte topic hashes; the first entry
/// is the event signature topic.
#[derive(Clone, Debug, PartialEq)]
pub struct EventLine {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
    pub kind: String,
    pub call_index: u32,
}

impl EventLine {
    pub const FIELDS: usize = 5;

    pub fn parse(line: &str) -> Result<Self> {
        let fields = split_exact(line, "event", Self::FIELDS)?;
        let topics = if fields[1].is_empty() {
            Vec::new()
        } else {
            fields[1].split('|').map(str::to_string).collect()
        };
        Ok(EventLine {
            address: fields[0].to_string(),
            topics,
            data: fields[2].to_string(),
            kind: fields[3].to_string(),
            call_index: parse_u32("event", "call_index", fields[4])?,
        })
    }
}

/// Parses a whole newline-delimited blob. An empty blob decodes to zero
/// records; a transaction with no transfers or events is normal.
pub fn parse_blob<T>(blob: &str, parse_line: impl Fn(&str) -> Result<T>) -> Result<Vec<T>> {
    if blob.is_empty() {
        return Ok(Vec::new());
    }
    blob.lines().map(|line| parse_line(line)).collect()
}

fn split_exact<'a>(line: &'a str, kind: &'static str, expected: usize) -> Result<Vec<&'a str>> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() != expected {
        return Err(EngineError::MalformedTrace {
            kind,
            expected,
            got: fields.len(),
        });
    }
    Ok(fields)
}

fn parse_u32(kind: &'static str, field: &'static str, value: &str) -> Result<u32> {
    value.parse().map_err(|_| EngineError::MalformedField {
        kind,
        field,
        value: value.to_string(),
    })
}

fn parse_u64(kind: &'static str, field: &'static str, value: &str) -> Result<u64> {
    value.parse().map_err(|_| EngineError::MalformedField {
        kind,
        field,
        value: value.to_string(),
    })
}

fn parse_u256(kind: &'static str, field: &'static str, value: &str) -> Result<U256> {
    value
        .parse::<U256>()
        .map_err(|_| EngineError::MalformedField {
            kind,
            field,
            value: value.to_string(),
        })
}

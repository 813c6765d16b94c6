use std::fmt;

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

/// Body of `POST /api/run` exactly as the web client sends it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunRequestBody {
    #[serde(rename = "type", default)]
    pub mode: String,

    #[serde(default)]
    pub inputs: RunInputs,
}

/// Every form field the client may send. All optional on the wire; which ones
/// are required depends on the mode.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunInputs {
    #[serde(default)]
    pub rpc_url: Option<String>,
    #[serde(default)]
    pub tx_hash: Option<String>,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub calldata: Option<String>,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub msg_value: Option<String>,
    #[serde(default)]
    pub should_deal_token: Option<bool>,
    #[serde(default)]
    pub token_address: Option<String>,
    #[serde(default)]
    pub spender: Option<String>,
    /// Client-side preview of the script. Never executed.
    #[serde(default)]
    pub script_content: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunMode {
    Trace,
    Simulate,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Trace => "TRACE",
            RunMode::Simulate => "SIMULATE",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An RPC endpoint that passed URL validation. Its `Display` is redacted; use
/// [`RpcUrl::as_str`] to get the real value.
#[derive(Clone, PartialEq, Eq)]
pub struct RpcUrl(String);

impl RpcUrl {
    pub(crate) fn new_unchecked(url: String) -> Self {
        Self(url)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RpcUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::util::redact_url(&self.0))
    }
}

impl fmt::Debug for RpcUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RpcUrl({self})")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceRequest {
    pub rpc_url: RpcUrl,
    pub tx_hash: B256,
}

impl TraceRequest {
    /// `0x` followed by 64 lowercase hex digits.
    pub fn tx_hash_hex(&self) -> String {
        format!("0x{}", alloy_primitives::hex::encode(self.tx_hash))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DealToken {
    pub token: Address,
    pub spender: Address,
    pub amount: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulateRequest {
    pub rpc_url: RpcUrl,
    pub sender: Address,
    pub to: Address,
    pub calldata: Bytes,
    pub value: U256,
    pub deal_token: Option<DealToken>,
}

/// A request that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunRequest {
    Trace(TraceRequest),
    Simulate(SimulateRequest),
}

impl RunRequest {
    pub fn mode(&self) -> RunMode {
        match self {
            RunRequest::Trace(_) => RunMode::Trace,
            RunRequest::Simulate(_) => RunMode::Simulate,
        }
    }

    pub fn rpc_url(&self) -> &RpcUrl {
        match self {
            RunRequest::Trace(t) => &t.rpc_url,
            RunRequest::Simulate(s) => &s.rpc_url,
        }
    }
}

use alloy_primitives::{hex, Address, Bytes, B256, U256};
use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ValidationError;

use super::types::{
    DealToken, RpcUrl, RunInputs, RunRequest, RunRequestBody, SimulateRequest, TraceRequest,
};

const MAX_RPC_URL_LEN: usize = 2048;

lazy_static! {
    // Scheme plus RFC 3986 characters only: no whitespace, quotes or backslashes.
    static ref RPC_URL_RE: Regex =
        Regex::new(r"^(?i:https?|wss?)://[A-Za-z0-9\-._~:/?#\[\]@!$&'()*+,;=%]+$")
            .expect("rpc url regex");
    static ref HEX_RE: Regex = Regex::new(r"^0[xX][0-9a-fA-F]*$").expect("hex regex");
    static ref DECIMAL_RE: Regex = Regex::new(r"^[0-9]+$").expect("decimal regex");
}

/// Checks a decoded request against its mode-specific schema.
///
/// Fails on the first offending field; nothing is synthesized or spawned for
/// a request that does not pass.
pub fn validate(body: &RunRequestBody) -> Result<RunRequest, ValidationError> {
    match body.mode.trim() {
        "TRACE" => validate_trace(&body.inputs).map(RunRequest::Trace),
        "SIMULATE" => validate_simulate(&body.inputs).map(RunRequest::Simulate),
        "" => Err(ValidationError::Missing { field: "type" }),
        other => Err(ValidationError::UnknownMode(other.to_string())),
    }
}

fn validate_trace(inputs: &RunInputs) -> Result<TraceRequest, ValidationError> {
    let rpc_url = parse_rpc_url(required("rpcUrl", &inputs.rpc_url)?)?;
    let tx_hash = parse_fixed_hex::<32>("txHash", required("txHash", &inputs.tx_hash)?)?;
    Ok(TraceRequest {
        rpc_url,
        tx_hash: B256::from(tx_hash),
    })
}

fn validate_simulate(inputs: &RunInputs) -> Result<SimulateRequest, ValidationError> {
    let rpc_url = parse_rpc_url(required("rpcUrl", &inputs.rpc_url)?)?;
    let sender = parse_address("sender", required("sender", &inputs.sender)?)?;
    let to = parse_address("to", required("to", &inputs.to)?)?;
    let calldata = parse_calldata(optional(&inputs.calldata))?;
    let value = match optional(&inputs.msg_value) {
        Some(v) => parse_uint("msgValue", v)?,
        None => U256::ZERO,
    };

    let deal_token = if inputs.should_deal_token.unwrap_or(false) {
        Some(DealToken {
            token: parse_address("tokenAddress", required("tokenAddress", &inputs.token_address)?)?,
            spender: parse_address("spender", required("spender", &inputs.spender)?)?,
            amount: parse_uint("amount", required("amount", &inputs.amount)?)?,
        })
    } else {
        None
    };

    if inputs.script_content.as_deref().is_some_and(|s| !s.is_empty()) {
        tracing::debug!(
            target: "txscope.engine",
            "client-supplied scriptContent ignored; script is synthesized server-side"
        );
    }

    Ok(SimulateRequest {
        rpc_url,
        sender,
        to,
        calldata,
        value,
        deal_token,
    })
}

fn required<'a>(
    field: &'static str,
    value: &'a Option<String>,
) -> Result<&'a str, ValidationError> {
    optional(value).ok_or(ValidationError::Missing { field })
}

fn optional(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_rpc_url(raw: &str) -> Result<RpcUrl, ValidationError> {
    if raw.len() > MAX_RPC_URL_LEN {
        return Err(ValidationError::invalid(
            "rpcUrl",
            format!("longer than {MAX_RPC_URL_LEN} characters"),
        ));
    }
    if !RPC_URL_RE.is_match(raw) {
        return Err(ValidationError::invalid(
            "rpcUrl",
            "expected an http(s) or ws(s) URL without spaces or quotes",
        ));
    }
    Ok(RpcUrl::new_unchecked(raw.to_string()))
}

fn hex_digits<'a>(field: &'static str, raw: &'a str) -> Result<&'a str, ValidationError> {
    if !HEX_RE.is_match(raw) {
        return Err(ValidationError::invalid(
            field,
            "expected 0x-prefixed hexadecimal",
        ));
    }
    Ok(&raw[2..])
}

fn parse_fixed_hex<const N: usize>(
    field: &'static str,
    raw: &str,
) -> Result<[u8; N], ValidationError> {
    let digits = hex_digits(field, raw)?;
    if digits.len() != N * 2 {
        return Err(ValidationError::invalid(
            field,
            format!("expected {} hex digits, got {}", N * 2, digits.len()),
        ));
    }
    let mut out = [0u8; N];
    hex::decode_to_slice(digits, &mut out)
        .map_err(|e| ValidationError::invalid(field, e.to_string()))?;
    Ok(out)
}

fn parse_address(field: &'static str, raw: &str) -> Result<Address, ValidationError> {
    parse_fixed_hex::<20>(field, raw).map(Address::from)
}

fn parse_calldata(raw: Option<&str>) -> Result<Bytes, ValidationError> {
    let Some(raw) = raw else {
        return Ok(Bytes::new());
    };
    let digits = hex_digits("calldata", raw)?;
    if digits.len() % 2 != 0 {
        return Err(ValidationError::invalid(
            "calldata",
            "odd number of hex digits",
        ));
    }
    hex::decode(digits)
        .map(Bytes::from)
        .map_err(|e| ValidationError::invalid("calldata", e.to_string()))
}

/// Parses a non-negative integer given in decimal or `0x` hex into a uint256.
pub fn parse_uint(field: &'static str, raw: &str) -> Result<U256, ValidationError> {
    let (digits, radix) = if raw.starts_with("0x") || raw.starts_with("0X") {
        let digits = hex_digits(field, raw)?;
        if digits.is_empty() {
            return Err(ValidationError::invalid(field, "no digits after 0x"));
        }
        (digits, 16)
    } else if DECIMAL_RE.is_match(raw) {
        (raw, 10)
    } else {
        return Err(ValidationError::invalid(
            field,
            "expected a non-negative integer (decimal or 0x hex)",
        ));
    };
    U256::from_str_radix(digits, radix)
        .map_err(|_| ValidationError::invalid(field, "does not fit in uint256"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RunInputs;

    const HASH: &str = "0x5c504ed432cb51138bcf09aa5e8a410dd4a1e204ef84bfed1be16dfba1b22060";
    const SENDER: &str = "0xd8da6bf26964af9d7eed9e03e53415d37aa96045";
    const TARGET: &str = "0x7a250d5630b4cf539739df2c5dacb4c659f2488d";
    const USDC: &str = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48";

    fn body(mode: &str, inputs: RunInputs) -> RunRequestBody {
        RunRequestBody {
            mode: mode.to_string(),
            inputs,
        }
    }

    fn simulate_inputs() -> RunInputs {
        RunInputs {
            rpc_url: Some("https://rpc.example/eth".into()),
            sender: Some(SENDER.into()),
            to: Some(TARGET.into()),
            calldata: Some("0x".into()),
            msg_value: Some("0".into()),
            amount: Some("0".into()),
            ..Default::default()
        }
    }

    #[test]
    fn trace_request_is_accepted() {
        let req = validate(&body(
            "TRACE",
            RunInputs {
                rpc_url: Some(" https://rpc.example/eth ".into()),
                tx_hash: Some(HASH.into()),
                ..Default::default()
            },
        ))
        .unwrap();
        let RunRequest::Trace(t) = req else {
            panic!("expected trace");
        };
        assert_eq!(t.rpc_url.as_str(), "https://rpc.example/eth");
        assert_eq!(format!("0x{}", hex::encode(t.tx_hash)), HASH);
    }

    #[test]
    fn unknown_or_missing_mode() {
        let err = validate(&body("REPLAY", RunInputs::default())).unwrap_err();
        assert_eq!(err, ValidationError::UnknownMode("REPLAY".into()));
        let err = validate(&body("", RunInputs::default())).unwrap_err();
        assert_eq!(err, ValidationError::Missing { field: "type" });
    }

    #[test]
    fn trace_hash_must_be_32_bytes_of_hex() {
        for bad in ["0xabc", "5c504ed4", "0xzz504ed432cb51138bcf09aa5e8a410dd4a1e204ef84bfed1be16dfba1b22060"] {
            let err = validate(&body(
                "TRACE",
                RunInputs {
                    rpc_url: Some("https://rpc.example/eth".into()),
                    tx_hash: Some(bad.into()),
                    ..Default::default()
                },
            ))
            .unwrap_err();
            assert_eq!(err.field(), "txHash", "input {bad}");
        }
    }

    #[test]
    fn rpc_url_rejects_script_breaking_characters() {
        for bad in [
            "ftp://rpc.example",
            "https://rpc.example/\"); vm.ffi(x); //",
            "https://rpc.example/a b",
            "https://rpc.example/\\",
            "rpc.example",
        ] {
            let mut inputs = simulate_inputs();
            inputs.rpc_url = Some(bad.into());
            let err = validate(&body("SIMULATE", inputs)).unwrap_err();
            assert_eq!(err.field(), "rpcUrl", "input {bad}");
        }
    }

    #[test]
    fn simulate_defaults_for_optional_fields() {
        let mut inputs = simulate_inputs();
        inputs.calldata = None;
        inputs.msg_value = None;
        let RunRequest::Simulate(s) = validate(&body("SIMULATE", inputs)).unwrap() else {
            panic!("expected simulate");
        };
        assert!(s.calldata.is_empty());
        assert_eq!(s.value, U256::ZERO);
        assert!(s.deal_token.is_none());
    }

    #[test]
    fn deal_token_requires_token_address() {
        let mut inputs = simulate_inputs();
        inputs.should_deal_token = Some(true);
        inputs.spender = Some(TARGET.into());
        inputs.amount = Some("1000".into());
        let err = validate(&body("SIMULATE", inputs)).unwrap_err();
        assert_eq!(err, ValidationError::Missing { field: "tokenAddress" });
    }

    #[test]
    fn deal_token_amount_must_be_integer() {
        let mut inputs = simulate_inputs();
        inputs.should_deal_token = Some(true);
        inputs.token_address = Some(USDC.into());
        inputs.spender = Some(TARGET.into());
        inputs.amount = Some("not-a-number".into());
        let err = validate(&body("SIMULATE", inputs)).unwrap_err();
        assert_eq!(err.field(), "amount");
    }

    #[test]
    fn deal_fields_ignored_when_not_dealing() {
        let mut inputs = simulate_inputs();
        inputs.should_deal_token = Some(false);
        inputs.amount = Some("garbage".into());
        inputs.token_address = Some("nope".into());
        assert!(validate(&body("SIMULATE", inputs)).is_ok());
    }

    #[test]
    fn calldata_must_be_even_hex() {
        let mut inputs = simulate_inputs();
        inputs.calldata = Some("0xabc".into());
        assert_eq!(validate(&body("SIMULATE", inputs)).unwrap_err().field(), "calldata");

        let mut inputs = simulate_inputs();
        inputs.calldata = Some("0x\"; selfdestruct".into());
        assert_eq!(validate(&body("SIMULATE", inputs)).unwrap_err().field(), "calldata");
    }

    #[test]
    fn uint_parsing_accepts_decimal_and_hex() {
        assert_eq!(parse_uint("amount", "1000").unwrap(), U256::from(1000u64));
        assert_eq!(parse_uint("amount", "0x3e8").unwrap(), U256::from(1000u64));
        assert_eq!(parse_uint("amount", "0").unwrap(), U256::ZERO);
        assert_eq!(
            parse_uint(
                "amount",
                "115792089237316195423570985008687907853269984665640564039457584007913129639935"
            )
            .unwrap(),
            U256::MAX
        );
    }

    #[test]
    fn uint_parsing_rejects_floats_negatives_and_overflow() {
        for bad in [
            "1.5",
            "-1",
            "1e18",
            "0x",
            "0xg1",
            "115792089237316195423570985008687907853269984665640564039457584007913129639936",
        ] {
            assert!(parse_uint("msgValue", bad).is_err(), "input {bad}");
        }
    }
}

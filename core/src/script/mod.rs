//! Turns a validated SIMULATE request into a Foundry test contract.
//!
//! Pure and deterministic: identical requests give byte-identical scripts.
//! Caller data only reaches the source through the typed renderers in
//! [`literal`], never by pasting raw input strings.

pub mod literal;

use serde::Serialize;

use crate::error::SynthesisError;
use crate::request::SimulateRequest;

use literal::{address_literal, hex_literal, string_literal, uint_literal};

pub const SCRIPT_FILE_NAME: &str = "Simulate.t.sol";
pub const CONTRACT_NAME: &str = "SimulateTest";
pub const TEST_NAME: &str = "test_simulate";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SynthesizedScript {
    pub file_name: String,
    pub contract_name: String,
    pub test_name: String,
    pub source: String,
}

pub fn synthesize(req: &SimulateRequest) -> Result<SynthesizedScript, SynthesisError> {
    let rpc_url = string_literal("rpcUrl", req.rpc_url.as_str())?;

    let mut src = ScriptBuf::default();
    src.line(0, "// SPDX-License-Identifier: UNLICENSED");
    src.line(0, "pragma solidity ^0.8.13;");
    src.blank();
    src.line(0, "import {Test, console2} from \"forge-std/Test.sol\";");
    src.line(0, "import {IERC20} from \"forge-std/interfaces/IERC20.sol\";");
    src.blank();
    src.line(0, &format!("contract {CONTRACT_NAME} is Test {{"));
    src.line(
        1,
        &format!("address constant SENDER = {};", address_literal(&req.sender)),
    );
    src.line(
        1,
        &format!("address constant TARGET = {};", address_literal(&req.to)),
    );
    src.blank();
    src.line(1, "function setUp() public {");
    src.line(2, &format!("vm.createSelectFork({rpc_url});"));
    src.line(1, "}");
    src.blank();
    src.line(1, &format!("function {TEST_NAME}() public {{"));
    src.line(
        2,
        &format!("bytes memory data = {};", hex_literal(&req.calldata)),
    );
    src.line(
        2,
        &format!("uint256 value = {};", uint_literal(&req.value)),
    );

    if let Some(deal) = &req.deal_token {
        src.blank();
        src.line(
            2,
            &format!("address token = {};", address_literal(&deal.token)),
        );
        src.line(
            2,
            &format!("address spender = {};", address_literal(&deal.spender)),
        );
        src.line(
            2,
            &format!("uint256 amount = {};", uint_literal(&deal.amount)),
        );
        src.line(2, "deal(token, SENDER, amount);");
        src.line(2, "vm.prank(SENDER);");
        src.line(2, "IERC20(token).approve(spender, amount);");
    }

    if !req.value.is_zero() {
        src.blank();
        src.line(2, "vm.deal(SENDER, SENDER.balance + value);");
    }

    src.blank();
    src.line(2, "vm.prank(SENDER);");
    src.line(
        2,
        "(bool ok, bytes memory ret) = TARGET.call{value: value}(data);",
    );
    src.line(2, "console2.log(\"call success:\", ok);");
    src.line(2, "console2.logBytes(ret);");
    src.line(2, "if (!ok) {");
    src.line(3, "assembly {");
    src.line(4, "revert(add(ret, 32), mload(ret))");
    src.line(3, "}");
    src.line(2, "}");
    src.line(1, "}");
    src.line(0, "}");

    Ok(SynthesizedScript {
        file_name: SCRIPT_FILE_NAME.to_string(),
        contract_name: CONTRACT_NAME.to_string(),
        test_name: TEST_NAME.to_string(),
        source: src.finish(),
    })
}

#[derive(Default)]
struct ScriptBuf {
    out: String,
}

impl ScriptBuf {
    fn line(&mut self, indent: usize, text: &str) {
        for _ in 0..indent {
            self.out.push_str("    ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }

    fn finish(self) -> String {
        self.out
    }
}

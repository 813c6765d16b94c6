mod types;
mod validate;

pub use types::{
    DealToken, RpcUrl, RunInputs, RunMode, RunRequest, RunRequestBody, SimulateRequest,
    TraceRequest,
};
pub use validate::{parse_uint, validate};

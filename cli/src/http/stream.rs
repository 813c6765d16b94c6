//! Forwards a run's output to a chunked HTTP body.
//!
//! Every output chunk becomes one body frame as soon as it arrives. Dropping
//! the body (client gone) cancels the run.

use std::convert::Infallible;

use axum::{
    body::Body,
    http::{header, HeaderValue},
    response::Response,
};
use bytes::Bytes;

use txscope_core::api::{CancelReason, RunLifecycle, RunStream, RunnerEvent};

use super::AppState;

pub const RUN_ID_HEADER: &str = "x-run-id";

/// Counts runs whose client went away before the final event.
struct AbandonWatch {
    state: AppState,
    finished: bool,
}

impl Drop for AbandonWatch {
    fn drop(&mut self) {
        if !self.finished {
            self.state.stats_mut().runs_abandoned += 1;
        }
    }
}

pub fn into_response(run: RunStream, lifecycle: RunLifecycle, state: AppState) -> Response {
    let RunStream {
        run_id,
        mode,
        mut events,
        cancel,
    } = run;
    let trailer_enabled = state.cfg.control.status_trailer;
    let header_run_id = HeaderValue::from_str(&run_id).ok();

    // Armed before the body exists: a response dropped unpolled still cancels.
    let disconnect = cancel.cancel_on_drop(CancelReason::ClientDisconnected);
    let mut watch = AbandonWatch {
        state,
        finished: false,
    };

    let body = async_stream::stream! {
        let mut lifecycle = lifecycle;

        while let Some(event) = events.recv().await {
            lifecycle.observe(&event);
            match event {
                RunnerEvent::Started { pid } => {
                    tracing::debug!(target: "txscope.http", run_id = %run_id, ?pid, "streaming");
                }
                RunnerEvent::Output(chunk) => {
                    yield Ok::<Bytes, Infallible>(chunk);
                }
                RunnerEvent::Finished(outcome) => {
                    watch.finished = true;
                    watch.state.stats_mut().record_outcome(&outcome);
                    if trailer_enabled || outcome.must_report() {
                        yield Ok(outcome.trailer());
                    }
                }
            }
        }

        disconnect.disarm();
        tracing::info!(
            target: "txscope.http",
            run_id = %run_id,
            mode = %mode,
            state = %lifecycle.state(),
            "stream closed"
        );
    };

    let mut response = Response::new(Body::from_stream(body));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    if let Some(v) = header_run_id {
        headers.insert(RUN_ID_HEADER, v);
    }
    response
}

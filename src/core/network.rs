use crate::game::round::RoundSummary;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

const SCORE_LEDGER_API_URL: &str = "https://api.gridshot.dev/v1/scores";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
struct ScorePayload {
    score: u32,
    targets_hit: u32,
    max_hits: u32,
    total_boxes: u32,
    ended_at: String,
    client: String,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    result: String, // "OK" when the score was accepted
    receipt_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitStatus {
    Idle,
    Pending,
    Accepted(Option<String>),
    Error(String),
}

static SUBMIT_STATUS: std::sync::LazyLock<Arc<Mutex<SubmitStatus>>> =
    std::sync::LazyLock::new(|| Arc::new(Mutex::new(SubmitStatus::Idle)));

pub fn get_status() -> SubmitStatus {
    SUBMIT_STATUS.lock().unwrap().clone()
}

fn set_status(new_status: SubmitStatus) {
    *SUBMIT_STATUS.lock().unwrap() = new_status;
}

/// Exposes the globally configured ureq Agent for ledger requests.
pub fn get_agent() -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(REQUEST_TIMEOUT))
        .build()
        .into()
}

/// Forwards a finished round to the score ledger. Fire-and-forget: the
/// worker thread only ever touches the status slot, never round state.
pub fn submit_score(summary: &RoundSummary) {
    if !crate::config::get().enable_score_submit {
        set_status(SubmitStatus::Error("Disabled".into()));
        return;
    }

    let payload = ScorePayload {
        score: summary.score,
        targets_hit: summary.targets_hit,
        max_hits: summary.max_hits,
        total_boxes: summary.total_boxes as u32,
        ended_at: summary.ended_at.to_rfc3339(),
        client: format!("gridshot/{}", env!("CARGO_PKG_VERSION")),
    };

    set_status(SubmitStatus::Pending);
    info!("Submitting score {} to the ledger...", payload.score);
    thread::spawn(move || perform_submit(&payload));
}

fn perform_submit(payload: &ScorePayload) {
    if let Ok(body) = serde_json::to_string(payload) {
        debug!("ledger payload: {body}");
    }

    let agent = get_agent();
    match agent.post(SCORE_LEDGER_API_URL).send_json(payload) {
        Ok(resp) => {
            let mut body = resp.into_body();
            match body.read_json::<SubmitResponse>() {
                Ok(data) => {
                    if data.result == "OK" {
                        info!("Score accepted by the ledger.");
                        set_status(SubmitStatus::Accepted(data.receipt_id));
                    } else {
                        warn!("Ledger result != OK: {}", data.result);
                        set_status(SubmitStatus::Error("Rejected".into()));
                    }
                }
                Err(e) => {
                    warn!("Failed to parse ledger response: {e}");
                    set_status(SubmitStatus::Error("Failed to Parse".into()));
                }
            }
        }
        Err(e) => {
            warn!("HTTP error submitting score: {e}");
            set_status(SubmitStatus::Error(format!("HTTP error: {e}")));
        }
    }
}

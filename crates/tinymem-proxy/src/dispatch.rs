//! The diagnostics dispatcher (SPEC_FULL.md section 4.9): a single function
//! standing in for the out-of-scope HTTP boundary's read-only diagnostic
//! endpoints (`/state`, `/doctor`, `/recent`, `/debug/last-prompt`). No
//! listener, no transport -- just the request/response shape a real HTTP
//! handler would wrap.

use tinymem_core::{Episode, EntityState};
use tinymem_runtime::{Diagnostics, DoctorReport};

pub enum DiagnosticsRequest {
    State,
    Doctor,
    Recent { n: u32 },
    LastPrompt { episode_id: String },
}

pub enum DiagnosticsResponse {
    State(Vec<EntityState>),
    Doctor(DoctorReport),
    Recent(Vec<Episode>),
    LastPrompt(Option<tinymem_core::Artifact>),
}

pub fn handle_diagnostics_request(
    diagnostics: &Diagnostics,
    request: DiagnosticsRequest,
) -> anyhow::Result<DiagnosticsResponse> {
    match request {
        DiagnosticsRequest::State => Ok(DiagnosticsResponse::State(diagnostics.state_snapshot()?)),
        DiagnosticsRequest::Doctor => Ok(DiagnosticsResponse::Doctor(diagnostics.doctor()?)),
        DiagnosticsRequest::Recent { n } => {
            Ok(DiagnosticsResponse::Recent(diagnostics.recent_episodes(n)?))
        }
        DiagnosticsRequest::LastPrompt { episode_id } => Ok(DiagnosticsResponse::LastPrompt(
            diagnostics.last_prompt(&episode_id)?,
        )),
    }
}

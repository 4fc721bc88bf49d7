//! The two async seams the Runtime consumes but never implements itself
//! (spec.md section 6): the upstream chat-completion client and the Shadow
//! Audit worker. Message passing only -- the Runtime never shares state with
//! either.

use async_trait::async_trait;
use tinymem_core::AuditStatus;

/// One chat message in the forwarded conversation.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Forwarding options (model name, temperature, etc.) are opaque to the
/// core -- it only needs to pass them through.
#[derive(Debug, Clone, Default)]
pub struct ForwardOptions {
    pub model: Option<String>,
    pub extra: std::collections::BTreeMap<String, String>,
}

/// The upstream chat-completion client. The core hands it the hydrated
/// prompt and consumes the returned text verbatim; it never inspects or
/// retries the call itself.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn forward(
        &self,
        messages: Vec<ChatMessage>,
        options: ForwardOptions,
    ) -> anyhow::Result<String>;
}

/// The Shadow Audit worker's submission channel. The worker is out of scope
/// (spec.md section 1); this trait is the bounded submission queue the
/// Runtime hands work to. The eventual `AuditResult` comes back only through
/// the Ledger, never as a return value or shared state.
#[async_trait]
pub trait ShadowAuditClient: Send + Sync {
    async fn submit(&self, episode_id: String, artifact_hash: String, entity_key: String);
}

/// A Shadow Audit client that never fires -- used where no audit worker is
/// wired up (tests, or a deployment that hasn't enabled shadow auditing).
#[derive(Debug, Default)]
pub struct NullShadowAuditClient;

#[async_trait]
impl ShadowAuditClient for NullShadowAuditClient {
    async fn submit(&self, _episode_id: String, _artifact_hash: String, _entity_key: String) {}
}

/// Re-exported so callers building `AuditResult`s after a Shadow Audit
/// completes don't need a second `tinymem-core` import just for this.
pub type ShadowAuditOutcome = AuditStatus;

// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The chat session: owner of the conversation log.
//!
//! Two views exist over one append-only log.  The *comprehensive* view is
//! everything ever recorded, including empty model turns; the *curated* view
//! is what the model receives — strictly alternating roles, starting with
//! `user`, no empty messages.  All mutation goes through this type; sends
//! are serialized by `&mut self`, so a second send cannot begin until the
//! first finished recording its model output.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use skarv_config::{AuthKind, SessionConfig};
use skarv_model::{
    catalog, retry::retry_with_backoff, retry::RetryPolicy, CancellationToken, FunctionDeclaration,
    GenerateRequest, Message, ModelError, ModelProvider, Part, RawStream, Role,
};

const COMPRESSION_PROMPT: &str = "Summarise the conversation so far in a concise, \
     information-dense way. Preserve all technical details, decisions, file names, code \
     snippets, and tool outputs that may be relevant to future work. The summary will \
     replace the original history to free up context space.";

const COMPRESSION_ACK: &str = "Acknowledged.";

/// Before/after token counts recorded when compression fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionSnapshot {
    pub original_token_count: u64,
    pub new_token_count: u64,
}

/// Consulted on persistent rate limiting under OAuth: `(current, fallback)`
/// → `true` switches the session to the fallback model and retries.
pub type FallbackHandler = Arc<dyn Fn(&str, &str) -> bool + Send + Sync>;

pub struct ChatSession {
    pub id: String,
    provider: Arc<dyn ModelProvider>,
    config: SessionConfig,
    model: String,
    system_instruction: Option<String>,
    tools: Vec<FunctionDeclaration>,
    comprehensive: Vec<Message>,
    /// Seed messages re-installed after every compression reset.
    env_preamble: Vec<Message>,
    fallback_handler: Option<FallbackHandler>,
}

impl ChatSession {
    pub fn new(provider: Arc<dyn ModelProvider>, config: SessionConfig) -> Self {
        let model = config.model.clone();
        Self {
            id: Uuid::new_v4().to_string(),
            provider,
            config,
            model,
            system_instruction: None,
            tools: Vec::new(),
            comprehensive: Vec::new(),
            env_preamble: Vec::new(),
            fallback_handler: None,
        }
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    /// Install the environment preamble.  Also seeds an empty history so the
    /// preamble is present from the first turn.
    pub fn with_env_preamble(mut self, preamble: Vec<Message>) -> Self {
        if self.comprehensive.is_empty() {
            self.comprehensive = preamble.clone();
        }
        self.env_preamble = preamble;
        self
    }

    pub fn with_fallback_handler(mut self, handler: FallbackHandler) -> Self {
        self.fallback_handler = Some(handler);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider(&self) -> &Arc<dyn ModelProvider> {
        &self.provider
    }

    pub fn set_tools(&mut self, tools: Vec<FunctionDeclaration>) {
        self.tools = tools;
    }

    // ── History API ───────────────────────────────────────────────────────────

    /// Deep copy of the history.  `curated` selects the model-safe view.
    pub fn history(&self, curated: bool) -> Vec<Message> {
        if curated {
            curate(&self.comprehensive)
        } else {
            self.comprehensive.clone()
        }
    }

    pub fn set_history(&mut self, history: Vec<Message>) {
        self.comprehensive = history;
    }

    pub fn add_history(&mut self, message: Message) {
        self.comprehensive.push(message);
    }

    pub fn clear(&mut self) {
        self.comprehensive.clear();
    }

    pub fn last_comprehensive(&self) -> Option<&Message> {
        self.comprehensive.last()
    }

    /// Insert an empty text part into an empty trailing model message so the
    /// entry has a well-formed shape before a continuation.
    pub fn pad_empty_model_tail(&mut self) {
        if let Some(last) = self.comprehensive.last_mut() {
            if last.role == Role::Model && last.parts.is_empty() {
                last.parts.push(Part::text(""));
            }
        }
    }

    /// Record one model turn's output, applying the merge rules:
    /// thought parts are dropped; a contentless turn after non-tool input
    /// becomes an explicit empty model message (alternation); adjacent text
    /// parts coalesce; a leading text-only message merges into a trailing
    /// text-only model entry instead of appending.
    pub fn record_model_output(
        &mut self,
        outputs: Vec<Message>,
        input_was_function_response: bool,
    ) {
        let mut cleaned: Vec<Message> = outputs
            .into_iter()
            .map(|mut m| {
                m.parts.retain(|p| !p.is_thought());
                m.parts = coalesce_text_parts(m.parts);
                m
            })
            .collect();
        cleaned.retain(|m| !m.parts.is_empty());

        if cleaned.iter().all(Message::is_empty) {
            if !input_was_function_response {
                self.comprehensive.push(Message::model_parts(vec![]));
            }
            return;
        }

        let mut iter = cleaned.into_iter();
        if let Some(first) = iter.next() {
            let merged = match self.comprehensive.last_mut() {
                Some(last) if last.role == Role::Model && last.is_text_only() && first.is_text_only() => {
                    let text = format!("{}{}", last.text(), first.text());
                    last.parts = vec![Part::text(text)];
                    true
                }
                _ => false,
            };
            if !merged {
                self.comprehensive.push(first);
            }
        }
        self.comprehensive.extend(iter);
    }

    // ── Model calls ───────────────────────────────────────────────────────────

    fn build_request(&self) -> GenerateRequest {
        GenerateRequest {
            model: self.model.clone(),
            messages: self.history(true),
            system_instruction: self.system_instruction.clone(),
            tools: self.tools.clone(),
        }
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.config.retry_attempts.max(1),
            base_delay: Duration::from_millis(self.config.retry_base_delay_ms),
        }
    }

    /// Append `parts` as the next user message and open a model stream over
    /// the curated history.  Transient failures are retried with backoff;
    /// persistent rate limiting under OAuth consults the fallback handler.
    pub async fn send_stream(
        &mut self,
        parts: Vec<Part>,
        cancel: CancellationToken,
    ) -> Result<RawStream, ModelError> {
        self.comprehensive.push(Message::user_parts(parts));
        let req = self.build_request();
        self.open_stream(req, cancel).await
    }

    async fn open_stream(
        &mut self,
        req: GenerateRequest,
        cancel: CancellationToken,
    ) -> Result<RawStream, ModelError> {
        let provider = Arc::clone(&self.provider);
        let result = retry_with_backoff(self.retry_policy(), &cancel, |_| {
            let provider = Arc::clone(&provider);
            let req = req.clone();
            let cancel = cancel.clone();
            async move { provider.send_stream(req, cancel).await }
        })
        .await;

        match result {
            Err(err) if err.is_rate_limit() && self.config.auth == AuthKind::Oauth => {
                let fallback = self.config.fallback_model.clone();
                let switch = match &self.fallback_handler {
                    Some(handler) if fallback != self.model => handler(&self.model, &fallback),
                    _ => false,
                };
                if !switch {
                    return Err(err);
                }
                warn!(
                    from = %self.model,
                    to = %fallback,
                    "persistent rate limiting; switching to fallback model"
                );
                self.model = fallback;
                let mut retry_req = req;
                retry_req.model = self.model.clone();
                provider.send_stream(retry_req, cancel).await
            }
            other => other,
        }
    }

    /// Non-streaming send: drain a stream into the concatenated text of its
    /// content parts.  Used for the compression summary.
    async fn send_message_text(
        &self,
        req: GenerateRequest,
        cancel: CancellationToken,
    ) -> Result<String, ModelError> {
        use futures::StreamExt;
        let provider = Arc::clone(&self.provider);
        let mut stream = retry_with_backoff(self.retry_policy(), &cancel, |_| {
            let provider = Arc::clone(&provider);
            let req = req.clone();
            let cancel = cancel.clone();
            async move { provider.send_stream(req, cancel).await }
        })
        .await?;

        let mut text = String::new();
        while let Some(item) = stream.next().await {
            let chunk = item?;
            for part in &chunk.parts {
                if !part.thought {
                    if let Some(t) = &part.text {
                        text.push_str(t);
                    }
                }
            }
        }
        Ok(text)
    }

    /// Token count of the curated history, when the backend can count.
    pub async fn count_curated_tokens(&self) -> Result<Option<u64>, ModelError> {
        self.provider
            .count_tokens(&self.model, &self.history(true))
            .await
    }

    // ── Compression ───────────────────────────────────────────────────────────

    /// Compress the history when it nears the model's context limit (or
    /// unconditionally when `force`).  Returns the before/after token counts
    /// when compression ran.
    pub async fn try_compress(
        &mut self,
        force: bool,
        cancel: &CancellationToken,
    ) -> Result<Option<CompressionSnapshot>, ModelError> {
        let curated = self.history(true);
        if curated.is_empty() {
            return Ok(None);
        }

        let limit = catalog::token_limit(&self.model);
        let threshold = (self.config.compression_threshold as f64 * limit as f64) as u64;
        let counted = self.count_curated_tokens().await?;
        let original = match counted {
            Some(tokens) => {
                if !force && tokens < threshold {
                    return Ok(None);
                }
                tokens
            }
            None => {
                if !force {
                    debug!("token count unknown; skipping compression check");
                    return Ok(None);
                }
                0
            }
        };

        let mut messages = curated;
        messages.push(Message::user(COMPRESSION_PROMPT));
        let req = GenerateRequest {
            model: self.model.clone(),
            messages,
            system_instruction: self.system_instruction.clone(),
            tools: vec![],
        };
        let summary = self.send_message_text(req, cancel.clone()).await?;
        if summary.trim().is_empty() {
            warn!("compression produced an empty summary; keeping history");
            return Ok(None);
        }

        let mut fresh = self.env_preamble.clone();
        fresh.push(Message::user(summary));
        fresh.push(Message::model(COMPRESSION_ACK));
        self.comprehensive = fresh;

        let new_count = self.count_curated_tokens().await?.unwrap_or(0);
        Ok(Some(CompressionSnapshot {
            original_token_count: original,
            new_token_count: new_count,
        }))
    }
}

// ─── Curation & merging ───────────────────────────────────────────────────────

/// Produce the model-safe view: scan in order; a user message grouped with
/// its consecutive model replies survives iff the user message is non-empty
/// and every model reply in the group is non-empty.  Stray model messages
/// with no preceding user turn are dropped.
pub(crate) fn curate(history: &[Message]) -> Vec<Message> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < history.len() {
        if history[i].role != Role::User {
            i += 1;
            continue;
        }
        let user = &history[i];
        let mut j = i + 1;
        while j < history.len() && history[j].role == Role::Model {
            j += 1;
        }
        let models = &history[i + 1..j];
        let group_valid = !user.is_empty() && models.iter().all(|m| !m.is_empty());
        if group_valid {
            out.push(user.clone());
            out.extend(models.iter().cloned());
        }
        i = j;
    }
    out
}

/// Merge runs of adjacent text parts into single parts.
pub(crate) fn coalesce_text_parts(parts: Vec<Part>) -> Vec<Part> {
    let mut out: Vec<Part> = Vec::with_capacity(parts.len());
    for part in parts {
        match (out.last_mut(), &part) {
            (Some(Part::Text { text: acc }), Part::Text { text }) => acc.push_str(text),
            _ => out.push(part),
        }
    }
    out
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use serde_json::Map;
    use skarv_model::{FunctionCall, RawChunk, ScriptedCall, ScriptedProvider};

    use super::*;

    fn session(provider: ScriptedProvider) -> ChatSession {
        session_with_config(provider, SessionConfig::default())
    }

    fn session_with_config(provider: ScriptedProvider, config: SessionConfig) -> ChatSession {
        ChatSession::new(Arc::new(provider), config)
    }

    fn fr_part(id: &str) -> Part {
        Part::function_response(id, "tool", Map::new())
    }

    // ── Curation ──────────────────────────────────────────────────────────────

    #[test]
    fn curation_keeps_valid_groups() {
        let history = vec![
            Message::user("q1"),
            Message::model("a1"),
            Message::user("q2"),
            Message::model("a2"),
        ];
        assert_eq!(curate(&history).len(), 4);
    }

    #[test]
    fn curation_drops_empty_model_group_with_its_user() {
        let history = vec![
            Message::user("q1"),
            Message::model_parts(vec![]),
            Message::user("q2"),
            Message::model("a2"),
        ];
        let curated = curate(&history);
        assert_eq!(curated.len(), 2);
        assert_eq!(curated[0].text(), "q2");
    }

    #[test]
    fn one_empty_model_reply_invalidates_the_whole_group() {
        let history = vec![
            Message::user("q"),
            Message::model("partial"),
            Message::model_parts(vec![]),
        ];
        assert!(curate(&history).is_empty());
    }

    #[test]
    fn curation_drops_stray_leading_model_messages() {
        let history = vec![Message::model("orphan"), Message::user("q"), Message::model("a")];
        let curated = curate(&history);
        assert_eq!(curated.len(), 2);
        assert_eq!(curated[0].role, Role::User);
    }

    #[test]
    fn trailing_user_message_survives_curation() {
        let history = vec![Message::user("pending question")];
        assert_eq!(curate(&history).len(), 1);
    }

    #[test]
    fn curated_view_alternates_and_starts_with_user() {
        let history = vec![
            Message::user("q1"),
            Message::model_parts(vec![]),
            Message::user("q2"),
            Message::model("a2"),
            Message::user("q3"),
            Message::model("a3"),
        ];
        let curated = curate(&history);
        assert_eq!(curated[0].role, Role::User);
        for pair in curated.windows(2) {
            assert_ne!(pair[0].role, pair[1].role, "roles must alternate");
        }
        assert!(curated.iter().all(|m| !m.is_empty()));
    }

    #[test]
    fn set_history_get_history_is_identity() {
        let mut s = session(ScriptedProvider::new(vec![]));
        let history = vec![Message::user("a"), Message::model("b")];
        s.set_history(history.clone());
        assert_eq!(s.history(false), history);
        let snapshot = s.history(false);
        s.set_history(snapshot);
        assert_eq!(s.history(false), history);
    }

    // ── Merge rules ───────────────────────────────────────────────────────────

    #[test]
    fn thought_parts_are_dropped_from_model_output() {
        let mut s = session(ScriptedProvider::new(vec![]));
        s.add_history(Message::user("q"));
        s.record_model_output(
            vec![Message::model_parts(vec![
                Part::Thought {
                    subject: "Plan".into(),
                    description: "hmm".into(),
                },
                Part::text("answer"),
            ])],
            false,
        );
        let last = s.history(false).pop().unwrap();
        assert_eq!(last.parts, vec![Part::text("answer")]);
    }

    #[test]
    fn contentless_output_appends_empty_model_message() {
        let mut s = session(ScriptedProvider::new(vec![]));
        s.add_history(Message::user("q"));
        s.record_model_output(vec![Message::model_parts(vec![])], false);
        let history = s.history(false);
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].role, Role::Model);
        assert!(history[1].is_empty());
    }

    #[test]
    fn contentless_output_after_function_response_appends_nothing() {
        let mut s = session(ScriptedProvider::new(vec![]));
        s.add_history(Message::user_parts(vec![fr_part("c1")]));
        s.record_model_output(vec![Message::model_parts(vec![])], true);
        assert_eq!(s.history(false).len(), 1);
    }

    #[test]
    fn adjacent_text_parts_coalesce() {
        let mut s = session(ScriptedProvider::new(vec![]));
        s.add_history(Message::user("q"));
        s.record_model_output(
            vec![Message::model_parts(vec![
                Part::text("Hello, "),
                Part::text("world."),
            ])],
            false,
        );
        let last = s.history(false).pop().unwrap();
        assert_eq!(last.parts, vec![Part::text("Hello, world.")]);
    }

    #[test]
    fn text_only_output_merges_into_trailing_text_model_entry() {
        let mut s = session(ScriptedProvider::new(vec![]));
        s.add_history(Message::user("q"));
        s.add_history(Message::model("part one"));
        s.record_model_output(vec![Message::model(" part two")], false);
        let history = s.history(false);
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].text(), "part one part two");
    }

    #[test]
    fn function_call_output_appends_instead_of_merging() {
        let mut s = session(ScriptedProvider::new(vec![]));
        s.add_history(Message::user("q"));
        s.add_history(Message::model("text"));
        s.record_model_output(
            vec![Message::model_parts(vec![Part::function_call(FunctionCall {
                id: Some("c1".into()),
                name: "ls".into(),
                args: Map::new(),
            })])],
            false,
        );
        assert_eq!(s.history(false).len(), 3);
    }

    #[test]
    fn coalesce_preserves_non_text_boundaries() {
        let parts = vec![
            Part::text("a"),
            Part::function_call(FunctionCall {
                id: None,
                name: "t".into(),
                args: Map::new(),
            }),
            Part::text("b"),
            Part::text("c"),
        ];
        let merged = coalesce_text_parts(parts);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[2], Part::text("bc"));
    }

    // ── Sending ───────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn send_stream_appends_user_message_and_uses_curated_view() {
        let provider = ScriptedProvider::always_text("hi");
        let requests = Arc::clone(&provider.requests);
        let mut s = session(provider);
        // An invalid group that curation must exclude from the request.
        s.add_history(Message::user("bad"));
        s.add_history(Message::model_parts(vec![]));

        let _ = s
            .send_stream(vec![Part::text("hello")], CancellationToken::new())
            .await
            .unwrap();

        let req = requests.lock().unwrap().pop().unwrap();
        assert_eq!(req.messages.len(), 1, "only the new user message survives");
        assert_eq!(req.messages[0].text(), "hello");
        assert_eq!(s.history(false).len(), 3);
    }

    #[tokio::test]
    async fn transient_send_errors_are_retried() {
        let provider = ScriptedProvider::new(vec![
            ScriptedCall::Fail(ModelError::Status {
                code: 503,
                message: "overloaded".into(),
            }),
            ScriptedCall::Stream(vec![Ok(RawChunk::text("recovered"))]),
        ]);
        let mut config = SessionConfig::default();
        config.retry_base_delay_ms = 1;
        let mut s = session_with_config(provider, config);
        let mut stream = s
            .send_stream(vec![Part::text("go")], CancellationToken::new())
            .await
            .unwrap();
        let chunk = stream.next().await.unwrap().unwrap();
        assert_eq!(chunk.parts[0].text.as_deref(), Some("recovered"));
    }

    #[tokio::test]
    async fn persistent_rate_limit_with_oauth_switches_to_fallback() {
        let rate_limited = || ScriptedCall::Fail(ModelError::Status {
            code: 429,
            message: "quota".into(),
        });
        let provider = ScriptedProvider::new(vec![
            rate_limited(),
            rate_limited(),
            ScriptedCall::Stream(vec![Ok(RawChunk::text("on fallback"))]),
        ]);
        let requests = Arc::clone(&provider.requests);
        let mut config = SessionConfig::default();
        config.model = "primary-model".into();
        config.fallback_model = "fallback-model".into();
        config.auth = AuthKind::Oauth;
        config.retry_attempts = 2;
        config.retry_base_delay_ms = 1;
        let mut s = session_with_config(provider, config)
            .with_fallback_handler(Arc::new(|_, _| true));

        let _ = s
            .send_stream(vec![Part::text("go")], CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(s.model(), "fallback-model");
        let last = requests.lock().unwrap().pop().unwrap();
        assert_eq!(last.model, "fallback-model");
    }

    #[tokio::test]
    async fn rate_limit_with_api_key_is_not_switched() {
        let rate_limited = || ScriptedCall::Fail(ModelError::Status {
            code: 429,
            message: "quota".into(),
        });
        let provider = ScriptedProvider::new(vec![rate_limited(), rate_limited()]);
        let mut config = SessionConfig::default();
        config.retry_attempts = 2;
        config.retry_base_delay_ms = 1;
        let mut s = session_with_config(provider, config)
            .with_fallback_handler(Arc::new(|_, _| true));
        let err = match s
            .send_stream(vec![Part::text("go")], CancellationToken::new())
            .await
        {
            Err(e) => e,
            Ok(_) => panic!("called `Result::unwrap_err()` on an `Ok` value"),
        };
        assert!(err.is_rate_limit());
    }

    // ── Compression ───────────────────────────────────────────────────────────

    fn long_session(provider: ScriptedProvider) -> ChatSession {
        let mut config = SessionConfig::default();
        config.model = "mystery-model".into(); // default 131072-token window
        let mut s = session_with_config(provider, config);
        s.add_history(Message::user("old question"));
        s.add_history(Message::model("old answer"));
        s
    }

    #[tokio::test]
    async fn below_threshold_does_not_compress() {
        // 0.95 × 131072 = 124518; stay just below.
        let provider = ScriptedProvider::new(vec![]).with_token_counts(vec![Some(124_517)]);
        let mut s = long_session(provider);
        let out = s
            .try_compress(false, &CancellationToken::new())
            .await
            .unwrap();
        assert!(out.is_none());
        assert_eq!(s.history(false).len(), 2, "history untouched");
    }

    #[tokio::test]
    async fn at_threshold_compresses_and_reseeds() {
        let provider = ScriptedProvider::new(vec![ScriptedCall::Stream(vec![Ok(
            RawChunk::text("dense summary"),
        )])])
        .with_token_counts(vec![Some(124_518), Some(12)]);
        let mut s = long_session(provider);
        let snap = s
            .try_compress(false, &CancellationToken::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snap.original_token_count, 124_518);
        assert_eq!(snap.new_token_count, 12);

        let history = s.history(false);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert!(history[0].text().contains("dense summary"));
        assert_eq!(history[1].text(), COMPRESSION_ACK);
    }

    #[tokio::test]
    async fn forced_compression_ignores_threshold() {
        let provider = ScriptedProvider::new(vec![ScriptedCall::Stream(vec![Ok(
            RawChunk::text("tiny summary"),
        )])])
        .with_token_counts(vec![Some(10), Some(4)]);
        let mut s = long_session(provider);
        let snap = s
            .try_compress(true, &CancellationToken::new())
            .await
            .unwrap();
        assert!(snap.is_some());
    }

    #[tokio::test]
    async fn compression_preserves_env_preamble() {
        let provider = ScriptedProvider::new(vec![ScriptedCall::Stream(vec![Ok(
            RawChunk::text("summary"),
        )])])
        .with_token_counts(vec![Some(500_000), Some(20)]);
        let mut config = SessionConfig::default();
        config.model = "mystery-model".into();
        let mut s = session_with_config(provider, config).with_env_preamble(vec![
            Message::user("environment: linux"),
            Message::model("Understood."),
        ]);
        s.add_history(Message::user("old"));
        s.add_history(Message::model("older answer"));

        let snap = s
            .try_compress(false, &CancellationToken::new())
            .await
            .unwrap();
        assert!(snap.is_some());
        let history = s.history(false);
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].text(), "environment: linux");
        assert!(history[2].text().contains("summary"));
    }

    #[tokio::test]
    async fn empty_summary_keeps_history() {
        let provider = ScriptedProvider::new(vec![ScriptedCall::Stream(vec![Ok(
            RawChunk::text("  "),
        )])])
        .with_token_counts(vec![Some(500_000)]);
        let mut s = long_session(provider);
        let out = s
            .try_compress(false, &CancellationToken::new())
            .await
            .unwrap();
        assert!(out.is_none());
        assert_eq!(s.history(false).len(), 2);
    }

    #[tokio::test]
    async fn unknown_token_count_skips_unforced_compression() {
        let provider = ScriptedProvider::new(vec![]).with_token_counts(vec![None]);
        let mut s = long_session(provider);
        let out = s
            .try_compress(false, &CancellationToken::new())
            .await
            .unwrap();
        assert!(out.is_none());
    }
}

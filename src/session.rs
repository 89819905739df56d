use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::backend::SummaryBackend;
use crate::models::{
    BackendReply, ChatMessage, ChatRequest, PaperContext, QuestionRequest, Role, UpdateRequest,
};

pub const GREETING: &str =
    "Hi! I can help you answer questions about the summary or update it. What would you like to do?";
pub const SUMMARY_UPDATED_NOTICE: &str = "✅ New summary has been generated!";
pub const QUESTION_MODE_NOTICE: &str =
    "Switched to question-answering mode. Ask me anything about the summary!";
pub const UPDATE_MODE_NOTICE: &str =
    "Switched to summary update mode. Let me know how you'd like to modify the summary.";

const APP_FAILURE_MESSAGE: &str =
    "Sorry, I encountered an error processing your request. Please try again.";
const TRANSPORT_FAILURE_MESSAGE: &str =
    "Sorry, there was a problem connecting to the server. Please try again later.";

const UPDATE_INTENT_KEYWORDS: [&str; 8] = [
    "update", "modify", "change", "refine", "revise", "rewrite", "edit", "alter",
];

/// Which remote operation a request targets. The persisted session mode only
/// changes on an explicit switch; keyword inference can override it for a
/// single request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Question,
    Update,
}

/// Transient, toast-style notification. Observable side effect of a submit,
/// distinct from the messages appended to the log.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "kind", content = "message")]
pub enum Notice {
    Success(String),
    Failure(String),
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// Question answered (or update call that changed nothing).
    Answered,
    /// The authoritative summary was replaced.
    Updated,
    /// Transport or application failure, absorbed into the log.
    Failed,
    /// The response no longer matched the session's outstanding request.
    Discarded,
}

/// A dispatched-but-uncompleted submit. The sequence number captured here is
/// compared against the session's outstanding sequence on completion, so a
/// response that arrives after `reset()` is discarded instead of applied.
#[derive(Debug)]
pub struct PendingSubmit {
    seq: u64,
    effective_mode: Mode,
    pub request: ChatRequest,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitReport {
    pub outcome: SubmitOutcome,
    /// Messages appended to the log while completing this submit, in order.
    pub appended: Vec<ChatMessage>,
    pub notices: Vec<Notice>,
    pub summary_updated: bool,
}

impl SubmitReport {
    fn discarded() -> Self {
        Self {
            outcome: SubmitOutcome::Discarded,
            appended: Vec::new(),
            notices: Vec::new(),
            summary_updated: false,
        }
    }
}

pub type SummaryCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// One user's refinement conversation over one summary. Owns the message log
/// and the authoritative summary text; every mutation flows through
/// `begin_submit`/`complete_submit`, `switch_mode`, or `reset`.
pub struct ChatSession {
    context: PaperContext,
    current_summary: String,
    mode: Mode,
    history: Vec<ChatMessage>,
    next_seq: u64,
    in_flight: Option<u64>,
    on_summary_update: SummaryCallback,
}

impl ChatSession {
    pub fn new(context: PaperContext, on_summary_update: SummaryCallback) -> Self {
        let current_summary = context.summary.clone();
        Self {
            context,
            current_summary,
            mode: Mode::Question,
            history: vec![ChatMessage::system(GREETING)],
            next_seq: 0,
            in_flight: None,
            on_summary_update,
        }
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn current_summary(&self) -> &str {
        &self.current_summary
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Validate the input, append the user turn, and build the outbound
    /// request. Returns `None` (and changes nothing) for blank input or
    /// while a prior request is outstanding.
    pub fn begin_submit(&mut self, text: &str) -> Option<PendingSubmit> {
        let trimmed = text.trim();
        if trimmed.is_empty() || self.in_flight.is_some() {
            return None;
        }

        // The upstream history must not contain the turn being submitted;
        // the service appends the new user message itself.
        let upstream = self.upstream_history();
        self.history.push(ChatMessage::user(trimmed));

        let effective_mode = resolve_effective_mode(self.mode, trimmed);
        let request = match effective_mode {
            Mode::Update => ChatRequest::Update(UpdateRequest::new(
                &self.current_summary,
                trimmed,
                upstream,
                &self.context,
            )),
            Mode::Question => ChatRequest::Question(QuestionRequest::new(
                &self.current_summary,
                trimmed,
                upstream,
                &self.context,
            )),
        };

        let seq = self.next_seq;
        self.next_seq += 1;
        self.in_flight = Some(seq);

        Some(PendingSubmit {
            seq,
            effective_mode,
            request,
        })
    }

    /// Apply the backend's result for a previously begun submit. Every
    /// failure is absorbed into the log; nothing escapes to the caller.
    pub fn complete_submit(
        &mut self,
        pending: PendingSubmit,
        result: Result<BackendReply>,
    ) -> SubmitReport {
        if self.in_flight != Some(pending.seq) {
            // The session was reset while this request was in flight.
            info!(seq = pending.seq, "discarding stale refinement response");
            return SubmitReport::discarded();
        }
        self.in_flight = None;

        match result {
            Ok(reply) if reply.success => self.apply_reply(pending.effective_mode, reply),
            Ok(reply) => {
                let notice = reply
                    .error
                    .unwrap_or_else(|| "Failed to get a response".to_string());
                warn!(error = %notice, "refinement service reported failure");
                self.absorb_failure(notice, APP_FAILURE_MESSAGE)
            }
            Err(err) => {
                warn!(error = %err, "refinement request failed");
                self.absorb_failure(
                    "Failed to connect to the chatbot service".to_string(),
                    TRANSPORT_FAILURE_MESSAGE,
                )
            }
        }
    }

    /// Convenience wrapper chaining `begin_submit`, the network call, and
    /// `complete_submit`. Returns `None` when the input was a no-op.
    pub async fn submit(
        &mut self,
        backend: &dyn SummaryBackend,
        text: &str,
    ) -> Option<SubmitReport> {
        let pending = self.begin_submit(text)?;
        let result = backend.dispatch(&pending.request).await;
        Some(self.complete_submit(pending, result))
    }

    /// Explicit mode switch. Appends one system message describing the new
    /// mode; switching to the current mode is a no-op.
    pub fn switch_mode(&mut self, new_mode: Mode) -> Option<ChatMessage> {
        if self.mode == new_mode {
            return None;
        }
        self.mode = new_mode;

        let notice = match new_mode {
            Mode::Question => ChatMessage::system(QUESTION_MODE_NOTICE),
            Mode::Update => ChatMessage::system(UPDATE_MODE_NOTICE),
        };
        self.history.push(notice.clone());
        Some(notice)
    }

    /// Drop the conversation and any outstanding request, restore the
    /// original summary, and fall back to question mode. A response still in
    /// flight will be discarded when it completes.
    pub fn reset(&mut self) {
        self.in_flight = None;
        self.history = vec![ChatMessage::system(GREETING)];
        self.mode = Mode::Question;

        if self.current_summary != self.context.summary {
            self.current_summary = self.context.summary.clone();
            (self.on_summary_update)(&self.current_summary);
        }
    }

    fn upstream_history(&self) -> Vec<ChatMessage> {
        self.history
            .iter()
            .filter(|message| message.role != Role::System)
            .cloned()
            .collect()
    }

    fn apply_reply(&mut self, effective_mode: Mode, reply: BackendReply) -> SubmitReport {
        let mut summary_updated = false;

        if effective_mode == Mode::Update {
            let refined = reply
                .refined_summary
                .as_deref()
                .map(str::trim)
                .filter(|text| !text.is_empty());
            if let Some(refined) = refined {
                if refined != self.current_summary {
                    self.current_summary = refined.to_string();
                    summary_updated = true;
                    (self.on_summary_update)(&self.current_summary);
                    info!(chars = self.current_summary.len(), "summary replaced by refinement");
                }
            }
        }

        let mut appended = Vec::new();
        if summary_updated {
            appended.push(ChatMessage::system(SUMMARY_UPDATED_NOTICE));
        }
        if let Some(assistant) = reply
            .chat_history
            .last()
            .filter(|message| message.role == Role::Assistant)
        {
            appended.push(assistant.clone());
        }
        self.history.extend(appended.iter().cloned());

        let mut notices = Vec::new();
        if summary_updated {
            notices.push(Notice::Success(
                "Summary has been updated successfully!".to_string(),
            ));
        }

        SubmitReport {
            outcome: if summary_updated {
                SubmitOutcome::Updated
            } else {
                SubmitOutcome::Answered
            },
            appended,
            notices,
            summary_updated,
        }
    }

    fn absorb_failure(&mut self, notice: String, chat_text: &str) -> SubmitReport {
        let message = ChatMessage::assistant(chat_text);
        self.history.push(message.clone());

        SubmitReport {
            outcome: SubmitOutcome::Failed,
            appended: vec![message],
            notices: vec![Notice::Failure(notice)],
            summary_updated: false,
        }
    }
}

/// Which operation one specific request should use. An update-intent keyword
/// directly followed by "summary"/"the summary", or standing as the first
/// token, forces update mode for that request only; the persisted mode is
/// never mutated here.
pub fn resolve_effective_mode(persisted: Mode, input: &str) -> Mode {
    if persisted == Mode::Update {
        return Mode::Update;
    }

    let lower = input.to_lowercase();
    for keyword in UPDATE_INTENT_KEYWORDS {
        if lower.contains(&format!("{keyword} the summary"))
            || lower.contains(&format!("{keyword} summary"))
        {
            return Mode::Update;
        }
    }

    let first_token = lower
        .split_whitespace()
        .next()
        .map(|token| token.trim_matches(|c: char| !c.is_alphanumeric()));
    if let Some(first) = first_token {
        if UPDATE_INTENT_KEYWORDS.contains(&first) {
            return Mode::Update;
        }
    }

    Mode::Question
}

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One turn of the conversation. System messages are synthetic, generated
/// locally for in-UI notifications, and are never sent upstream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Read-only inputs supplied by the hosting page: the generated summary plus
/// the references and keywords extracted from the paper.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaperContext {
    pub summary: String,
    #[serde(default)]
    pub references: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateRequest {
    pub summary: String,
    pub user_message: String,
    pub chat_history: Vec<ChatMessage>,
    pub references: Vec<String>,
    pub keywords: Vec<String>,
}

impl UpdateRequest {
    pub fn new(
        summary: &str,
        user_message: &str,
        chat_history: Vec<ChatMessage>,
        context: &PaperContext,
    ) -> Self {
        Self {
            summary: summary.to_string(),
            user_message: user_message.to_string(),
            chat_history,
            references: context.references.clone(),
            keywords: context.keywords.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionRequest {
    pub summary: String,
    pub user_question: String,
    pub chat_history: Vec<ChatMessage>,
    pub references: Vec<String>,
    pub keywords: Vec<String>,
}

impl QuestionRequest {
    pub fn new(
        summary: &str,
        user_question: &str,
        chat_history: Vec<ChatMessage>,
        context: &PaperContext,
    ) -> Self {
        Self {
            summary: summary.to_string(),
            user_question: user_question.to_string(),
            chat_history,
            references: context.references.clone(),
            keywords: context.keywords.clone(),
        }
    }
}

/// The two wire shapes the refinement service accepts. Each variant maps to
/// its own endpoint and is built by its own constructor, so a request body
/// never grows fields at runtime.
#[derive(Debug, Clone)]
pub enum ChatRequest {
    Update(UpdateRequest),
    Question(QuestionRequest),
}

/// Parsed response body shared by both endpoints. `refined_summary` is only
/// ever present on the update endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackendReply {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub refined_summary: Option<String>,
    #[serde(default)]
    pub chat_history: Vec<ChatMessage>,
    #[serde(default)]
    pub error: Option<String>,
}

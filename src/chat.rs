//! UI-free conversation state for the contract expert chat.
//!
//! The [`Conversation`] owns the transcript, the draft buffer, the
//! optional attached contract code, and the pending flag. It talks to
//! the backend through the [`ChatGateway`] trait so the whole
//! submission lifecycle can be exercised against a scripted gateway.

use std::time::SystemTime;

use async_trait::async_trait;
use thiserror::Error;

use crate::backend::RemoteCallError;

/// Greeting seeded into every fresh conversation.
pub const WELCOME_MESSAGE: &str = "👋 Hi! I'm your Smart Contract Expert Assistant. I can help you:\n\n\
• Explain smart contract code\n\
• Identify security vulnerabilities\n\
• Suggest optimizations\n\
• Answer blockchain questions\n\
• Review contract logic\n\n\
Feel free to paste your contract code or ask me anything about smart contracts!";

const CLEARED_MESSAGE: &str = "Chat cleared! Ready to help with more smart contract questions.";

/// Chat-facing slice of the backend gateway. `BackendClient` is the
/// real implementation; tests script their own.
#[async_trait]
pub trait ChatGateway {
    async fn send_chat_message(&self, message: &str) -> Result<String, RemoteCallError>;
    async fn explain_smart_contract(
        &self,
        contract_code: &str,
        question: &str,
    ) -> Result<String, RemoteCallError>;
    async fn clear_chat_history(&self) -> Result<String, RemoteCallError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// Identifier for one message, unique within its conversation.
///
/// Drawn from a monotonic counter, never from the clock: two messages
/// created within the same clock tick still get distinct ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageId(pub u64);

#[derive(Debug, Clone)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub created_at: SystemTime,
}

#[derive(Debug, Error)]
pub enum ChatError {
    /// Empty or whitespace-only draft; rejected before any gateway call.
    #[error("message is empty")]
    EmptyMessage,
    /// Another call for this conversation is still in flight.
    #[error("a request is already in flight")]
    RequestInFlight,
    #[error(transparent)]
    Remote(#[from] RemoteCallError),
}

/// The gateway call a submission resolved to. Carries everything the
/// network leg needs so it can run on a spawned task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCall {
    Message { text: String },
    Explain { contract_code: String, question: String },
}

impl ChatCall {
    pub async fn dispatch<G: ChatGateway + ?Sized>(
        &self,
        gateway: &G,
    ) -> Result<String, RemoteCallError> {
        match self {
            ChatCall::Message { text } => gateway.send_chat_message(text).await,
            ChatCall::Explain {
                contract_code,
                question,
            } => gateway.explain_smart_contract(contract_code, question).await,
        }
    }
}

/// One chat session: ordered transcript plus attached contract code,
/// scoped to a single view. Nothing here is persisted.
pub struct Conversation {
    messages: Vec<Message>,
    next_id: u64,
    draft: String,
    contract_code: String,
    pending: bool,
    last_error: Option<String>,
}

impl Conversation {
    pub fn new() -> Self {
        let mut conversation = Self {
            messages: Vec::new(),
            next_id: 0,
            draft: String::new(),
            contract_code: String::new(),
            pending: false,
            last_error: None,
        };
        conversation.push_message(Role::Assistant, WELCOME_MESSAGE.to_string());
        conversation
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn pending(&self) -> bool {
        self.pending
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    /// Mutable draft buffer, for cursor-based editing in the input box.
    pub fn draft_mut(&mut self) -> &mut String {
        &mut self.draft
    }

    pub fn contract_code(&self) -> &str {
        &self.contract_code
    }

    pub fn contract_code_mut(&mut self) -> &mut String {
        &mut self.contract_code
    }

    pub fn set_contract_code(&mut self, code: impl Into<String>) {
        self.contract_code = code.into();
    }

    pub fn clear_contract_code(&mut self) {
        self.contract_code.clear();
    }

    /// Whether a submission would be routed to `explain_smart_contract`
    /// instead of `send_chat_message`.
    pub fn has_contract_code(&self) -> bool {
        !self.contract_code.trim().is_empty()
    }

    /// Validate the draft and move the conversation into its pending
    /// state. Returns the gateway call the caller must dispatch; the
    /// outcome comes back through [`Conversation::complete_submit`].
    ///
    /// Rejected drafts (empty, or another call in flight) leave the
    /// conversation untouched.
    pub fn begin_submit(&mut self) -> Result<ChatCall, ChatError> {
        if self.pending {
            return Err(ChatError::RequestInFlight);
        }
        let text = self.draft.trim().to_string();
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        // Contract code is passed through exactly as attached; only the
        // question is trimmed.
        let call = if self.has_contract_code() {
            ChatCall::Explain {
                contract_code: self.contract_code.clone(),
                question: text.clone(),
            }
        } else {
            ChatCall::Message { text: text.clone() }
        };

        self.push_message(Role::User, text);
        self.draft.clear();
        self.pending = true;
        self.last_error = None;
        Ok(call)
    }

    /// Apply the outcome of a dispatched call: append the assistant
    /// reply on success, record the error otherwise. Either way the
    /// conversation returns to idle.
    pub fn complete_submit(
        &mut self,
        outcome: Result<String, RemoteCallError>,
    ) -> Result<(), ChatError> {
        self.pending = false;
        match outcome {
            Ok(reply) => {
                self.push_message(Role::Assistant, reply);
                Ok(())
            }
            Err(err) => {
                self.last_error = Some(err.to_string());
                Err(ChatError::Remote(err))
            }
        }
    }

    /// One full submission round trip. The TUI splits this into
    /// [`Conversation::begin_submit`] plus a spawned dispatch so the
    /// spinner keeps moving; headless callers use the composed form.
    pub async fn submit<G: ChatGateway + ?Sized>(&mut self, gateway: &G) -> Result<(), ChatError> {
        let call = self.begin_submit()?;
        self.complete_submit(call.dispatch(gateway).await)
    }

    /// Clear the server-side history, then the local transcript. A
    /// failed gateway call leaves the transcript and attached contract
    /// code untouched, so the UI never shows a cleared state the
    /// backend does not have.
    pub async fn clear<G: ChatGateway + ?Sized>(&mut self, gateway: &G) -> Result<(), ChatError> {
        if self.pending {
            return Err(ChatError::RequestInFlight);
        }
        let confirmation = gateway.clear_chat_history().await.map_err(|err| {
            self.last_error = Some(err.to_string());
            ChatError::from(err)
        })?;
        tracing::debug!(%confirmation, "chat history cleared");

        self.messages.clear();
        self.contract_code.clear();
        self.last_error = None;
        self.push_message(Role::Assistant, CLEARED_MESSAGE.to_string());
        Ok(())
    }

    fn push_message(&mut self, role: Role, content: String) {
        self.next_id += 1;
        let message = Message {
            id: MessageId(self.next_id),
            role,
            content,
            created_at: SystemTime::now(),
        };
        tracing::trace!(id = message.id.0, role = ?message.role, "message appended");
        self.messages.push(message);
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Gateway double that records every call and answers from a script.
    #[derive(Default)]
    struct ScriptedGateway {
        reply: Option<String>,
        clear_confirmation: Option<String>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedGateway {
        fn answering(reply: &str) -> Self {
            Self {
                reply: Some(reply.to_string()),
                clear_confirmation: Some("cleared".to_string()),
                ..Self::default()
            }
        }

        fn failing() -> Self {
            Self::default()
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn fail() -> RemoteCallError {
            RemoteCallError::Backend {
                status: 503,
                message: "backend unavailable".to_string(),
            }
        }
    }

    #[async_trait]
    impl ChatGateway for ScriptedGateway {
        async fn send_chat_message(&self, message: &str) -> Result<String, RemoteCallError> {
            self.calls.lock().unwrap().push(format!("chat:{message}"));
            self.reply.clone().ok_or_else(Self::fail)
        }

        async fn explain_smart_contract(
            &self,
            contract_code: &str,
            question: &str,
        ) -> Result<String, RemoteCallError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("explain:{contract_code}|{question}"));
            self.reply.clone().ok_or_else(Self::fail)
        }

        async fn clear_chat_history(&self) -> Result<String, RemoteCallError> {
            self.calls.lock().unwrap().push("clear".to_string());
            self.clear_confirmation.clone().ok_or_else(Self::fail)
        }
    }

    #[test]
    fn new_conversation_is_seeded_with_a_welcome_message() {
        let conversation = Conversation::new();
        assert_eq!(conversation.messages().len(), 1);
        assert_eq!(conversation.messages()[0].role, Role::Assistant);
        assert!(!conversation.pending());
    }

    #[tokio::test]
    async fn successful_submit_appends_user_then_assistant() {
        let gateway = ScriptedGateway::answering("Reentrancy is...");
        let mut conversation = Conversation::new();
        conversation.draft_mut().push_str("What is reentrancy?");

        conversation.submit(&gateway).await.unwrap();

        let messages = conversation.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].content, "What is reentrancy?");
        assert_eq!(messages[2].role, Role::Assistant);
        assert_eq!(messages[2].content, "Reentrancy is...");
        assert!(!conversation.pending());
        assert!(conversation.last_error().is_none());
        assert_eq!(conversation.draft(), "");
    }

    #[tokio::test]
    async fn whitespace_draft_never_reaches_the_gateway() {
        let gateway = ScriptedGateway::answering("unused");
        let mut conversation = Conversation::new();
        conversation.draft_mut().push_str("   ");

        let err = conversation.submit(&gateway).await.unwrap_err();

        assert!(matches!(err, ChatError::EmptyMessage));
        assert!(gateway.calls().is_empty());
        assert_eq!(conversation.messages().len(), 1);
        assert!(!conversation.pending());
    }

    #[tokio::test]
    async fn submitted_text_is_trimmed() {
        let gateway = ScriptedGateway::answering("ok");
        let mut conversation = Conversation::new();
        conversation.draft_mut().push_str("  hello \n");

        conversation.submit(&gateway).await.unwrap();

        assert_eq!(conversation.messages()[1].content, "hello");
        assert_eq!(gateway.calls(), vec!["chat:hello"]);
    }

    #[tokio::test]
    async fn failed_submit_keeps_the_user_message_only() {
        let gateway = ScriptedGateway::failing();
        let mut conversation = Conversation::new();
        conversation.draft_mut().push_str("What is a DAO?");

        let err = conversation.submit(&gateway).await.unwrap_err();

        assert!(matches!(err, ChatError::Remote(_)));
        let messages = conversation.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, Role::User);
        assert!(!conversation.pending());
        assert!(conversation.last_error().is_some());
    }

    #[tokio::test]
    async fn attached_contract_code_routes_to_explain() {
        let gateway = ScriptedGateway::answering("It's a contract.");
        let mut conversation = Conversation::new();
        conversation.set_contract_code("contract Foo {}");
        conversation.draft_mut().push_str("Explain this");

        conversation.submit(&gateway).await.unwrap();

        // Both arguments pass through unmodified.
        assert_eq!(gateway.calls(), vec!["explain:contract Foo {}|Explain this"]);
    }

    #[tokio::test]
    async fn whitespace_only_contract_code_still_uses_plain_chat() {
        let gateway = ScriptedGateway::answering("ok");
        let mut conversation = Conversation::new();
        conversation.set_contract_code("  \n ");
        conversation.draft_mut().push_str("hi");

        conversation.submit(&gateway).await.unwrap();

        assert_eq!(gateway.calls(), vec!["chat:hi"]);
    }

    #[test]
    fn begin_submit_is_rejected_while_pending() {
        let mut conversation = Conversation::new();
        conversation.draft_mut().push_str("first");
        conversation.begin_submit().unwrap();

        conversation.draft_mut().push_str("second");
        let err = conversation.begin_submit().unwrap_err();

        assert!(matches!(err, ChatError::RequestInFlight));
        // The rejected draft is preserved and no message was appended.
        assert_eq!(conversation.draft(), "second");
        assert_eq!(conversation.messages().len(), 2);
    }

    #[test]
    fn complete_submit_returns_the_conversation_to_idle_on_failure() {
        let mut conversation = Conversation::new();
        conversation.draft_mut().push_str("hello");
        let _call = conversation.begin_submit().unwrap();
        assert!(conversation.pending());

        let err = conversation
            .complete_submit(Err(ScriptedGateway::fail()))
            .unwrap_err();

        assert!(matches!(err, ChatError::Remote(_)));
        assert!(!conversation.pending());
        assert_eq!(conversation.messages().len(), 2);
    }

    #[tokio::test]
    async fn clear_reseeds_a_single_assistant_message() {
        let gateway = ScriptedGateway::answering("reply");
        let mut conversation = Conversation::new();
        conversation.set_contract_code("contract Foo {}");
        conversation.draft_mut().push_str("question");
        conversation.submit(&gateway).await.unwrap();
        assert_eq!(conversation.messages().len(), 3);

        conversation.clear(&gateway).await.unwrap();

        assert_eq!(conversation.messages().len(), 1);
        assert_eq!(conversation.messages()[0].role, Role::Assistant);
        assert_eq!(conversation.messages()[0].content, CLEARED_MESSAGE);
        assert_eq!(conversation.contract_code(), "");
    }

    #[tokio::test]
    async fn failed_clear_preserves_transcript_and_contract_code() {
        let answering = ScriptedGateway::answering("reply");
        let mut conversation = Conversation::new();
        conversation.set_contract_code("contract Foo {}");
        conversation.draft_mut().push_str("question");
        conversation.submit(&answering).await.unwrap();

        let failing = ScriptedGateway::failing();
        let err = conversation.clear(&failing).await.unwrap_err();

        assert!(matches!(err, ChatError::Remote(_)));
        assert_eq!(conversation.messages().len(), 3);
        assert_eq!(conversation.contract_code(), "contract Foo {}");
        assert!(conversation.last_error().is_some());
    }

    #[tokio::test]
    async fn message_ids_stay_monotonic_across_a_clear() {
        let gateway = ScriptedGateway::answering("reply");
        let mut conversation = Conversation::new();
        conversation.draft_mut().push_str("one");
        conversation.submit(&gateway).await.unwrap();

        let mut seen = conversation
            .messages()
            .iter()
            .map(|m| m.id)
            .collect::<Vec<_>>();

        conversation.clear(&gateway).await.unwrap();
        conversation.draft_mut().push_str("two");
        conversation.submit(&gateway).await.unwrap();
        seen.extend(conversation.messages().iter().map(|m| m.id));

        for pair in seen.windows(2) {
            assert!(pair[0] < pair[1], "ids must be strictly increasing");
        }
    }
}

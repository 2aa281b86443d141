//! The conversation coordinator: persists the user's message, resolves the
//! team's credential and vendor adapter, relays the streamed reply and
//! persists the assistant's answer.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use acacia_core::{
    CallerIdentity, ChatError, Conversation, Message, NewConversation, NewMessage, RequestContext,
    Role, StoredMessage, StreamChunk,
};
use acacia_llm::ProviderRegistry;
use acacia_tool_runtime::ChunkReceiver;

use crate::crypto::Decrypter;
use crate::store::ConversationStore;

const TITLE_MAX_CHARS: usize = 35;

/// How a reply ended, from the persistence point of view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// The assistant message is durable.
    Saved(StoredMessage),
    /// The caller saw the whole reply but saving it failed. Retry with
    /// [`ConversationService::save_assistant_reply`]; the model is not re-run.
    NotSaved { content: String, error: ChatError },
    /// The stream ended with an error; nothing was persisted.
    Aborted(ChatError),
    /// The consumer dropped the chunk receiver before the reply finished.
    Disconnected,
}

/// A reply in progress.
#[derive(Debug)]
pub struct ReplyStream {
    /// Content chunks then exactly one terminal chunk.
    pub chunks: mpsc::Receiver<StreamChunk>,
    /// Resolved before the terminal chunk is delivered.
    pub outcome: oneshot::Receiver<ReplyOutcome>,
}

pub struct ConversationService {
    store: Arc<dyn ConversationStore>,
    providers: Arc<ProviderRegistry>,
    decrypter: Arc<dyn Decrypter>,
    buffer: usize,
}

impl ConversationService {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        providers: Arc<ProviderRegistry>,
        decrypter: Arc<dyn Decrypter>,
    ) -> Self {
        Self {
            store,
            providers,
            decrypter,
            buffer: 32,
        }
    }

    /// Capacity of the channel handed to the caller.
    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer.max(1);
        self
    }

    /// Start a new conversation. The title is the first 35 characters of the
    /// initial message, with "..." appended when it was cut.
    pub async fn create_conversation(
        &self,
        caller: CallerIdentity,
        team_id: i64,
        provider: &str,
        model: &str,
        initial_message: &str,
    ) -> Result<Conversation, ChatError> {
        let conversation = self
            .store
            .create_conversation(NewConversation {
                user_id: caller.user_id,
                team_id,
                provider: provider.to_string(),
                model: model.to_string(),
                title: derive_title(initial_message),
            })
            .await
            .map_err(|e| {
                error!(error = %e, "failed to create conversation");
                ChatError::Persistence(e.to_string())
            })?;

        info!(
            conversation_id = conversation.id,
            user_id = caller.user_id,
            provider,
            model,
            "conversation created"
        );
        Ok(conversation)
    }

    /// Persist an assistant reply. Also the retry path after
    /// [`ReplyOutcome::NotSaved`].
    pub async fn save_assistant_reply(
        &self,
        conversation_id: i64,
        content: &str,
    ) -> Result<StoredMessage, ChatError> {
        persist_assistant(self.store.as_ref(), conversation_id, content.to_string()).await
    }

    /// Reply to a user message in an existing conversation.
    ///
    /// Everything that can fail before the vendor is contacted is returned
    /// here; later failures arrive as the terminal chunk of the stream.
    pub async fn reply_to_message(
        &self,
        context: RequestContext,
        conversation_id: i64,
        user_message: &str,
    ) -> Result<ReplyStream, ChatError> {
        info!(conversation_id, "reply requested");

        // The user's message is kept even if the reply never happens.
        self.store
            .create_message(NewMessage::new(conversation_id, Role::User, user_message))
            .await
            .map_err(|e| {
                error!(conversation_id, error = %e, "failed to save user message");
                ChatError::from(e)
            })?;

        let conversation = self
            .store
            .get_conversation_by_id(conversation_id)
            .await?
            .ok_or(ChatError::ConversationNotFound(conversation_id))?;

        let credential = self
            .store
            .get_credential_for_provider_and_team(conversation.team_id, &conversation.provider)
            .await?
            .ok_or_else(|| {
                warn!(
                    team_id = conversation.team_id,
                    provider = %conversation.provider,
                    "no credential for provider"
                );
                ChatError::CredentialMissing {
                    provider: conversation.provider.clone(),
                }
            })?;

        let api_key = self
            .decrypter
            .decrypt(&credential.encrypted_key)
            .map_err(|e| {
                error!(credential_id = credential.id, error = %e, "failed to decrypt API key");
                ChatError::Decryption(e.to_string())
            })?;

        let history: Vec<Message> = self
            .store
            .get_messages_by_conversation_id(conversation_id)
            .await?
            .iter()
            .map(StoredMessage::to_message)
            .collect();

        let adapter = self.providers.get_provider(&conversation.provider, &api_key)?;

        debug!(
            conversation_id,
            provider = %conversation.provider,
            model = %conversation.model,
            history_len = history.len(),
            "starting reply stream"
        );

        // A child token lets a disconnected consumer stop the producer
        // without cancelling the caller's own token.
        let stream_context = RequestContext {
            caller: context.caller,
            cancel: context.cancel.child_token(),
        };
        let stop_producer = stream_context.cancel.clone();
        let upstream = adapter.stream_with_tools(history, conversation.model.clone(), stream_context);

        let store = Arc::clone(&self.store);
        let credential_id = credential.id;
        tokio::spawn(async move {
            if let Err(e) = store.update_credential_last_used(credential_id).await {
                warn!(credential_id, error = %e, "failed to update credential last_used_at");
            }
        });

        let (tx, chunks) = mpsc::channel(self.buffer);
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            let result = relay(upstream, &tx, store.as_ref(), conversation_id).await;
            let (outcome, terminal) = match result {
                Relay::Finished { outcome, terminal } => (outcome, Some(terminal)),
                Relay::Disconnected => {
                    stop_producer.cancel();
                    (ReplyOutcome::Disconnected, None)
                }
            };
            // Nobody may be listening for the outcome; that is fine.
            let _ = outcome_tx.send(outcome);
            if let Some(terminal) = terminal {
                let _ = tx.send(terminal).await;
            }
        });

        Ok(ReplyStream {
            chunks,
            outcome: outcome_rx,
        })
    }
}

enum Relay {
    /// The producer finished; `terminal` still has to reach the consumer.
    Finished {
        outcome: ReplyOutcome,
        terminal: StreamChunk,
    },
    Disconnected,
}

/// Forward content chunks while accumulating them, then settle persistence
/// once the terminal chunk arrives.
async fn relay(
    mut upstream: ChunkReceiver,
    tx: &mpsc::Sender<StreamChunk>,
    store: &dyn ConversationStore,
    conversation_id: i64,
) -> Relay {
    let mut content = String::new();

    loop {
        let chunk = tokio::select! {
            biased;
            _ = tx.closed() => {
                info!(conversation_id, "consumer disconnected, stopping reply");
                return Relay::Disconnected;
            }
            chunk = upstream.recv() => match chunk {
                Some(chunk) => chunk,
                None => break,
            },
        };

        if chunk.done {
            let outcome = match &chunk.error {
                Some(err) => {
                    warn!(conversation_id, error = %err, "reply aborted");
                    ReplyOutcome::Aborted(err.clone())
                }
                None => match persist_assistant(store, conversation_id, content.clone()).await {
                    Ok(message) => ReplyOutcome::Saved(message),
                    Err(error) => ReplyOutcome::NotSaved { content, error },
                },
            };
            return Relay::Finished {
                outcome,
                terminal: chunk,
            };
        }

        content.push_str(&chunk.content);
        if tx.send(chunk).await.is_err() {
            info!(conversation_id, "consumer disconnected, stopping reply");
            return Relay::Disconnected;
        }
    }

    // The producer always ends with a terminal chunk unless its task died.
    let err = ChatError::Provider("reply stream ended unexpectedly".to_string());
    error!(conversation_id, "producer closed without a terminal chunk");
    Relay::Finished {
        outcome: ReplyOutcome::Aborted(err.clone()),
        terminal: StreamChunk::failed(err),
    }
}

async fn persist_assistant(
    store: &dyn ConversationStore,
    conversation_id: i64,
    content: String,
) -> Result<StoredMessage, ChatError> {
    let len = content.len();
    match store
        .create_message(NewMessage::new(conversation_id, Role::Assistant, content))
        .await
    {
        Ok(message) => {
            info!(conversation_id, message_id = message.id, len, "assistant reply saved");
            Ok(message)
        }
        Err(e) => {
            error!(conversation_id, error = %e, "failed to save assistant reply");
            Err(ChatError::AssistantNotSaved(e.to_string()))
        }
    }
}

fn derive_title(initial_message: &str) -> String {
    match initial_message.char_indices().nth(TITLE_MAX_CHARS) {
        Some((cut, _)) => format!("{}...", &initial_message[..cut]),
        None => initial_message.to_string(),
    }
}

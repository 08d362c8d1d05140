//! Interaction response lifecycle.
//!
//! Each interaction carries one server-issued token. The first call must be
//! the response ([`InteractionContext::generate_response`]); after that any
//! number of followups may be sent with the same token. The lifecycle is
//! tracked by [`InteractionToken`]:
//!
//! ```text
//! NEW ──generate_response──▶ RESPONDED ──generate_followup──▶ RESPONDED (+followup)
//! ```
//!
//! Token expiry is not tracked locally; a stale token surfaces as an HTTP
//! error from the REST client.

use std::ops::Deref;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Value, json};
use tracing::debug;

use tether_core::model::{
    AutocompleteChoice, Interaction, InteractionResponse, Message, MessageFlags, MessagePayload,
    ResponseKind,
};
use tether_core::{BoxedRestClient, Id};

use crate::error::{ResponseResult, StateError};

// ============================================================================
// Token state
// ============================================================================

#[derive(Debug, Default)]
struct TokenState {
    response: Option<ResponseKind>,
    last_followup: Option<Id>,
}

/// Lifecycle state bound to one interaction occurrence.
#[derive(Debug)]
pub struct InteractionToken {
    interaction_id: Id,
    application_id: Id,
    token: String,
    state: Mutex<TokenState>,
}

impl InteractionToken {
    /// Creates the token state for an interaction.
    pub fn new(interaction_id: Id, application_id: Id, token: impl Into<String>) -> Self {
        Self {
            interaction_id,
            application_id,
            token: token.into(),
            state: Mutex::new(TokenState::default()),
        }
    }

    pub fn interaction_id(&self) -> Id {
        self.interaction_id
    }

    pub fn application_id(&self) -> Id {
        self.application_id
    }

    /// The continuation token used by every response and followup call.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Returns the kind of the generated response, if any.
    pub fn response_kind(&self) -> Option<ResponseKind> {
        self.state.lock().response
    }

    /// Returns true while no response has been generated.
    pub fn can_respond(&self) -> bool {
        self.state.lock().response.is_none()
    }

    /// Moves NEW to RESPONDED. Fails on every call after the first.
    pub fn mark_responded(&self, kind: ResponseKind) -> Result<(), StateError> {
        let mut state = self.state.lock();
        if state.response.is_some() {
            return Err(StateError::AlreadyResponded);
        }
        state.response = Some(kind);
        Ok(())
    }

    /// Fails unless a response has been generated.
    pub fn require_response(&self) -> Result<ResponseKind, StateError> {
        self.state.lock().response.ok_or(StateError::NotResponded)
    }

    /// Returns the most recently sent followup.
    pub fn last_followup(&self) -> Option<Id> {
        self.state.lock().last_followup
    }

    fn remember_followup(&self, message_id: Id) {
        self.state.lock().last_followup = Some(message_id);
    }

    fn forget_followup(&self, message_id: Id) {
        let mut state = self.state.lock();
        if state.last_followup == Some(message_id) {
            state.last_followup = None;
        }
    }

    fn followup_target(&self, explicit: Option<Id>) -> Result<Id, StateError> {
        explicit
            .or_else(|| self.last_followup())
            .ok_or(StateError::NoFollowup)
    }
}

// ============================================================================
// Context
// ============================================================================

/// The handle a callback uses to answer an interaction.
///
/// Dereferences to the [`Interaction`]. Clones share the same lifecycle
/// state, so a response generated through one clone is seen by all.
#[derive(Clone)]
pub struct InteractionContext {
    interaction: Arc<Interaction>,
    token: Arc<InteractionToken>,
    rest: BoxedRestClient,
}

impl InteractionContext {
    /// Creates a context with fresh lifecycle state.
    pub fn new(interaction: Arc<Interaction>, rest: BoxedRestClient) -> Self {
        let token = Arc::new(InteractionToken::new(
            interaction.id,
            interaction.application_id,
            interaction.token.clone(),
        ));
        Self {
            interaction,
            token,
            rest,
        }
    }

    pub fn interaction(&self) -> &Arc<Interaction> {
        &self.interaction
    }

    pub fn token(&self) -> &InteractionToken {
        &self.token
    }

    /// Returns true while no response has been generated.
    pub fn can_respond(&self) -> bool {
        self.token.can_respond()
    }

    /// Claims the single response slot.
    ///
    /// Returns [`StateError::AlreadyResponded`] on every call after the first.
    pub fn generate_response(
        &self,
        kind: ResponseKind,
        ephemeral: bool,
    ) -> Result<ResponseBuilder, StateError> {
        self.token.mark_responded(kind)?;
        debug!(interaction_id = %self.interaction.id, kind = ?kind, "Response generated");
        Ok(ResponseBuilder {
            ctx: self.clone(),
            kind,
            ephemeral,
        })
    }

    /// Prepares a followup. Only legal after a response.
    pub fn generate_followup(&self, ephemeral: bool) -> Result<FollowupBuilder, StateError> {
        self.token.require_response()?;
        Ok(FollowupBuilder {
            ctx: self.clone(),
            ephemeral,
        })
    }

    /// Responds with a channel message in one step.
    pub async fn respond(&self, payload: MessagePayload) -> ResponseResult<()> {
        self.generate_response(ResponseKind::ChannelMessage, false)?
            .send(payload)
            .await
    }

    /// Acknowledges now and edits the original response later.
    pub async fn defer(&self, ephemeral: bool) -> ResponseResult<()> {
        self.generate_response(ResponseKind::DeferredChannelMessage, ephemeral)?
            .acknowledge()
            .await
    }

    /// Sends a followup in one step.
    pub async fn followup(&self, payload: MessagePayload) -> ResponseResult<Message> {
        self.generate_followup(false)?.send(payload).await
    }

    /// Edits a followup; `None` targets the last one sent.
    pub async fn edit_followup(
        &self,
        message_id: Option<Id>,
        payload: MessagePayload,
    ) -> ResponseResult<Message> {
        self.token.require_response()?;
        let target = self.token.followup_target(message_id)?;
        Ok(self
            .rest
            .edit_followup(self.token.token(), target, &payload)
            .await?)
    }

    /// Deletes a followup; `None` targets the last one sent.
    pub async fn delete_followup(&self, message_id: Option<Id>) -> ResponseResult<()> {
        self.token.require_response()?;
        let target = self.token.followup_target(message_id)?;
        self.rest
            .delete_followup(self.token.token(), target)
            .await?;
        self.token.forget_followup(target);
        Ok(())
    }

    /// Edits the original response.
    pub async fn edit_original(&self, payload: MessagePayload) -> ResponseResult<Message> {
        self.token.require_response()?;
        Ok(self.rest.edit_original(self.token.token(), &payload).await?)
    }

    /// Deletes the original response.
    pub async fn delete_original(&self) -> ResponseResult<()> {
        self.token.require_response()?;
        Ok(self.rest.delete_original(self.token.token()).await?)
    }
}

impl Deref for InteractionContext {
    type Target = Interaction;

    fn deref(&self) -> &Interaction {
        &self.interaction
    }
}

// ============================================================================
// Builders
// ============================================================================

/// A generated, not yet sent, interaction response.
#[must_use = "a generated response does nothing until it is sent"]
pub struct ResponseBuilder {
    ctx: InteractionContext,
    kind: ResponseKind,
    ephemeral: bool,
}

impl ResponseBuilder {
    pub fn kind(&self) -> ResponseKind {
        self.kind
    }

    /// Sends a message response (`ChannelMessage` or `UpdateMessage`).
    pub async fn send(self, payload: MessagePayload) -> ResponseResult<()> {
        let payload = if self.ephemeral {
            payload.ephemeral(true)
        } else {
            payload
        };
        let data = serde_json::to_value(&payload).map_err(tether_core::ApiError::from)?;
        self.send_data(Some(data)).await
    }

    /// Sends a response without a body (pong and deferred kinds).
    pub async fn acknowledge(self) -> ResponseResult<()> {
        let data = self
            .ephemeral
            .then(|| json!({ "flags": MessageFlags::EPHEMERAL }));
        self.send_data(data).await
    }

    /// Sends autocomplete suggestions.
    pub async fn choices(self, choices: Vec<AutocompleteChoice>) -> ResponseResult<()> {
        self.send_data(Some(json!({ "choices": choices }))).await
    }

    /// Sends a modal.
    pub async fn modal(
        self,
        custom_id: impl Into<String>,
        title: impl Into<String>,
        components: Vec<Value>,
    ) -> ResponseResult<()> {
        let data = json!({
            "custom_id": custom_id.into(),
            "title": title.into(),
            "components": components,
        });
        self.send_data(Some(data)).await
    }

    /// Sends an arbitrary callback body.
    pub async fn send_data(self, data: Option<Value>) -> ResponseResult<()> {
        let response = InteractionResponse {
            kind: self.kind,
            data,
        };
        let token = &self.ctx.token;
        self.ctx
            .rest
            .send_interaction_response(token.interaction_id(), token.token(), &response)
            .await?;
        Ok(())
    }
}

/// A followup message waiting to be sent.
#[must_use = "a generated followup does nothing until it is sent"]
pub struct FollowupBuilder {
    ctx: InteractionContext,
    ephemeral: bool,
}

impl FollowupBuilder {
    /// Sends the followup and remembers it as the default edit/delete target.
    pub async fn send(self, payload: MessagePayload) -> ResponseResult<Message> {
        let payload = if self.ephemeral {
            payload.ephemeral(true)
        } else {
            payload
        };
        let token = &self.ctx.token;
        let message = self.ctx.rest.send_followup(token.token(), &payload).await?;
        token.remember_followup(message.id);
        Ok(message)
    }
}

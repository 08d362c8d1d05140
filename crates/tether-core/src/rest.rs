//! REST collaborator contract.
//!
//! The gateway session and the dispatch engine only ever reach the REST
//! control plane through [`RestClient`]. The concrete HTTP implementation,
//! with its per-route rate limiting, lives in `tether-transport`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ApiResult;
use crate::model::{ApplicationCommand, Id, InteractionResponse, Message, MessagePayload};

/// Async access to the REST endpoints used by the client.
///
/// Every method fails with [`ApiError::Http`](crate::ApiError::Http) when the
/// server answers with a non-2xx status.
#[async_trait]
pub trait RestClient: Send + Sync {
    /// Returns the WebSocket address to connect to.
    async fn get_gateway_url(&self) -> ApiResult<String>;

    /// Fetches a global application command by id.
    async fn get_application_command(&self, command_id: Id) -> ApiResult<ApplicationCommand>;

    /// Fetches a guild-scoped application command by id.
    async fn get_guild_application_command(
        &self,
        guild_id: Id,
        command_id: Id,
    ) -> ApiResult<ApplicationCommand>;

    /// Sends the initial interaction response.
    async fn send_interaction_response(
        &self,
        interaction_id: Id,
        token: &str,
        response: &InteractionResponse,
    ) -> ApiResult<()>;

    /// Sends a followup message and returns it.
    async fn send_followup(&self, token: &str, payload: &MessagePayload) -> ApiResult<Message>;

    /// Edits a followup message.
    async fn edit_followup(
        &self,
        token: &str,
        message_id: Id,
        payload: &MessagePayload,
    ) -> ApiResult<Message>;

    /// Deletes a followup message.
    async fn delete_followup(&self, token: &str, message_id: Id) -> ApiResult<()>;

    /// Edits the original interaction response.
    async fn edit_original(&self, token: &str, payload: &MessagePayload) -> ApiResult<Message>;

    /// Deletes the original interaction response.
    async fn delete_original(&self, token: &str) -> ApiResult<()>;
}

/// Shared REST client.
pub type BoxedRestClient = Arc<dyn RestClient>;

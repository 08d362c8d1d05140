//! In-memory fakes shared by the unit tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};

use tether_core::model::{
    ApplicationCommand, Interaction, InteractionResponse, Message, MessagePayload,
};
use tether_core::{ApiError, ApiResult, Entity, Id, RestClient, Sendable};

use crate::context::Client;
use crate::dispatcher::InteractionDispatcher;
use crate::response::InteractionContext;

pub(crate) const APPLICATION_ID: u64 = 20;
pub(crate) const CHANNEL_ID: u64 = 5;

/// Records every REST call and answers command lookups from fixed tables.
#[derive(Default)]
pub(crate) struct FakeRest {
    global_commands: HashMap<Id, String>,
    guild_commands: HashMap<(Id, Id), String>,
    global_failure: Option<u16>,
    global_lookups: AtomicUsize,
    guild_lookups: AtomicUsize,
    responses: Mutex<Vec<(Id, Value)>>,
    followups: Mutex<Vec<MessagePayload>>,
    edits: Mutex<Vec<Id>>,
    deletes: Mutex<Vec<Id>>,
    response_failure: AtomicU16,
    next_message: AtomicU64,
}

impl FakeRest {
    pub(crate) fn with_global_command(mut self, id: u64, name: &str) -> Self {
        self.global_commands.insert(Id(id), name.to_string());
        self
    }

    pub(crate) fn with_guild_command(mut self, guild: u64, id: u64, name: &str) -> Self {
        self.guild_commands
            .insert((Id(guild), Id(id)), name.to_string());
        self
    }

    /// Makes every global command lookup fail with `status`.
    pub(crate) fn fail_global_lookups_with(mut self, status: u16) -> Self {
        self.global_failure = Some(status);
        self
    }

    /// `(global, guild)` lookup counts.
    pub(crate) fn lookup_calls(&self) -> (usize, usize) {
        (
            self.global_lookups.load(Ordering::SeqCst),
            self.guild_lookups.load(Ordering::SeqCst),
        )
    }

    pub(crate) fn responses(&self) -> Vec<(Id, Value)> {
        self.responses.lock().clone()
    }

    pub(crate) fn followups(&self) -> Vec<MessagePayload> {
        self.followups.lock().clone()
    }

    pub(crate) fn edits(&self) -> Vec<Id> {
        self.edits.lock().clone()
    }

    pub(crate) fn deletes(&self) -> Vec<Id> {
        self.deletes.lock().clone()
    }

    /// Makes every initial response fail with `status`.
    pub(crate) fn fail_responses_with(&self, status: u16) {
        self.response_failure.store(status, Ordering::SeqCst);
    }

    fn command(id: Id, name: &str, guild_id: Option<Id>) -> ApplicationCommand {
        ApplicationCommand {
            id,
            application_id: Some(Id(APPLICATION_ID)),
            guild_id,
            name: name.to_string(),
            description: String::new(),
        }
    }

    fn not_found() -> ApiError {
        ApiError::Http {
            status: 404,
            message: "Unknown application command".into(),
        }
    }

    fn message(&self, id: Id, payload: &MessagePayload) -> ApiResult<Message> {
        Ok(Message {
            id,
            channel_id: Id(CHANNEL_ID),
            guild_id: None,
            author: None,
            content: payload.content.clone().unwrap_or_default(),
            flags: payload.flags.unwrap_or(0),
        })
    }
}

#[async_trait]
impl RestClient for FakeRest {
    async fn get_gateway_url(&self) -> ApiResult<String> {
        Ok("wss://gateway.test".into())
    }

    async fn get_application_command(&self, command_id: Id) -> ApiResult<ApplicationCommand> {
        self.global_lookups.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = self.global_failure {
            return Err(ApiError::Http {
                status,
                message: "lookup failed".into(),
            });
        }
        self.global_commands
            .get(&command_id)
            .map(|name| Self::command(command_id, name, None))
            .ok_or_else(Self::not_found)
    }

    async fn get_guild_application_command(
        &self,
        guild_id: Id,
        command_id: Id,
    ) -> ApiResult<ApplicationCommand> {
        self.guild_lookups.fetch_add(1, Ordering::SeqCst);
        self.guild_commands
            .get(&(guild_id, command_id))
            .map(|name| Self::command(command_id, name, Some(guild_id)))
            .ok_or_else(Self::not_found)
    }

    async fn send_interaction_response(
        &self,
        interaction_id: Id,
        _token: &str,
        response: &InteractionResponse,
    ) -> ApiResult<()> {
        match self.response_failure.load(Ordering::SeqCst) {
            0 => {
                self.responses
                    .lock()
                    .push((interaction_id, response.to_wire()));
                Ok(())
            }
            status => Err(ApiError::Http {
                status,
                message: "rejected".into(),
            }),
        }
    }

    async fn send_followup(&self, _token: &str, payload: &MessagePayload) -> ApiResult<Message> {
        self.followups.lock().push(payload.clone());
        let id = Id(1000 + self.next_message.fetch_add(1, Ordering::SeqCst));
        self.message(id, payload)
    }

    async fn edit_followup(
        &self,
        _token: &str,
        message_id: Id,
        payload: &MessagePayload,
    ) -> ApiResult<Message> {
        self.edits.lock().push(message_id);
        self.message(message_id, payload)
    }

    async fn delete_followup(&self, _token: &str, message_id: Id) -> ApiResult<()> {
        self.deletes.lock().push(message_id);
        Ok(())
    }

    async fn edit_original(&self, _token: &str, payload: &MessagePayload) -> ApiResult<Message> {
        self.message(Id(1), payload)
    }

    async fn delete_original(&self, _token: &str) -> ApiResult<()> {
        Ok(())
    }
}

pub(crate) fn client_with(rest: FakeRest) -> (Client, Arc<FakeRest>) {
    let rest = Arc::new(rest);
    let client = Client::new(
        Id(APPLICATION_ID),
        rest.clone(),
        Arc::new(InteractionDispatcher::new()),
    );
    (client, rest)
}

pub(crate) fn client() -> (Client, Arc<FakeRest>) {
    client_with(FakeRest::default())
}

fn interaction(value: Value) -> Arc<Interaction> {
    match Interaction::parse(&value) {
        Ok(interaction) => Arc::new(interaction),
        Err(e) => panic!("bad test interaction: {e}"),
    }
}

pub(crate) fn command_interaction(command_id: u64, guild: Option<u64>) -> Arc<Interaction> {
    interaction(json!({
        "id": "10",
        "application_id": APPLICATION_ID.to_string(),
        "type": 2,
        "token": "interaction-token",
        "channel_id": CHANNEL_ID.to_string(),
        "guild_id": guild.map(|g| g.to_string()),
        "data": {"id": command_id.to_string(), "name": "ping"},
    }))
}

pub(crate) fn component_interaction(custom_id: &str) -> Arc<Interaction> {
    interaction(json!({
        "id": "11",
        "application_id": APPLICATION_ID.to_string(),
        "type": 3,
        "token": "interaction-token",
        "channel_id": CHANNEL_ID.to_string(),
        "data": {"custom_id": custom_id, "component_type": 2},
    }))
}

pub(crate) fn context(client: &Client, interaction: &Arc<Interaction>) -> InteractionContext {
    InteractionContext::new(Arc::clone(interaction), client.rest().clone())
}

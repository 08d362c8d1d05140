//! The client handle passed to callbacks and event handlers.

use std::sync::Arc;

use tether_core::{BoxedRestClient, Id};

use crate::dispatcher::InteractionDispatcher;

/// Cheap, cloneable access to the REST client and the dispatcher.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    application_id: Id,
    rest: BoxedRestClient,
    dispatcher: Arc<InteractionDispatcher>,
}

impl Client {
    /// Creates a client handle.
    pub fn new(
        application_id: Id,
        rest: BoxedRestClient,
        dispatcher: Arc<InteractionDispatcher>,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                application_id,
                rest,
                dispatcher,
            }),
        }
    }

    pub fn application_id(&self) -> Id {
        self.inner.application_id
    }

    /// The REST collaborator.
    pub fn rest(&self) -> &BoxedRestClient {
        &self.inner.rest
    }

    /// The dispatcher holding every interaction registration.
    pub fn dispatcher(&self) -> &Arc<InteractionDispatcher> {
        &self.inner.dispatcher
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("application_id", &self.inner.application_id)
            .finish_non_exhaustive()
    }
}

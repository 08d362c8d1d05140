//! Interaction callbacks.
//!
//! A callback takes zero to three arguments, always in this order:
//!
//! | Arity | Arguments |
//! |-------|-----------|
//! | 0 | none |
//! | 1 | [`InteractionContext`] |
//! | 2 | [`InteractionContext`], raw payload ([`Value`]) |
//! | 3 | [`InteractionContext`], raw payload, [`Client`] |
//!
//! The arity is fixed when the callback is registered: [`IntoCallback`] is
//! implemented for closures and async functions of exactly these shapes, and
//! anything else is rejected by the compiler.
//!
//! ```rust,ignore
//! dispatcher.register_global_command("ping", |ctx: InteractionContext| async move {
//!     ctx.respond(MessagePayload::text("pong")).await?;
//!     Ok::<_, anyhow::Error>(())
//! }, None);
//! ```

use std::fmt;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;
use tracing::warn;

use crate::context::Client;
use crate::response::InteractionContext;

// ============================================================================
// Callback results
// ============================================================================

/// Return types accepted from a callback.
pub trait IntoCallbackResult: Send {
    /// Converts into the uniform callback result.
    fn into_callback_result(self) -> anyhow::Result<()>;
}

impl IntoCallbackResult for () {
    fn into_callback_result(self) -> anyhow::Result<()> {
        Ok(())
    }
}

impl<E> IntoCallbackResult for Result<(), E>
where
    E: Into<anyhow::Error> + Send,
{
    fn into_callback_result(self) -> anyhow::Result<()> {
        self.map_err(Into::into)
    }
}

// ============================================================================
// Callback
// ============================================================================

type CallbackFuture = BoxFuture<'static, anyhow::Result<()>>;

/// The arity-tagged function behind a [`Callback`].
#[derive(Clone)]
pub enum CallbackFn {
    /// No arguments.
    Arity0(Arc<dyn Fn() -> CallbackFuture + Send + Sync>),
    /// The interaction context.
    Arity1(Arc<dyn Fn(InteractionContext) -> CallbackFuture + Send + Sync>),
    /// Context and raw payload.
    Arity2(Arc<dyn Fn(InteractionContext, Value) -> CallbackFuture + Send + Sync>),
    /// Context, raw payload and client.
    Arity3(Arc<dyn Fn(InteractionContext, Value, Client) -> CallbackFuture + Send + Sync>),
}

/// A registered interaction callback.
#[derive(Clone)]
pub struct Callback {
    func: CallbackFn,
    blocking: bool,
}

impl Callback {
    fn from_fn(func: CallbackFn, blocking: bool) -> Self {
        Self { func, blocking }
    }

    /// Wraps a synchronous function.
    ///
    /// Blocking callbacks run inline on the dispatch task and log a warning
    /// every time they are invoked.
    pub fn blocking<T>(f: impl IntoBlockingCallback<T>) -> Self {
        f.into_blocking_callback()
    }

    /// Returns the number of arguments this callback takes.
    pub fn arity(&self) -> usize {
        match self.func {
            CallbackFn::Arity0(_) => 0,
            CallbackFn::Arity1(_) => 1,
            CallbackFn::Arity2(_) => 2,
            CallbackFn::Arity3(_) => 3,
        }
    }

    pub fn is_blocking(&self) -> bool {
        self.blocking
    }

    /// Invokes the callback with as many arguments as it declared.
    pub async fn invoke(
        &self,
        ctx: InteractionContext,
        raw: Value,
        client: Client,
    ) -> anyhow::Result<()> {
        if self.blocking {
            warn!(
                interaction_id = %ctx.id,
                "Blocking callback invoked; it stalls the dispatch task until it returns"
            );
        }
        match &self.func {
            CallbackFn::Arity0(f) => f().await,
            CallbackFn::Arity1(f) => f(ctx).await,
            CallbackFn::Arity2(f) => f(ctx, raw).await,
            CallbackFn::Arity3(f) => f(ctx, raw, client).await,
        }
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("arity", &self.arity())
            .field("blocking", &self.blocking)
            .finish()
    }
}

// ============================================================================
// Conversions
// ============================================================================

/// Conversion of async functions into a [`Callback`].
///
/// `T` is a marker for the argument list and is inferred.
pub trait IntoCallback<T>: Send + Sync + 'static {
    fn into_callback(self) -> Callback;
}

/// Conversion of synchronous functions into a blocking [`Callback`].
pub trait IntoBlockingCallback<T>: Send + Sync + 'static {
    fn into_blocking_callback(self) -> Callback;
}

impl IntoCallback<Callback> for Callback {
    fn into_callback(self) -> Callback {
        self
    }
}

macro_rules! impl_callback {
    ($variant:ident; $($arg:ident: $ty:ty),*) => {
        impl<F, Fut, Res> IntoCallback<($($ty,)*)> for F
        where
            F: Fn($($ty),*) -> Fut + Send + Sync + 'static,
            Fut: Future<Output = Res> + Send + 'static,
            Res: IntoCallbackResult + 'static,
        {
            fn into_callback(self) -> Callback {
                let f = Arc::new(self);
                Callback::from_fn(
                    CallbackFn::$variant(Arc::new(move |$($arg: $ty),*| {
                        let fut = f($($arg),*);
                        async move { fut.await.into_callback_result() }.boxed()
                    })),
                    false,
                )
            }
        }

        impl<F, Res> IntoBlockingCallback<($($ty,)*)> for F
        where
            F: Fn($($ty),*) -> Res + Send + Sync + 'static,
            Res: IntoCallbackResult + 'static,
        {
            fn into_blocking_callback(self) -> Callback {
                let f = Arc::new(self);
                Callback::from_fn(
                    CallbackFn::$variant(Arc::new(move |$($arg: $ty),*| {
                        let result = f($($arg),*).into_callback_result();
                        futures::future::ready(result).boxed()
                    })),
                    true,
                )
            }
        }
    };
}

impl_callback!(Arity0;);
impl_callback!(Arity1; ctx: InteractionContext);
impl_callback!(Arity2; ctx: InteractionContext, raw: Value);
impl_callback!(Arity3; ctx: InteractionContext, raw: Value, client: Client);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{client, command_interaction, context};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_arity_is_fixed_at_registration() {
        let zero = (|| async {}).into_callback();
        let one = (|_ctx: InteractionContext| async { Ok::<_, anyhow::Error>(()) }).into_callback();
        let two = (|_ctx: InteractionContext, _raw: Value| async {}).into_callback();
        let three =
            (|_ctx: InteractionContext, _raw: Value, _client: Client| async {}).into_callback();

        assert_eq!(zero.arity(), 0);
        assert_eq!(one.arity(), 1);
        assert_eq!(two.arity(), 2);
        assert_eq!(three.arity(), 3);
        assert!(!three.is_blocking());
    }

    #[tokio::test]
    async fn test_invoke_passes_declared_arguments() {
        let seen = Arc::new(parking_lot::Mutex::new(None));
        let sink = Arc::clone(&seen);
        let callback = (move |ctx: InteractionContext, raw: Value| {
            let sink = Arc::clone(&sink);
            async move {
                *sink.lock() = Some((ctx.id, raw["marker"].clone()));
            }
        })
        .into_callback();

        let (client, _rest) = client();
        let interaction = command_interaction(40, Some(30));
        let raw = serde_json::json!({"marker": 7});
        callback
            .invoke(context(&client, &interaction), raw, client.clone())
            .await
            .unwrap();

        let seen = seen.lock().clone();
        assert_eq!(seen, Some((interaction.id, serde_json::json!(7))));
    }

    #[tokio::test]
    async fn test_blocking_callback_runs_inline() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let callback = Callback::blocking(move |_ctx: InteractionContext| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(callback.is_blocking());

        let (client, _rest) = client();
        let interaction = command_interaction(40, None);
        callback
            .invoke(context(&client, &interaction), Value::Null, client.clone())
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_errors_are_returned() {
        let callback = (|| async { Err::<(), _>(anyhow::anyhow!("nope")) }).into_callback();
        let (client, _rest) = client();
        let interaction = command_interaction(40, None);
        let err = callback
            .invoke(context(&client, &interaction), Value::Null, client.clone())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "nope");
    }
}

use std::pin::Pin;
use std::task::{self, Poll};

use serde::{Deserialize, Serialize};

use crate::provider::ModelProviderError;

/// A streamed reply from a completion provider.
///
/// The reply text arrives as a series of [`ModelResponseEvent::MessageDelta`]
/// events, followed by one [`ModelResponseEvent::Completed`] event.
pub trait ModelResponse: Sized + Send + 'static {
    /// The error type that may be returned while streaming.
    type Error: ModelProviderError;

    /// Polls for the next event of the reply.
    ///
    /// Returns `Poll::Pending` while waiting for more data, registering the
    /// current task to be woken. `Ok(Some(event))` delivers an event,
    /// `Ok(None)` marks the end of the reply, and `Err` reports a failure
    /// (for example, the connection dropped or the reply was blocked).
    ///
    /// Once the reply has ended, further calls return `Ok(None)`.
    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>>;
}

/// Why the model stopped generating.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelFinishReason {
    /// The model finished its reply.
    Stop,
    /// The output hit the token limit and may be truncated.
    Length,
}

/// An event in a streamed reply.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelResponseEvent {
    /// The reply is complete.
    Completed(ModelFinishReason),
    /// The next piece of the reply text.
    MessageDelta(String),
}

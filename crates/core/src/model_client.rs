use std::future::poll_fn;
use std::pin::{Pin, pin};
use std::sync::Arc;
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use stepwise_model::{
    ModelFinishReason, ModelProvider, ModelProviderError, ModelRequest,
    ModelResponse, ModelResponseEvent,
};
use tracing::Instrument;

type SendRequestResult =
    Result<ModelClientResponse, Box<dyn ModelProviderError>>;
type BoxedSendRequestFuture =
    Pin<Box<dyn Future<Output = SendRequestResult> + Send>>;
type HandlerFn =
    Arc<dyn Fn(ModelRequest) -> BoxedSendRequestFuture + Send + Sync>;

const INITIAL_RETRY_INTERVAL: Duration = Duration::from_millis(500);

/// A wrapper around a model provider that maintains an execution
/// environment for the provider and provides a type-erased interface
/// for the other modules.
#[derive(Clone)]
pub struct ModelClient {
    handler_fn: HandlerFn,
    retry_window: Duration,
}

impl ModelClient {
    #[inline]
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        // We have to erase the type `P`, since `ModelClient` doesn't have a
        // generic parameter and we don't want it either.
        let handler_fn: HandlerFn = Arc::new(move |req| {
            let fut = provider.send_request(&req);
            Box::pin(
                async move {
                    trace!("got a request: {:?}", req);
                    let resp_or_err = fut.await;
                    handle_response::<P>(resp_or_err).await
                }
                .instrument(trace_span!("model client req")),
            )
        });
        Self {
            handler_fn,
            retry_window: Duration::ZERO,
        }
    }

    /// Sets how long transient failures are retried with exponential
    /// backoff. `Duration::ZERO` disables retries.
    #[inline]
    pub fn set_retry_window(&mut self, retry_window: Duration) {
        self.retry_window = retry_window;
    }

    /// Sends a request and returns the response once it has been fully
    /// received.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. The response stops streaming further
    /// events when this operation is cancelled.
    pub async fn send_request(&self, req: ModelRequest) -> SendRequestResult {
        if self.retry_window.is_zero() {
            return (self.handler_fn)(req).await;
        }

        let backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(INITIAL_RETRY_INTERVAL)
            .with_max_elapsed_time(Some(self.retry_window))
            .build();
        backoff::future::retry_notify(
            backoff,
            || {
                let fut = (self.handler_fn)(req.clone());
                async move {
                    fut.await.map_err(|err| {
                        if err.kind().is_transient() {
                            backoff::Error::transient(err)
                        } else {
                            backoff::Error::permanent(err)
                        }
                    })
                }
            },
            |err: Box<dyn ModelProviderError>, after: Duration| {
                warn!("model request failed ({err}), retrying in {after:?}");
            },
        )
        .await
    }
}

/// A completely received response from the model client.
#[derive(Clone, Debug)]
pub struct ModelClientResponse {
    /// The concatenated message text.
    pub text: String,
    /// The reason the model finished generating.
    pub finish_reason: Option<ModelFinishReason>,
}

async fn handle_response<P: ModelProvider + 'static>(
    resp_or_err: Result<P::Response, P::Error>,
) -> SendRequestResult {
    let resp = match resp_or_err {
        Ok(resp) => resp,
        Err(err) => {
            error!("got an error: {err:?}");
            return Err(Box::new(err));
        }
    };

    let mut text = String::new();
    let mut finish_reason = None;

    trace!("start receiving events");

    let mut pinned_resp = pin!(resp);
    loop {
        let event_or_err =
            poll_fn(|cx| pinned_resp.as_mut().poll_next_event(cx)).await;
        let event = match event_or_err {
            Ok(Some(event)) => event,
            Ok(None) => break,
            Err(err) => {
                error!("got an error: {err:?}");
                return Err(Box::new(err));
            }
        };
        trace!("got an event: {event:?}");

        match event {
            ModelResponseEvent::MessageDelta(delta) => {
                text.push_str(&delta);
            }
            ModelResponseEvent::Completed(reason) => {
                finish_reason = Some(reason);
            }
        }
    }

    trace!("finished a request");

    Ok(ModelClientResponse {
        text,
        finish_reason,
    })
}

#[cfg(test)]
mod tests {
    use stepwise_model::{ErrorKind, ModelMessage, ResponseFormat};
    use stepwise_test_model::{
        PresetEvent, PresetResponse, TestModelProvider,
    };

    use super::*;

    fn request() -> ModelRequest {
        ModelRequest {
            messages: vec![ModelMessage::User("Hi".to_owned())],
            response_format: ResponseFormat::Json,
        }
    }

    #[tokio::test]
    async fn test_send_request() {
        let mut model_provider = TestModelProvider::default();
        model_provider.add_response(PresetResponse::with_events([
            PresetEvent::MessageDelta("{\"step\": ".to_owned()),
            PresetEvent::MessageDelta("\"result\", ".to_owned()),
            PresetEvent::MessageDelta("\"content\": \"hi\"}".to_owned()),
        ]));

        let model_client = ModelClient::new(model_provider);
        let resp = model_client.send_request(request()).await.unwrap();
        assert_eq!(resp.text, r#"{"step": "result", "content": "hi"}"#);
        assert_eq!(resp.finish_reason, Some(ModelFinishReason::Stop));
    }

    #[tokio::test]
    async fn test_error_handling() {
        let model_provider = TestModelProvider::default();
        let model_client = ModelClient::new(model_provider);
        let resp_or_err = model_client.send_request(request()).await;
        assert!(matches!(resp_or_err, Err(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_transient_errors() {
        let mut model_provider = TestModelProvider::default();
        model_provider
            .add_response(PresetResponse::with_text("ok").with_failures(2));

        let mut model_client = ModelClient::new(model_provider.clone());
        model_client.set_retry_window(Duration::from_secs(60));
        let resp = model_client.send_request(request()).await.unwrap();
        assert_eq!(resp.text, "ok");
        assert_eq!(model_provider.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_no_retry_without_window() {
        let mut model_provider = TestModelProvider::default();
        model_provider
            .add_response(PresetResponse::with_text("ok").with_failures(1));

        let model_client = ModelClient::new(model_provider.clone());
        let err = model_client.send_request(request()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);
        assert_eq!(model_provider.requests().len(), 1);
    }
}

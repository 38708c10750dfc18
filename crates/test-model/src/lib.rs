//! A local fake model for testing purpose.

mod preset;

use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use stepwise_model::{
    ErrorKind, ModelFinishReason, ModelProvider, ModelProviderError,
    ModelRequest, ModelResponse, ModelResponseEvent,
};
use tokio::time::{Sleep, sleep};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    message: &'static str,
    kind: ErrorKind,
}

impl Error {
    #[inline]
    pub fn message(&self) -> &str {
        self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

pub struct TestModelResponse {
    events: Vec<PresetEvent>,
    event_idx: usize,
    delay: Duration,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl ModelResponse for TestModelResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        // SAFETY: This type does not require to be pinned.
        let this = unsafe { self.get_unchecked_mut() };

        if let Some(sleep) = &mut this.sleep {
            let sleep = sleep.as_mut();
            ready!(sleep.poll(cx));
            this.sleep = None;

            if this.event_idx < this.events.len() {
                let event = match &this.events[this.event_idx] {
                    PresetEvent::MessageDelta(msg) => {
                        ModelResponseEvent::MessageDelta(msg.clone())
                    }
                };
                this.event_idx += 1;
                return Poll::Ready(Ok(Some(event)));
            } else if this.event_idx == this.events.len() {
                this.event_idx += 1;
                return Poll::Ready(Ok(Some(ModelResponseEvent::Completed(
                    ModelFinishReason::Stop,
                ))));
            } else {
                // In case this method is called after completion.
                return Poll::Ready(Ok(None));
            }
        }
        this.sleep = Some(Box::pin(sleep(this.delay)));
        Pin::new(this).poll_next_event(cx)
    }
}

#[derive(Default)]
struct Script {
    responses: Vec<PresetResponse>,
    cursor: usize,
    // Failed attempts of the response under the cursor.
    attempts: u64,
    requests: Vec<ModelRequest>,
}

/// A local fake model for testing purpose.
///
/// Before sending requests, you need to setup the script, which is how the
/// model should respond. Each request consumes the next response in the
/// script, unless that response is set up to fail. If there are no enough
/// responses in the script, an error will be returned.
///
/// Clones share the same script, so a test can hand one clone to the agent
/// and inspect the received requests through another.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
#[derive(Clone, Default)]
pub struct TestModelProvider {
    script: Arc<Mutex<Script>>,
    delay: Option<Duration>,
}

impl TestModelProvider {
    #[inline]
    pub fn add_response(&mut self, preset: PresetResponse) {
        self.lock().responses.push(preset);
    }

    /// Appends a response whose whole text is `text`.
    #[inline]
    pub fn add_text_response<S: Into<String>>(&mut self, text: S) {
        self.add_response(PresetResponse::with_text(text));
    }

    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns all requests received so far, including failed attempts.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.lock().requests.clone()
    }

    /// Returns how many script responses haven't been delivered yet.
    pub fn remaining(&self) -> usize {
        let script = self.lock();
        script.responses.len() - script.cursor
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        // A poisoned script means another test thread already panicked.
        self.script.lock().unwrap_or_else(|err| err.into_inner())
    }

    fn next_response(&self, req: &ModelRequest) -> Result<Vec<PresetEvent>, Error> {
        let mut script = self.lock();
        script.requests.push(req.clone());

        let cursor = script.cursor;
        let Some(preset) = script.responses.get(cursor) else {
            return Err(Error {
                message: "no enough responses",
                kind: ErrorKind::Other,
            });
        };

        let should_fail = match preset.failures {
            Some(0) => true,
            Some(failures) => script.attempts < failures,
            None => false,
        };
        if should_fail {
            script.attempts += 1;
            return Err(Error {
                message: "injected failure",
                kind: ErrorKind::RateLimitExceeded,
            });
        }

        let events = preset.events.clone();
        script.cursor += 1;
        script.attempts = 0;
        Ok(events)
    }
}

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;
    type Response = TestModelResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let delay = self.delay.unwrap_or(Duration::from_millis(1));
        let resp = self.next_response(req).map(|events| TestModelResponse {
            events,
            event_idx: 0,
            delay,
            sleep: None,
        });
        ready(resp)
    }
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use stepwise_model::{ModelMessage, ResponseFormat};

    use super::*;

    async fn collect_response(resp: TestModelResponse) -> String {
        let mut resp = pin!(resp);
        let mut msg = String::new();
        loop {
            let event = poll_fn(|cx| resp.as_mut().poll_next_event(cx))
                .await
                .unwrap()
                .unwrap();
            match event {
                ModelResponseEvent::Completed(_) => break,
                ModelResponseEvent::MessageDelta(delta) => {
                    msg.push_str(&delta);
                }
            }
        }
        msg
    }

    fn request(text: &str) -> ModelRequest {
        ModelRequest {
            messages: vec![ModelMessage::User(text.to_owned())],
            response_format: ResponseFormat::Json,
        }
    }

    #[tokio::test]
    async fn test_send_request() {
        let mut provider = TestModelProvider::default();
        provider.add_response(PresetResponse::with_events([
            PresetEvent::MessageDelta("{\"step\": ".to_owned()),
            PresetEvent::MessageDelta("\"start\", ".to_owned()),
            PresetEvent::MessageDelta("\"content\": \"hi\"}".to_owned()),
        ]));
        provider.add_text_response("{\"step\": \"result\", \"content\": \"ok\"}");

        let resp = provider.send_request(&request("Hi")).await.unwrap();
        assert_eq!(
            collect_response(resp).await,
            "{\"step\": \"start\", \"content\": \"hi\"}"
        );
        let resp = provider.send_request(&request("Next")).await.unwrap();
        assert_eq!(
            collect_response(resp).await,
            "{\"step\": \"result\", \"content\": \"ok\"}"
        );

        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1], request("Next"));
        assert_eq!(provider.remaining(), 0);

        let err = provider.send_request(&request("More")).await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Other);
    }

    #[tokio::test]
    async fn test_failures() {
        let mut provider = TestModelProvider::default();
        provider.add_response(PresetResponse::with_text("ok").with_failures(2));
        provider.add_response(PresetResponse::with_text("never").with_failures(0));

        for _ in 0..2 {
            let err = provider.send_request(&request("Hi")).await.err().unwrap();
            assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);
        }
        let resp = provider.send_request(&request("Hi")).await.unwrap();
        assert_eq!(collect_response(resp).await, "ok");

        for _ in 0..5 {
            assert!(provider.send_request(&request("Hi")).await.is_err());
        }
        assert_eq!(provider.remaining(), 1);
        assert_eq!(provider.requests().len(), 8);
    }
}

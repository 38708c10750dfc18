use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use stepwise_model::{
    ErrorKind, ModelFinishReason, ModelResponse, ModelResponseEvent,
};

use crate::Error;
use crate::io::{Sse, SseError};
use crate::proto::GenerateContentChunk;

struct PartialState {
    sse: Sse,
    // Events decoded from one chunk but not yet delivered. A single chunk
    // may carry both the last delta and the finish reason.
    pending_events: VecDeque<ModelResponseEvent>,
    finished: bool,
}

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextEvent = Result<(Option<ModelResponseEvent>, PartialState), Error>;

pub struct GeminiResponse {
    next_event_fut: Option<PinnedFuture<NextEvent>>,
}

impl GeminiResponse {
    #[inline]
    pub fn from_sse(sse: Sse) -> Self {
        let partial_state = PartialState {
            sse,
            pending_events: VecDeque::new(),
            finished: false,
        };
        Self {
            next_event_fut: Some(Box::pin(next_event(partial_state))),
        }
    }
}

impl ModelResponse for GeminiResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.get_mut();
        let Some(next_event_fut) = &mut this.next_event_fut else {
            return Poll::Ready(Ok(None));
        };
        let (event, partial_state) =
            match ready!(next_event_fut.as_mut().poll(cx)) {
                Ok((Some(event), partial_state)) => (event, partial_state),
                Ok((None, _)) => {
                    this.next_event_fut = None;
                    return Poll::Ready(Ok(None));
                }
                Err(err) => {
                    this.next_event_fut = None;
                    return Poll::Ready(Err(err));
                }
            };

        // The stream may still have more data to pull, create a new future for
        // the next event.
        this.next_event_fut = Some(Box::pin(next_event(partial_state)));

        Poll::Ready(Ok(Some(event)))
    }
}

async fn next_event(mut partial_state: PartialState) -> NextEvent {
    loop {
        if let Some(event) = partial_state.pending_events.pop_front() {
            return Ok((Some(event), partial_state));
        }
        if partial_state.finished {
            return Ok((None, partial_state));
        }

        let sse_event = match partial_state.sse.next_event().await {
            Ok(Some(event)) => event,
            Ok(None) => {
                // Some proxies close the stream without a finish reason.
                partial_state.finished = true;
                partial_state
                    .pending_events
                    .push_back(ModelResponseEvent::Completed(
                        ModelFinishReason::Stop,
                    ));
                continue;
            }
            Err(SseError::ChunksError(err)) => {
                return Err(Error::new(err.0, ErrorKind::Network));
            }
            Err(err) => {
                return Err(Error::new(format!("{err:?}"), ErrorKind::Other));
            }
        };
        trace!("got sse event: {sse_event}");

        let chunk = serde_json::from_str::<GenerateContentChunk>(&sse_event)
            .map_err(|err| Error::new(format!("{err}"), ErrorKind::Other))?;
        decode_chunk(&chunk, &mut partial_state)?;
    }
}

fn decode_chunk(
    chunk: &GenerateContentChunk,
    partial_state: &mut PartialState,
) -> Result<(), Error> {
    if let Some(reason) = chunk.block_reason() {
        return Err(Error::new(
            format!("prompt blocked: {reason}"),
            ErrorKind::Moderated,
        ));
    }

    if let Some(text) = chunk.text() {
        partial_state
            .pending_events
            .push_back(ModelResponseEvent::MessageDelta(text));
    }

    let finish_reason = match chunk.finish_reason() {
        None | Some("FINISH_REASON_UNSPECIFIED") => return Ok(()),
        Some("STOP") => ModelFinishReason::Stop,
        Some("MAX_TOKENS") => ModelFinishReason::Length,
        Some(
            reason @ ("SAFETY" | "RECITATION" | "BLOCKLIST"
            | "PROHIBITED_CONTENT" | "SPII"),
        ) => {
            return Err(Error::new(
                format!("response blocked: {reason}"),
                ErrorKind::Moderated,
            ));
        }
        Some(reason) => {
            debug!("unrecognized finish reason: {reason}");
            ModelFinishReason::Stop
        }
    };
    partial_state.finished = true;
    partial_state
        .pending_events
        .push_back(ModelResponseEvent::Completed(finish_reason));
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use bytes::Bytes;
    use stepwise_model::ModelProviderError;

    use super::*;
    use crate::io::Chunks;

    async fn collect(
        body: &'static [u8],
    ) -> (String, Vec<ModelResponseEvent>, Option<Error>) {
        let chunks =
            Chunks::from_vec_deque(vec![Bytes::from_static(body)].into());
        let mut resp = pin!(GeminiResponse::from_sse(Sse::new(chunks)));
        let mut text = String::new();
        let mut events = vec![];
        loop {
            match poll_fn(|cx| resp.as_mut().poll_next_event(cx)).await {
                Ok(Some(event)) => {
                    if let ModelResponseEvent::MessageDelta(delta) = &event {
                        text.push_str(delta);
                    }
                    events.push(event);
                }
                Ok(None) => return (text, events, None),
                Err(err) => return (text, events, Some(err)),
            }
        }
    }

    #[tokio::test]
    async fn test_simple_events() {
        let (text, events, err) =
            collect(include_bytes!("../fixtures/test_response.txt")).await;
        assert!(err.is_none());
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["step"], "action");
        assert_eq!(value["function"], "get_weather");
        assert_eq!(
            events.last(),
            Some(&ModelResponseEvent::Completed(ModelFinishReason::Stop))
        );
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, ModelResponseEvent::Completed(_)))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_safety_block() {
        let (_, _, err) = collect(
            b"data: {\"candidates\": [{\"finishReason\": \"SAFETY\"}]}\r\n\r\n",
        )
        .await;
        assert_eq!(err.unwrap().kind(), ErrorKind::Moderated);
    }

    #[tokio::test]
    async fn test_truncated_stream() {
        let (text, events, err) = collect(
            b"data: {\"candidates\": [{\"content\": {\"parts\": [{\"text\": \"{\"}]}}]}\n\n",
        )
        .await;
        assert!(err.is_none());
        assert_eq!(text, "{");
        assert_eq!(
            events.last(),
            Some(&ModelResponseEvent::Completed(ModelFinishReason::Stop))
        );
    }
}

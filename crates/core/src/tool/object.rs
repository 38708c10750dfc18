use std::pin::Pin;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::Instrument;

use super::{Approval, Error, Tool, ToolResult};

pub(crate) type ApprovalHandler = Arc<dyn Fn(Approval) + Send + Sync>;

pub(crate) trait ToolObject: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameter_schema(&self) -> &Value;

    fn execute(
        self: Arc<Self>,
        arguments: Value,
        on_request: Option<&ApprovalHandler>,
    ) -> Pin<Box<dyn Future<Output = ToolResult> + Send>>;
}

pub(crate) struct ToolObjectImpl<T: Tool>(pub T);

impl<T: Tool> ToolObject for ToolObjectImpl<T> {
    #[inline]
    fn name(&self) -> &str {
        self.0.name()
    }

    #[inline]
    fn description(&self) -> &str {
        self.0.description()
    }

    #[inline]
    fn parameter_schema(&self) -> &Value {
        self.0.parameter_schema()
    }

    fn execute(
        self: Arc<Self>,
        arguments: Value,
        on_request: Option<&ApprovalHandler>,
    ) -> Pin<Box<dyn Future<Output = ToolResult> + Send>> {
        let input: T::Input = match decode_input(arguments) {
            Ok(input) => input,
            Err(err) => return Box::pin(std::future::ready(Err(err))),
        };

        let Some(mut approval) = self.0.make_approval(&input) else {
            return Box::pin(
                async move { self.0.execute(input).await }
                    .instrument(debug_span!("tool execute")),
            );
        };

        let (approval_res_tx, approval_res_rx) = oneshot::channel();
        approval.on_result = Some(Box::new(move |result| {
            approval_res_tx.send(result).ok();
        }));

        if let Some(on_request) = on_request {
            on_request(approval);
        } else {
            // No request handler provided, assuming yolo mode.
            approval.approve();
        }

        Box::pin(
            async move {
                // The handler dropped the approval without deciding.
                let Ok(approval_res) = approval_res_rx.await else {
                    return Err(Error::user_rejected());
                };
                trace!("tool call approval result: {approval_res:?}");
                if !approval_res.approved {
                    let mut err = Error::user_rejected();
                    if let Some(reason) = approval_res.why {
                        err = err.with_reason(reason);
                    }
                    return Err(err);
                }
                self.0.execute(input).await
            }
            .instrument(debug_span!("tool execute")),
        )
    }
}

/// Decodes the raw model input into the tool's input type.
///
/// Models often send structured input as a JSON-encoded string, so a string
/// that fails to decode directly is decoded once more as JSON.
pub(crate) fn decode_input<I: DeserializeOwned>(
    arguments: Value,
) -> Result<I, Error> {
    let direct_err = match I::deserialize(&arguments) {
        Ok(input) => return Ok(input),
        Err(err) => err,
    };

    let nested = match &arguments {
        Value::String(s) => serde_json::from_str::<Value>(s).ok(),
        _ => None,
    };
    let err = match nested {
        Some(nested) => match I::deserialize(nested) {
            Ok(input) => return Ok(input),
            Err(err) => err,
        },
        None => direct_err,
    };
    Err(Error::invalid_input().with_reason(err.to_string()))
}

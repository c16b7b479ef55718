use std::pin::Pin;
use std::sync::Arc;

use pybox_model::{
    ModelProvider, ModelProviderError, ModelRequest, ModelTurn,
};
use tracing::Instrument;

type SendRequestResult = Result<ModelTurn, Box<dyn ModelProviderError>>;
type BoxedSendRequestFuture =
    Pin<Box<dyn Future<Output = SendRequestResult> + Send>>;
type HandlerFn =
    Arc<dyn Fn(ModelRequest) -> BoxedSendRequestFuture + Send + Sync>;

/// A wrapper around a model provider that provides a type-erased
/// interface for the other modules.
#[derive(Clone)]
pub struct ModelClient {
    handler_fn: HandlerFn,
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
                    trace!("got a request: {req:?}");
                    let turn = match fut.await {
                        Ok(turn) => turn,
                        Err(err) => {
                            error!("got an error: {err:?}");
                            return Err(
                                Box::new(err) as Box<dyn ModelProviderError>
                            );
                        }
                    };
                    trace!("finished a request");
                    Ok(turn)
                }
                .instrument(trace_span!("model client req")),
            )
        });
        Self { handler_fn }
    }

    /// Sends a request and resolves to the complete turn.
    #[inline]
    pub async fn send_request(&self, req: ModelRequest) -> SendRequestResult {
        (self.handler_fn)(req).await
    }
}

#[cfg(test)]
mod tests {
    use pybox_model::{ErrorKind, ModelFinishReason, ModelMessage};
    use pybox_test_model::{PresetTurn, TestModelProvider};

    use super::*;

    #[tokio::test]
    async fn test_send_request() {
        let mut model_provider = TestModelProvider::default();
        model_provider.add_incoming_step();
        model_provider
            .add_assistant_turn(PresetTurn::with_content("How are you?"));

        let model_client = ModelClient::new(model_provider);

        for _ in 0..3 {
            let turn = model_client
                .send_request(ModelRequest {
                    messages: vec![ModelMessage::User("Hi".to_owned())],
                    tools: vec![],
                })
                .await
                .unwrap();
            assert_eq!(turn.content(), "How are you?");
            assert_eq!(turn.finish_reason, ModelFinishReason::Stop);
        }
    }

    #[tokio::test]
    async fn test_error_handling() {
        let model_provider = TestModelProvider::default();
        let model_client = ModelClient::new(model_provider);
        let turn_or_err = model_client
            .send_request(ModelRequest {
                messages: vec![ModelMessage::User("Hi".to_owned())],
                tools: vec![],
            })
            .await;
        let err = turn_or_err.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);
    }
}

//! The completion-service seam.
//!
//! The turn loop only needs "send this request, report events as they
//! arrive". [`ChatClient`] implements it over HTTP; tests implement it with
//! scripted responses.

use super::retry::retry_api_call;
use super::streaming::StreamEvent;
use crate::{ApiError, ChatClient, ChatRequest};
use futures::future::BoxFuture;
use std::sync::atomic::{AtomicBool, Ordering};

/// Callback receiving stream events in order.
pub type EventSink<'a> = &'a mut (dyn FnMut(&StreamEvent) + Send);

/// A streaming chat completion provider.
pub trait CompletionService: Send + Sync {
    /// Stream a completion for `request`, calling `on_event` for each event
    /// as it arrives. Returns every event once the stream has ended.
    fn stream_chat<'a>(
        &'a self,
        request: &'a ChatRequest,
        on_event: EventSink<'a>,
    ) -> BoxFuture<'a, Result<Vec<StreamEvent>, ApiError>>;
}

impl CompletionService for ChatClient {
    fn stream_chat<'a>(
        &'a self,
        request: &'a ChatRequest,
        on_event: EventSink<'a>,
    ) -> BoxFuture<'a, Result<Vec<StreamEvent>, ApiError>> {
        Box::pin(async move {
            let sink = tokio::sync::Mutex::new(on_event);
            let delivered = AtomicBool::new(false);
            let (sink, delivered) = (&sink, &delivered);
            retry_api_call(&self.retry, || async move {
                let mut on_event = sink.lock().await;
                self.chat_stream_live(request, |ev| {
                    delivered.store(true, Ordering::Relaxed);
                    (*on_event)(ev);
                })
                .await
                .map_err(|e| (e, delivered.load(Ordering::Relaxed)))
            })
            .await
        })
    }
}

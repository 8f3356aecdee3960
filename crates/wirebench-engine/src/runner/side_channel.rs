//! Execution side-channel for HTTP response artifacts.
//!
//! Request nodes push their full response bundle here instead of
//! persisting inline. A single drainer task per run consumes the
//! channel, persists each artifact through the sink (which also
//! publishes the insert events), and acks. The runner waits on the
//! ack before emitting the node's terminal execution event, which is
//! what keeps response, header, and assert events strictly before the
//! owning node's `success`.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::id::Id;
use crate::model::{HttpResponse, ResponseAssert, ResponseHeader};
use crate::runner::{RunSink, SinkError};

pub const SIDE_CHANNEL_CAPACITY: usize = 16;

/// One completed HTTP call, ready to persist.
pub struct ResponseArtifact {
    pub flow_id: Id,
    pub response: HttpResponse,
    pub headers: Vec<ResponseHeader>,
    pub asserts: Vec<ResponseAssert>,
    /// Resolved once the artifact is persisted and its events are out.
    pub done: oneshot::Sender<()>,
}

/// Spawn the per-run drainer. The channel closes when every sender is
/// dropped; the drainer then returns and the handle yields any sink
/// error it hit.
pub fn spawn_drainer(
    sink: Arc<dyn RunSink>,
) -> (mpsc::Sender<ResponseArtifact>, JoinHandle<Result<(), SinkError>>) {
    let (tx, mut rx) = mpsc::channel::<ResponseArtifact>(SIDE_CHANNEL_CAPACITY);
    let handle = tokio::spawn(async move {
        while let Some(artifact) = rx.recv().await {
            sink.persist_response(
                artifact.flow_id,
                &artifact.response,
                &artifact.headers,
                &artifact.asserts,
            )
            .await?;
            // The node may have timed out and stopped waiting.
            let _ = artifact.done.send(());
        }
        Ok(())
    });
    (tx, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::tests::RecordingSink;

    fn artifact(flow_id: Id, done: oneshot::Sender<()>) -> ResponseArtifact {
        let response = HttpResponse {
            id: Id::generate(),
            request_node_id: Id::generate(),
            status: 200,
            body: b"{}".to_vec(),
            duration_ms: 3,
        };
        ResponseArtifact {
            flow_id,
            response,
            headers: vec![],
            asserts: vec![],
            done,
        }
    }

    #[tokio::test]
    async fn ack_follows_persist() {
        let sink = Arc::new(RecordingSink::default());
        let (tx, drainer) = spawn_drainer(sink.clone());
        let flow_id = Id::generate();

        let (done_tx, done_rx) = oneshot::channel();
        tx.send(artifact(flow_id, done_tx)).await.unwrap();
        done_rx.await.unwrap();
        assert_eq!(sink.responses().len(), 1);

        drop(tx);
        drainer.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn drainer_exits_when_channel_closes() {
        let sink = Arc::new(RecordingSink::default());
        let (tx, drainer) = spawn_drainer(sink);
        drop(tx);
        drainer.await.unwrap().unwrap();
    }
}

//! Transactional bulk helper: commit first, publish after.
//!
//! Handlers validate before calling [`ChangeTxn::begin`], perform only
//! writes inside the transaction, and queue the events those writes
//! would imply with [`ChangeTxn::track`]. On commit the queued events
//! are flushed to the hub; on rollback (explicit or by drop) nothing
//! is published, so subscribers never observe uncommitted state.

use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};

use wirebench_engine::event::{ChangeEvent, EventHub};

use crate::StoreError;

pub struct ChangeTxn {
    txn: DatabaseTransaction,
    pending: Vec<ChangeEvent>,
}

impl ChangeTxn {
    pub async fn begin(db: &DatabaseConnection) -> Result<Self, StoreError> {
        Ok(Self {
            txn: db.begin().await?,
            pending: Vec::new(),
        })
    }

    /// The write connection for store calls inside this transaction.
    pub fn conn(&self) -> &DatabaseTransaction {
        &self.txn
    }

    /// Queue the event this transaction's writes imply. Nothing is
    /// published until commit.
    pub fn track(&mut self, event: ChangeEvent) {
        self.pending.push(event);
    }

    pub fn tracked(&self) -> usize {
        self.pending.len()
    }

    /// Commit, then flush every tracked event to the hub in order.
    /// Publishing happens outside the commit path; a slow subscriber
    /// cannot stall the writer.
    pub async fn commit_and_publish(self, hub: &EventHub) -> Result<(), StoreError> {
        self.txn.commit().await?;
        for event in self.pending {
            hub.publish(event).await;
        }
        Ok(())
    }

    pub async fn rollback(self) -> Result<(), StoreError> {
        self.txn.rollback().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::flow_store;
    use crate::test_db;
    use wirebench_engine::event::Change;
    use wirebench_engine::model::Flow;
    use wirebench_engine::Id;

    fn flow() -> Flow {
        Flow {
            id: Id::generate(),
            workspace_id: Id::generate(),
            name: "txn test".into(),
            running: false,
            duration_ms: None,
            version_parent_id: None,
        }
    }

    #[tokio::test]
    async fn commit_publishes_tracked_events() {
        let db = test_db().await;
        let hub = EventHub::new();
        let flow = flow();
        let mut sub = hub.flows.subscribe(|_| true).await;

        let mut txn = ChangeTxn::begin(&db).await.unwrap();
        flow_store::insert(txn.conn(), &flow).await.unwrap();
        txn.track(ChangeEvent::Flow {
            workspace_id: flow.workspace_id,
            change: Change::insert(flow.id, flow.clone()),
        });
        txn.commit_and_publish(&hub).await.unwrap();

        let (topic, change) = sub.recv().await.unwrap();
        assert_eq!(topic, flow.workspace_id);
        assert_eq!(change.id, flow.id);
        assert!(flow_store::get(&db, flow.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn rollback_publishes_nothing() {
        let db = test_db().await;
        let hub = EventHub::new();
        let flow = flow();
        let mut sub = hub.flows.subscribe(|_| true).await;

        let mut txn = ChangeTxn::begin(&db).await.unwrap();
        flow_store::insert(txn.conn(), &flow).await.unwrap();
        txn.track(ChangeEvent::Flow {
            workspace_id: flow.workspace_id,
            change: Change::insert(flow.id, flow.clone()),
        });
        txn.rollback().await.unwrap();

        assert!(sub.try_recv().is_none());
        assert!(flow_store::get(&db, flow.id).await.unwrap().is_none());
    }
}

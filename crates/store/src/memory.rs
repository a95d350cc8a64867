//! Process-local contribution store.

use async_trait::async_trait;
use pipeline::{
    ActorId, Contribution, ContributionId, ContributionStatus, ContributionStore,
    NewContribution, StoreError, Timestamp,
};
use tokio::sync::RwLock;

/// Keeps contributions in memory, in insertion order.
///
/// Records do not survive the process; use
/// [`JsonFileContributionStore`](crate::JsonFileContributionStore) for that.
#[derive(Debug, Default)]
pub struct InMemoryContributionStore {
    records: RwLock<Vec<Contribution>>,
}

impl InMemoryContributionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl ContributionStore for InMemoryContributionStore {
    async fn insert(&self, contribution: NewContribution) -> Result<Contribution, StoreError> {
        let record =
            Contribution::from_new(ContributionId::new_random(), contribution, Timestamp::now());
        self.records.write().await.push(record.clone());
        Ok(record)
    }

    async fn get(&self, id: ContributionId) -> Result<Option<Contribution>, StoreError> {
        Ok(self.records.read().await.iter().find(|c| c.id == id).cloned())
    }

    async fn list(&self, actor: Option<&ActorId>) -> Result<Vec<Contribution>, StoreError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|c| actor.map_or(true, |a| &c.actor == a))
            .cloned()
            .collect())
    }

    async fn update_status(
        &self,
        id: ContributionId,
        status: ContributionStatus,
    ) -> Result<Contribution, StoreError> {
        let mut records = self.records.write().await;
        let record = records
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(StoreError::NotFound(id))?;
        record.status = status;
        record.updated_at = Timestamp::now();
        Ok(record.clone())
    }
}

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use corpreg_companies::{Company, CompanyDraft, CompanyFilter};
use corpreg_core::CompanyId;

use super::{CompanyStore, CompanyTx, StoreError};

type Rows = BTreeMap<CompanyId, Company>;

fn poisoned(operation: &'static str) -> StoreError {
    StoreError::Connection {
        operation,
        message: "in-memory store lock poisoned".to_string(),
    }
}

/// In-memory company table.
///
/// Intended for tests/dev. Each transaction stages its writes in a private
/// overlay and applies them on commit, so uncommitted writes are invisible to
/// other readers. Ids come from a counter that is never rolled back, like a
/// database sequence.
#[derive(Debug, Default)]
pub struct InMemoryCompanyStore {
    rows: Arc<RwLock<Rows>>,
    next_id: Arc<AtomicU64>,
}

impl InMemoryCompanyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed rows.
    pub fn len(&self) -> usize {
        self.rows.read().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CompanyStore for InMemoryCompanyStore {
    async fn begin(&self) -> Result<Box<dyn CompanyTx>, StoreError> {
        Ok(Box::new(InMemoryTx {
            rows: Arc::clone(&self.rows),
            next_id: Arc::clone(&self.next_id),
            staged: BTreeMap::new(),
        }))
    }

    async fn list(&self, filter: &CompanyFilter) -> Result<Vec<Company>, StoreError> {
        let rows = self.rows.read().map_err(|_| poisoned("list"))?;
        Ok(rows.values().filter(|c| filter.matches(c)).cloned().collect())
    }

    async fn get(&self, id: CompanyId) -> Result<Option<Company>, StoreError> {
        let rows = self.rows.read().map_err(|_| poisoned("get"))?;
        Ok(rows.get(&id).cloned())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.rows.read().map(|_| ()).map_err(|_| poisoned("ping"))
    }

    async fn close(&self) {}
}

struct InMemoryTx {
    rows: Arc<RwLock<Rows>>,
    next_id: Arc<AtomicU64>,
    /// `Some` = upsert, `None` = delete.
    staged: BTreeMap<CompanyId, Option<Company>>,
}

impl InMemoryTx {
    fn read(&self, id: CompanyId) -> Result<Option<Company>, StoreError> {
        if let Some(staged) = self.staged.get(&id) {
            return Ok(staged.clone());
        }
        let rows = self.rows.read().map_err(|_| poisoned("get"))?;
        Ok(rows.get(&id).cloned())
    }
}

#[async_trait]
impl CompanyTx for InMemoryTx {
    async fn insert(&mut self, draft: &CompanyDraft) -> Result<CompanyId, StoreError> {
        let id = CompanyId::new(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.staged
            .insert(id, Some(Company::from_draft(id, draft.clone())));
        Ok(id)
    }

    async fn update(&mut self, id: CompanyId, draft: &CompanyDraft) -> Result<(), StoreError> {
        let mut company = self.read(id)?.ok_or(StoreError::NotFound)?;
        company.overwrite(draft.clone());
        self.staged.insert(id, Some(company));
        Ok(())
    }

    async fn delete(&mut self, id: CompanyId) -> Result<(), StoreError> {
        self.read(id)?.ok_or(StoreError::NotFound)?;
        self.staged.insert(id, None);
        Ok(())
    }

    async fn get(&mut self, id: CompanyId) -> Result<Option<Company>, StoreError> {
        self.read(id)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut rows = self.rows.write().map_err(|_| poisoned("commit"))?;
        for (id, change) in self.staged {
            match change {
                Some(company) => {
                    rows.insert(id, company);
                }
                None => {
                    rows.remove(&id);
                }
            }
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(name: &str) -> CompanyDraft {
        CompanyDraft {
            name: name.to_string(),
            ..CompanyDraft::default()
        }
    }

    #[tokio::test]
    async fn committed_insert_is_visible() {
        let store = InMemoryCompanyStore::new();
        let mut tx = store.begin().await.unwrap();
        let id = tx.insert(&draft("Acme")).await.unwrap();
        assert!(store.get(id).await.unwrap().is_none());
        tx.commit().await.unwrap();

        let stored = store.get(id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Acme");
    }

    #[tokio::test]
    async fn rollback_discards_writes_but_not_ids() {
        let store = InMemoryCompanyStore::new();
        let mut tx = store.begin().await.unwrap();
        let first = tx.insert(&draft("Acme")).await.unwrap();
        tx.rollback().await.unwrap();
        assert!(store.is_empty());

        let mut tx = store.begin().await.unwrap();
        let second = tx.insert(&draft("Acme")).await.unwrap();
        tx.commit().await.unwrap();
        assert!(second > first);
    }

    #[tokio::test]
    async fn tx_reads_its_own_writes() {
        let store = InMemoryCompanyStore::new();
        let mut tx = store.begin().await.unwrap();
        let id = tx.insert(&draft("Acme")).await.unwrap();
        tx.update(id, &draft("Renamed")).await.unwrap();
        assert_eq!(tx.get(id).await.unwrap().unwrap().name, "Renamed");

        tx.delete(id).await.unwrap();
        assert!(tx.get(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_and_delete_of_missing_row_are_not_found() {
        let store = InMemoryCompanyStore::new();
        let mut tx = store.begin().await.unwrap();
        let missing = CompanyId::new(404);
        assert_eq!(tx.update(missing, &draft("x")).await, Err(StoreError::NotFound));
        assert_eq!(tx.delete(missing).await, Err(StoreError::NotFound));
    }

    #[tokio::test]
    async fn list_applies_filter_in_id_order() {
        let store = InMemoryCompanyStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert(&draft("Beta Ltd")).await.unwrap();
        tx.insert(&draft("Alpha Ltd")).await.unwrap();
        tx.insert(&draft("Gamma Inc")).await.unwrap();
        tx.commit().await.unwrap();

        let filter = CompanyFilter {
            name: "Ltd".to_string(),
            ..CompanyFilter::default()
        };
        let names: Vec<_> = store
            .list(&filter)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Beta Ltd", "Alpha Ltd"]);
    }
}

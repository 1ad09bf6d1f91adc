use async_trait::async_trait;

use crate::model::*;
use crate::repository::{PropertyRepository, StoreResult};

use super::Store;

#[async_trait]
impl PropertyRepository for Store {
    async fn get_property(&self, id: PropertyId) -> StoreResult<Option<Property>> {
        Ok(self.inner.properties.get(&id).map(|e| e.value().clone()))
    }

    async fn search_properties(&self, filter: &SearchFilter) -> StoreResult<Vec<Property>> {
        let Some(primary) = filter.primary() else {
            return Ok(Vec::new());
        };
        let mut found: Vec<Property> = self
            .inner
            .search
            .lookup(&primary)
            .into_iter()
            .filter_map(|id| self.inner.properties.get(&id).map(|e| e.value().clone()))
            .filter(|p| filter.matches(p))
            .collect();
        found.sort_by_key(|p| p.id);
        Ok(found)
    }
}

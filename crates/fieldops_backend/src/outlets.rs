use crate::{BackendError, FieldOpsDb, Query, Result, Table};
use fieldops_ids::OutletId;
use fieldops_protocol::{Outlet, OutletDraft};

impl FieldOpsDb {
    pub async fn list_outlets(&self) -> Result<Vec<Outlet>> {
        self.select_as(Table::Outlets, &Query::new().order_by("name", true))
            .await
    }

    pub async fn add_outlet(&self, draft: &OutletDraft) -> Result<Outlet> {
        self.insert_as(Table::Outlets, std::slice::from_ref(draft))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::not_found("insert into outlets returned no row"))
    }

    pub async fn update_outlet(&self, id: &OutletId, draft: &OutletDraft) -> Result<Outlet> {
        self.update_by_id(Table::Outlets, id.as_str(), serde_json::to_value(draft)?)
            .await
    }

    pub async fn delete_outlet(&self, id: &OutletId) -> Result<()> {
        self.delete_by_id(Table::Outlets, id.as_str()).await
    }
}

//! List-level mutations that live outside the form: confirmed deletes and
//! comment pinning.

use futures::future::join_all;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{DashboardError, DashboardResult};
use crate::models::{Comment, Record, RecordKind};
use crate::store::{DocumentStore, WriteData};
use crate::sync::CollectionSync;

/// A blocking yes/no prompt shown before a destructive action.
pub trait Confirm {
    fn confirm(&mut self, prompt: &str) -> bool;
}

/// A pre-answered prompt, e.g. the `confirm=true` query flag of a request.
impl Confirm for bool {
    fn confirm(&mut self, _prompt: &str) -> bool {
        *self
    }
}

/// Adapts a closure into a prompt.
pub struct PromptFn<F>(pub F);

impl<F: FnMut(&str) -> bool> Confirm for PromptFn<F> {
    fn confirm(&mut self, prompt: &str) -> bool {
        (self.0)(prompt)
    }
}

pub fn delete_prompt(kind: RecordKind, count: usize) -> String {
    let schema = kind.schema();
    if count == 1 {
        format!("Are you sure you want to delete this {}?", schema.singular)
    } else {
        format!(
            "Are you sure you want to delete {} {}?",
            count,
            schema.label.to_lowercase()
        )
    }
}

/// Deletes one record after confirmation. Local state is only touched when
/// the store accepted the delete.
pub async fn delete_record<R: Record>(
    store: &dyn DocumentStore,
    sync: Option<&CollectionSync<R>>,
    id: &str,
    confirm: &mut impl Confirm,
) -> DashboardResult<()> {
    if !confirm.confirm(&delete_prompt(R::KIND, 1)) {
        return Err(DashboardError::NotConfirmed);
    }

    if let Err(e) = store.delete(&R::KIND.collection().doc(id)).await {
        warn!(collection = R::KIND.as_str(), id = %id, "Delete failed: {}", e);
        return Err(e.into());
    }

    if let Some(sync) = sync {
        sync.remove_local(&[id.to_string()]);
    }
    info!(collection = R::KIND.as_str(), id = %id, "Record deleted");
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkDeleteFailure {
    pub id: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkDeleteReport {
    pub deleted: Vec<String>,
    pub failed: Vec<BulkDeleteFailure>,
}

impl BulkDeleteReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Deletes every id concurrently after a single confirmation. Only ids the
/// store confirmed deleted are pruned from local state.
pub async fn bulk_delete<R: Record>(
    store: &dyn DocumentStore,
    sync: Option<&CollectionSync<R>>,
    ids: &[String],
    confirm: &mut impl Confirm,
) -> DashboardResult<BulkDeleteReport> {
    let mut unique: Vec<&String> = Vec::with_capacity(ids.len());
    for id in ids {
        if !unique.contains(&id) {
            unique.push(id);
        }
    }
    if unique.is_empty() {
        return Ok(BulkDeleteReport::default());
    }

    if !confirm.confirm(&delete_prompt(R::KIND, unique.len())) {
        return Err(DashboardError::NotConfirmed);
    }

    let collection = R::KIND.collection();
    let results = join_all(unique.iter().map(|id| {
        let doc = collection.doc(id.as_str());
        async move { (doc.id.clone(), store.delete(&doc).await) }
    }))
    .await;

    let mut report = BulkDeleteReport::default();
    for (id, result) in results {
        match result {
            Ok(()) => report.deleted.push(id),
            Err(e) => report.failed.push(BulkDeleteFailure {
                id,
                error: e.to_string(),
            }),
        }
    }

    if let Some(sync) = sync {
        sync.remove_local(&report.deleted);
    }
    info!(
        collection = R::KIND.as_str(),
        deleted = report.deleted.len(),
        failed = report.failed.len(),
        "Bulk delete finished"
    );
    Ok(report)
}

fn pin_flag(pinned: bool) -> WriteData {
    WriteData::new().set("isPinned", pinned)
}

/// Pins `id` after unpinning every other pinned comment. If any unpin fails
/// the target is left untouched, so a failed run never leaves two comments
/// pinned.
pub async fn pin_comment(
    store: &dyn DocumentStore,
    sync: Option<&CollectionSync<Comment>>,
    id: &str,
) -> DashboardResult<()> {
    let comments = RecordKind::Comments.collection();
    let pinned: Vec<String> = store
        .fetch(&comments.query())
        .await?
        .into_iter()
        .filter(|doc| doc.id != id && doc.get("isPinned").and_then(|v| v.as_bool()) == Some(true))
        .map(|doc| doc.id)
        .collect();

    for other in &pinned {
        if let Err(e) = store.update_fields(&comments.doc(other.as_str()), pin_flag(false)).await {
            warn!(id = %other, "Failed to unpin previous comment: {}", e);
            return Err(e.into());
        }
        if let Some(sync) = sync {
            sync.modify_local(other, |c| c.is_pinned = false);
        }
    }

    store.update_fields(&comments.doc(id), pin_flag(true)).await?;
    if let Some(sync) = sync {
        sync.modify_local(id, |c| c.is_pinned = true);
    }
    info!(id = %id, unpinned = pinned.len(), "Comment pinned");
    Ok(())
}

pub async fn unpin_comment(
    store: &dyn DocumentStore,
    sync: Option<&CollectionSync<Comment>>,
    id: &str,
) -> DashboardResult<()> {
    store
        .update_fields(&RecordKind::Comments.collection().doc(id), pin_flag(false))
        .await?;
    if let Some(sync) = sync {
        sync.modify_local(id, |c| c.is_pinned = false);
    }
    info!(id = %id, "Comment unpinned");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Project;
    use crate::store::memory::InMemoryStore;
    use crate::store::{CollectionRef, StoreError};
    use serde_json::json;

    async fn seed_comment(store: &InMemoryStore, name: &str, pinned: bool) -> String {
        store
            .create(
                &CollectionRef::new("comments"),
                WriteData::new()
                    .set("name", name)
                    .set("message", "hi")
                    .set("isPinned", pinned),
            )
            .await
            .unwrap()
    }

    fn pinned_ids(store: &InMemoryStore) -> Vec<String> {
        store
            .documents("comments")
            .into_iter()
            .filter(|d| d.get("isPinned") == Some(&json!(true)))
            .map(|d| d.id)
            .collect()
    }

    #[tokio::test]
    async fn test_unconfirmed_delete_touches_nothing() {
        let store = InMemoryStore::new();
        let id = seed_comment(&store, "Ann", false).await;
        let mut prompts = Vec::new();
        let mut confirm = PromptFn(|p: &str| {
            prompts.push(p.to_string());
            false
        });

        let err = delete_record::<Comment>(&store, None, &id, &mut confirm)
            .await
            .unwrap_err();
        assert!(matches!(err, DashboardError::NotConfirmed));
        assert_eq!(store.documents("comments").len(), 1);
        assert_eq!(prompts, ["Are you sure you want to delete this comment?"]);
    }

    #[tokio::test]
    async fn test_confirmed_delete_of_missing_record_is_an_error() {
        let store = InMemoryStore::new();
        let err = delete_record::<Project>(&store, None, "nope", &mut true)
            .await
            .unwrap_err();
        assert!(matches!(err, DashboardError::Store(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_bulk_delete_prunes_only_confirmed_ids() {
        let store = InMemoryStore::new();
        let a = seed_comment(&store, "Ann", false).await;
        let b = seed_comment(&store, "Bob", false).await;
        let c = seed_comment(&store, "Cy", false).await;
        store.deny_document("comments", &b, "Missing or insufficient permissions.");

        let sync = CollectionSync::<Comment>::new(std::sync::Arc::new(store.clone()));
        sync.subscribe_default().await;
        assert!(sync.wait_for_load(std::time::Duration::from_secs(2)).await);

        let ids = vec![a.clone(), b.clone(), c.clone(), a.clone()];
        let report = bulk_delete(&store, Some(&sync), &ids, &mut true).await.unwrap();

        assert_eq!(report.deleted.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].id, b);
        let remaining: Vec<_> = sync.records().into_iter().map(|r| r.id).collect();
        assert_eq!(remaining, [b.clone()]);
        assert_eq!(store.documents("comments").len(), 1);
    }

    #[tokio::test]
    async fn test_bulk_delete_asks_once() {
        let store = InMemoryStore::new();
        let a = seed_comment(&store, "Ann", false).await;
        let b = seed_comment(&store, "Bob", false).await;
        let mut asked = 0;
        let mut confirm = PromptFn(|p: &str| {
            asked += 1;
            assert_eq!(p, "Are you sure you want to delete 2 comments?");
            false
        });
        let err = bulk_delete::<Comment>(&store, None, &[a, b], &mut confirm)
            .await
            .unwrap_err();
        assert!(matches!(err, DashboardError::NotConfirmed));
        assert_eq!(asked, 1);
        assert_eq!(store.documents("comments").len(), 2);
    }

    #[tokio::test]
    async fn test_pin_moves_the_single_pin() {
        let store = InMemoryStore::new();
        let a = seed_comment(&store, "Ann", true).await;
        let b = seed_comment(&store, "Bob", false).await;

        pin_comment(&store, None, &b).await.unwrap();
        assert_eq!(pinned_ids(&store), [b.clone()]);

        pin_comment(&store, None, &a).await.unwrap();
        assert_eq!(pinned_ids(&store), [a.clone()]);

        unpin_comment(&store, None, &a).await.unwrap();
        assert!(pinned_ids(&store).is_empty());
    }

    #[tokio::test]
    async fn test_failed_unpin_leaves_target_unpinned() {
        let store = InMemoryStore::new();
        let a = seed_comment(&store, "Ann", true).await;
        let b = seed_comment(&store, "Bob", false).await;
        store.deny_document("comments", &a, "Missing or insufficient permissions.");

        let err = pin_comment(&store, None, &b).await.unwrap_err();
        assert!(err.is_store_error());
        assert_eq!(pinned_ids(&store), [a]);
    }
}

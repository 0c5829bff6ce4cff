//! JSON seed import for the administrator-keyed collections.
//!
//! A seed file holds `projects` and `certificates` arrays. Each entry goes
//! through the same form validation as a dashboard create and is upserted by
//! its own `id`, so importing twice replaces content but keeps `createdAt`.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::StartupError;
use crate::form::FormController;
use crate::models::{Certificate, Project, Record, RecordKind};
use crate::store::DocumentStore;

#[derive(Debug, Default, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub projects: Vec<Value>,
    #[serde(default)]
    pub certificates: Vec<Value>,
}

impl SeedData {
    pub fn from_file(path: &Path) -> Result<Self, StartupError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| StartupError::Seed(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&raw)
            .map_err(|e| StartupError::Seed(format!("{}: {}", path.display(), e)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedEntry {
    pub kind: RecordKind,
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub imported: Vec<(RecordKind, String)>,
    pub skipped: Vec<SkippedEntry>,
}

async fn import_entries<R: Record>(
    store: &dyn DocumentStore,
    entries: Vec<Value>,
    report: &mut SeedReport,
) {
    for (index, entry) in entries.into_iter().enumerate() {
        let outcome = match serde_json::from_value::<R::Draft>(entry) {
            Ok(draft) => {
                let mut form = FormController::<R>::new();
                form.open_for_create();
                match form.set_draft(draft) {
                    Ok(()) => form.submit(store, None).await.map_err(|e| e.to_string()),
                    Err(e) => Err(e.to_string()),
                }
            }
            Err(e) => Err(e.to_string()),
        };

        match outcome {
            Ok(id) => report.imported.push((R::KIND, id)),
            Err(reason) => {
                warn!(collection = R::KIND.as_str(), index, "Skipping seed entry: {}", reason);
                report.skipped.push(SkippedEntry {
                    kind: R::KIND,
                    index,
                    reason,
                });
            }
        }
    }
}

/// Upserts every valid entry. Invalid entries are reported, not fatal.
pub async fn import(store: &dyn DocumentStore, seed: SeedData) -> SeedReport {
    let mut report = SeedReport::default();
    import_entries::<Project>(store, seed.projects, &mut report).await;
    import_entries::<Certificate>(store, seed.certificates, &mut report).await;
    info!(
        imported = report.imported.len(),
        skipped = report.skipped.len(),
        backend = store.backend_name(),
        "Seed import finished"
    );
    report
}

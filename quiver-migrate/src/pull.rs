//! Importing live resources into state.
//!
//! Pulling records indexes and indexers that already exist on the service so
//! that later diffs treat them as managed. The stored checksum is computed
//! from the definition the service returns. Data sources are not pulled: the
//! service never returns their credentials, so no checksum taken remotely
//! could match a declared connection string.

use crate::diff::BuiltResource;
use crate::error::MigrateResult;
use crate::resource::{NewResource, Resource, ResourceRef, ResourceType, ResourceUpdate};
use crate::service::SearchService;
use crate::state::StateAdapter;

/// Kinds imported by [`pull_resources`].
pub const PULLED_KINDS: [ResourceType; 2] = [ResourceType::Index, ResourceType::Indexer];

/// Outcome of a pull.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullReport {
    /// Resources recorded in state for the first time.
    pub imported: Vec<ResourceRef>,
    /// Existing records whose checksum was replaced.
    pub updated: Vec<ResourceRef>,
    /// Resources left as they were.
    pub skipped: Vec<ResourceRef>,
}

impl PullReport {
    /// Check if state was modified.
    pub fn has_changes(&self) -> bool {
        !self.imported.is_empty() || !self.updated.is_empty()
    }

    /// Get a summary of the pull.
    pub fn summary(&self) -> String {
        format!(
            "{} imported, {} updated, {} skipped",
            self.imported.len(),
            self.updated.len(),
            self.skipped.len()
        )
    }
}

/// Record every live index and indexer in state.
///
/// Resources already in state are skipped unless `force` is set, in which
/// case their checksum is refreshed when it differs. A resource deleted
/// between listing and fetching is skipped.
pub async fn pull_resources<A, S>(adapter: &A, service: &S, force: bool) -> MigrateResult<PullReport>
where
    A: StateAdapter + ?Sized,
    S: SearchService + ?Sized,
{
    let existing = adapter.list_resources().await?;
    let mut report = PullReport::default();

    for kind in PULLED_KINDS {
        for name in service.list_names(kind).await? {
            let target = ResourceRef::new(kind, name.as_str());
            let recorded = existing.iter().find(|r| r.kind == kind && r.name == name);

            if recorded.is_some() && !force {
                report.skipped.push(target);
                continue;
            }

            let checksum = match fetch_checksum(service, kind, &name).await {
                Ok(checksum) => checksum,
                Err(error) if error.is_not_found() => {
                    tracing::debug!(resource = %target, "removed while pulling");
                    report.skipped.push(target);
                    continue;
                }
                Err(error) => return Err(error),
            };

            match recorded {
                Some(Resource { checksum: stored, .. }) if *stored == checksum => {
                    report.skipped.push(target);
                }
                Some(record) => {
                    let update = ResourceUpdate {
                        checksum: Some(checksum),
                        ..Default::default()
                    };
                    adapter.update_resource(&record.id, update).await?;
                    report.updated.push(target);
                }
                None => {
                    adapter
                        .create_resource(NewResource::new(kind, name.as_str(), checksum))
                        .await?;
                    report.imported.push(target);
                }
            }
        }
    }

    tracing::info!(
        imported = report.imported.len(),
        updated = report.updated.len(),
        skipped = report.skipped.len(),
        "pulled remote resources"
    );
    Ok(report)
}

async fn fetch_checksum<S>(service: &S, kind: ResourceType, name: &str) -> MigrateResult<String>
where
    S: SearchService + ?Sized,
{
    Ok(match kind {
        ResourceType::Index => service.get_index(name).await?.checksum(),
        ResourceType::Indexer => service.get_indexer(name).await?.checksum(),
        ResourceType::DataSource => service.get_data_source(name).await?.checksum(),
    })
}

//! Drift between recorded state and the live service.

use std::collections::HashSet;

use crate::error::MigrateResult;
use crate::resource::{ResourceRef, ResourceType};
use crate::service::SearchService;
use crate::state::StateAdapter;

/// Differences between state records and remote resources.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriftReport {
    /// Live resources with no state record.
    pub untracked: Vec<ResourceRef>,
    /// State records with no live resource.
    pub missing: Vec<ResourceRef>,
}

impl DriftReport {
    /// Check if state and service agree.
    pub fn is_clean(&self) -> bool {
        self.untracked.is_empty() && self.missing.is_empty()
    }
}

/// Compare resource names in state with names listed by the service.
///
/// Only presence is compared. Remote definitions are not fetched.
pub async fn detect_drift<A, S>(adapter: &A, service: &S) -> MigrateResult<DriftReport>
where
    A: StateAdapter + ?Sized,
    S: SearchService + ?Sized,
{
    let resources = adapter.list_resources().await?;
    let mut report = DriftReport::default();

    for kind in ResourceType::APPLY_ORDER {
        let remote = service.list_names(kind).await?;
        let remote_set: HashSet<&str> = remote.iter().map(String::as_str).collect();
        let tracked: HashSet<&str> = resources
            .iter()
            .filter(|r| r.kind == kind)
            .map(|r| r.name.as_str())
            .collect();

        report.untracked.extend(
            remote
                .iter()
                .filter(|name| !tracked.contains(name.as_str()))
                .map(|name| ResourceRef::new(kind, name.as_str())),
        );
        report.missing.extend(
            resources
                .iter()
                .filter(|r| r.kind == kind && !remote_set.contains(r.name.as_str()))
                .map(ResourceRef::from),
        );
    }

    if !report.is_clean() {
        tracing::warn!(
            untracked = report.untracked.len(),
            missing = report.missing.len(),
            "state has drifted from the search service"
        );
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Resource;
    use crate::state::MemoryStateAdapter;
    use crate::testing::FakeService;

    fn record(kind: ResourceType, name: &str) -> Resource {
        Resource {
            id: format!("id-{name}"),
            name: name.to_string(),
            checksum: "x".to_string(),
            kind,
        }
    }

    #[tokio::test]
    async fn test_detect_drift() {
        let adapter = MemoryStateAdapter::with_resources(vec![
            record(ResourceType::Index, "hotels"),
            record(ResourceType::Indexer, "hotels-indexer"),
        ]);
        let service = FakeService::new()
            .with_live(ResourceType::Index, "hotels")
            .with_live(ResourceType::Index, "scratch")
            .with_live(ResourceType::DataSource, "hotels-ds");

        let report = detect_drift(&adapter, &service).await.unwrap();

        assert_eq!(
            report.untracked,
            vec![
                ResourceRef::new(ResourceType::DataSource, "hotels-ds"),
                ResourceRef::new(ResourceType::Index, "scratch"),
            ]
        );
        assert_eq!(
            report.missing,
            vec![ResourceRef::new(ResourceType::Indexer, "hotels-indexer")]
        );
    }

    #[tokio::test]
    async fn test_no_drift() {
        let adapter = MemoryStateAdapter::with_resources(vec![record(ResourceType::Index, "hotels")]);
        let service = FakeService::new().with_live(ResourceType::Index, "hotels");

        assert!(detect_drift(&adapter, &service).await.unwrap().is_clean());
    }
}

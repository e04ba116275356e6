//! Pushing a schema straight to the service.
//!
//! A push deletes and recreates every declared resource without writing a
//! migration file or touching state. It is meant for scratch services where
//! migration history does not matter.

use std::collections::HashSet;
use std::future::Future;

use quiver_schema::Schema;

use crate::diff::BuiltResource;
use crate::error::{MigrateResult, MigrationError};
use crate::events::{MigrationEvent, MigrationObserver};
use crate::migrator::resolve_connection_string;
use crate::resource::{ResourceRef, ResourceType};
use crate::secrets::SecretResolver;
use crate::service::SearchService;

/// Outcome of a push.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushReport {
    /// Resources that existed remotely and were deleted first.
    pub replaced: Vec<ResourceRef>,
    /// Resources created, in order.
    pub created: Vec<ResourceRef>,
}

/// Names of declared resources that already exist on the service.
pub async fn existing_resources<S>(schema: &Schema, service: &S) -> MigrateResult<Vec<ResourceRef>>
where
    S: SearchService + ?Sized,
{
    let mut existing = Vec::new();
    for kind in ResourceType::APPLY_ORDER {
        let remote: HashSet<String> = service.list_names(kind).await?.into_iter().collect();
        existing.extend(
            declared_names(schema, kind)
                .into_iter()
                .filter(|name| remote.contains(name))
                .map(|name| ResourceRef::new(kind, name)),
        );
    }
    Ok(existing)
}

/// Replace every declared resource on the service.
///
/// Data sources go first, then indexes, then indexers. Each existing
/// resource is deleted before it is created again. Without `force` nothing
/// is changed when any declared resource already exists, and the call fails
/// with [`MigrationError::WouldOverwrite`]. The first failure stops the push;
/// nothing is rolled back.
pub async fn push_schema<S>(
    schema: &Schema,
    service: &S,
    secrets: &SecretResolver,
    observer: &dyn MigrationObserver,
    force: bool,
) -> MigrateResult<PushReport>
where
    S: SearchService + ?Sized,
{
    schema.validate()?;

    let existing = existing_resources(schema, service).await?;
    if !existing.is_empty() && !force {
        return Err(MigrationError::WouldOverwrite(
            existing.iter().map(ToString::to_string).collect(),
        ));
    }

    let mut push = Push {
        service,
        observer,
        existing: existing.into_iter().collect(),
        report: PushReport::default(),
    };

    for definition in schema.data_sources.values() {
        let data_source = definition.build();
        push.replace(&data_source, async {
            let resolved = resolve_connection_string(&data_source, secrets).await?;
            service.create_data_source(&resolved).await.map(drop)
        })
        .await?;
    }

    for definition in schema.indexes.values() {
        let index = definition.build();
        push.replace(&index, async { service.create_index(&index).await.map(drop) })
            .await?;
    }

    for definition in schema.indexers.values() {
        let indexer = definition.build();
        push.replace(&indexer, async { service.create_indexer(&indexer).await.map(drop) })
            .await?;
    }

    tracing::info!(
        replaced = push.report.replaced.len(),
        created = push.report.created.len(),
        "schema pushed"
    );
    Ok(push.report)
}

fn declared_names(schema: &Schema, kind: ResourceType) -> Vec<String> {
    match kind {
        ResourceType::Index => schema.indexes.values().map(|d| d.name.clone()).collect(),
        ResourceType::Indexer => schema.indexers.values().map(|d| d.name.clone()).collect(),
        ResourceType::DataSource => schema.data_sources.values().map(|d| d.name.clone()).collect(),
    }
}

struct Push<'a, S: ?Sized> {
    service: &'a S,
    observer: &'a dyn MigrationObserver,
    existing: HashSet<ResourceRef>,
    report: PushReport,
}

impl<S: SearchService + ?Sized> Push<'_, S> {
    async fn replace<R, F>(&mut self, resource: &R, submit: F) -> MigrateResult<()>
    where
        R: BuiltResource,
        F: Future<Output = MigrateResult<()>>,
    {
        let target = ResourceRef::new(R::KIND, resource.name());

        if self.existing.contains(&target) {
            self.emit(MigrationEvent::Deleting(target.clone()));
            if let Err(error) = self.service.delete_resource(target.kind, &target.name).await {
                return Err(self.failed(target, error));
            }
            self.emit(MigrationEvent::Deleted(target.clone()));
            self.report.replaced.push(target.clone());
        }

        self.emit(MigrationEvent::Creating(target.clone()));
        if let Err(error) = submit.await {
            return Err(self.failed(target, error));
        }
        self.emit(MigrationEvent::Created(target.clone()));
        self.report.created.push(target);
        Ok(())
    }

    fn failed(&self, resource: ResourceRef, error: MigrationError) -> MigrationError {
        tracing::error!(resource = %resource, error = %error, "push step failed");
        self.emit(MigrationEvent::StepFailed {
            resource,
            reason: error.to_string(),
        });
        error
    }

    fn emit(&self, event: MigrationEvent) {
        self.observer.on_event(&event);
    }
}

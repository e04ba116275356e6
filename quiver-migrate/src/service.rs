//! Remote search service client.
//!
//! [`SearchService`] is the narrow surface the migrator needs: get, create
//! and delete by name for each resource kind, plus name listings for drift
//! detection. [`RestSearchService`] talks to the service's REST API.
//!
//! The built form stores `hidden` on fields and a flat `connectionString` on
//! data sources. On the wire the service expects `retrievable` (the inverse
//! of `hidden`) and `credentials.connectionString`, so requests and responses
//! are mapped at this boundary.

use std::time::Duration;

use async_trait::async_trait;
use quiver_schema::{DataSourceConnection, SearchIndex, SearchIndexer};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{MigrateResult, MigrationError};
use crate::resource::ResourceType;

/// Default REST API version.
pub const DEFAULT_API_VERSION: &str = "2024-07-01";

/// Operations the migrator performs against the search service.
#[async_trait]
pub trait SearchService: Send + Sync {
    /// Fetch an index by name.
    async fn get_index(&self, name: &str) -> MigrateResult<SearchIndex>;
    /// Create an index.
    async fn create_index(&self, index: &SearchIndex) -> MigrateResult<SearchIndex>;
    /// Delete an index by name.
    async fn delete_index(&self, name: &str) -> MigrateResult<()>;
    /// List index names.
    async fn list_index_names(&self) -> MigrateResult<Vec<String>>;

    /// Fetch an indexer by name.
    async fn get_indexer(&self, name: &str) -> MigrateResult<SearchIndexer>;
    /// Create an indexer.
    async fn create_indexer(&self, indexer: &SearchIndexer) -> MigrateResult<SearchIndexer>;
    /// Delete an indexer by name.
    async fn delete_indexer(&self, name: &str) -> MigrateResult<()>;
    /// List indexer names.
    async fn list_indexer_names(&self) -> MigrateResult<Vec<String>>;

    /// Fetch a data source by name.
    async fn get_data_source(&self, name: &str) -> MigrateResult<DataSourceConnection>;
    /// Create a data source.
    ///
    /// The connection string must already be resolved.
    async fn create_data_source(
        &self,
        data_source: &DataSourceConnection,
    ) -> MigrateResult<DataSourceConnection>;
    /// Delete a data source by name.
    async fn delete_data_source(&self, name: &str) -> MigrateResult<()>;
    /// List data source names.
    async fn list_data_source_names(&self) -> MigrateResult<Vec<String>>;

    /// Delete a resource of any kind.
    async fn delete_resource(&self, kind: ResourceType, name: &str) -> MigrateResult<()> {
        match kind {
            ResourceType::Index => self.delete_index(name).await,
            ResourceType::Indexer => self.delete_indexer(name).await,
            ResourceType::DataSource => self.delete_data_source(name).await,
        }
    }

    /// List names of any kind.
    async fn list_names(&self, kind: ResourceType) -> MigrateResult<Vec<String>> {
        match kind {
            ResourceType::Index => self.list_index_names().await,
            ResourceType::Indexer => self.list_indexer_names().await,
            ResourceType::DataSource => self.list_data_source_names().await,
        }
    }
}

/// REST client for the search service.
#[derive(Debug, Clone)]
pub struct RestSearchService {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    api_version: String,
}

impl RestSearchService {
    /// Create a client for `endpoint` authenticating with an admin key.
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> MigrateResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
        })
    }

    /// Override the API version.
    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    /// The service endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn collection_url(&self, kind: ResourceType) -> String {
        format!(
            "{}/{}?api-version={}",
            self.endpoint,
            collection(kind),
            self.api_version
        )
    }

    fn item_url(&self, kind: ResourceType, name: &str) -> String {
        format!(
            "{}/{}/{}?api-version={}",
            self.endpoint,
            collection(kind),
            name,
            self.api_version
        )
    }

    async fn get_value(&self, kind: ResourceType, name: &str) -> MigrateResult<Value> {
        tracing::debug!(kind = %kind, resource = name, "GET");
        let response = self
            .client
            .get(self.item_url(kind, name))
            .header("api-key", &self.api_key)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    async fn create_value(&self, kind: ResourceType, body: Value) -> MigrateResult<Value> {
        tracing::debug!(kind = %kind, "POST");
        let response = self
            .client
            .post(self.collection_url(kind))
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    async fn delete_named(&self, kind: ResourceType, name: &str) -> MigrateResult<()> {
        tracing::debug!(kind = %kind, resource = name, "DELETE");
        let response = self
            .client
            .delete(self.item_url(kind, name))
            .header("api-key", &self.api_key)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn list_named(&self, kind: ResourceType) -> MigrateResult<Vec<String>> {
        let url = format!("{}&$select=name", self.collection_url(kind));
        let response = self
            .client
            .get(url)
            .header("api-key", &self.api_key)
            .send()
            .await?;
        let body: Value = check(response).await?.json().await?;

        Ok(body
            .get("value")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.get("name").and_then(Value::as_str))
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl SearchService for RestSearchService {
    async fn get_index(&self, name: &str) -> MigrateResult<SearchIndex> {
        let value = self.get_value(ResourceType::Index, name).await?;
        Ok(serde_json::from_value(index_from_wire(value))?)
    }

    async fn create_index(&self, index: &SearchIndex) -> MigrateResult<SearchIndex> {
        let body = index_to_wire(to_value(index)?);
        let value = self.create_value(ResourceType::Index, body).await?;
        Ok(serde_json::from_value(index_from_wire(value))?)
    }

    async fn delete_index(&self, name: &str) -> MigrateResult<()> {
        self.delete_named(ResourceType::Index, name).await
    }

    async fn list_index_names(&self) -> MigrateResult<Vec<String>> {
        self.list_named(ResourceType::Index).await
    }

    async fn get_indexer(&self, name: &str) -> MigrateResult<SearchIndexer> {
        let value = self.get_value(ResourceType::Indexer, name).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn create_indexer(&self, indexer: &SearchIndexer) -> MigrateResult<SearchIndexer> {
        let value = self
            .create_value(ResourceType::Indexer, to_value(indexer)?)
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn delete_indexer(&self, name: &str) -> MigrateResult<()> {
        self.delete_named(ResourceType::Indexer, name).await
    }

    async fn list_indexer_names(&self) -> MigrateResult<Vec<String>> {
        self.list_named(ResourceType::Indexer).await
    }

    async fn get_data_source(&self, name: &str) -> MigrateResult<DataSourceConnection> {
        let value = self.get_value(ResourceType::DataSource, name).await?;
        Ok(serde_json::from_value(data_source_from_wire(value))?)
    }

    async fn create_data_source(
        &self,
        data_source: &DataSourceConnection,
    ) -> MigrateResult<DataSourceConnection> {
        let body = data_source_to_wire(to_value(data_source)?);
        let value = self.create_value(ResourceType::DataSource, body).await?;
        Ok(serde_json::from_value(data_source_from_wire(value))?)
    }

    async fn delete_data_source(&self, name: &str) -> MigrateResult<()> {
        self.delete_named(ResourceType::DataSource, name).await
    }

    async fn list_data_source_names(&self) -> MigrateResult<Vec<String>> {
        self.list_named(ResourceType::DataSource).await
    }
}

fn collection(kind: ResourceType) -> &'static str {
    match kind {
        ResourceType::Index => "indexes",
        ResourceType::Indexer => "indexers",
        ResourceType::DataSource => "datasources",
    }
}

fn to_value<T: Serialize>(value: &T) -> MigrateResult<Value> {
    Ok(serde_json::to_value(value)?)
}

/// Turn a non-success response into [`MigrationError::Service`].
async fn check(response: reqwest::Response) -> MigrateResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    Err(MigrationError::service(status.as_u16(), error_message(&text)))
}

/// Pull `error.message` out of a service error body, falling back to the raw
/// text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")?
                .get("message")?
                .as_str()
                .map(String::from)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

fn index_to_wire(mut index: Value) -> Value {
    if let Some(fields) = index.get_mut("fields").and_then(Value::as_array_mut) {
        fields.iter_mut().for_each(field_to_wire);
    }
    index
}

fn index_from_wire(mut index: Value) -> Value {
    if let Some(fields) = index.get_mut("fields").and_then(Value::as_array_mut) {
        fields.iter_mut().for_each(field_from_wire);
    }
    index
}

fn field_to_wire(field: &mut Value) {
    let Some(object) = field.as_object_mut() else {
        return;
    };
    if let Some(hidden) = object.remove("hidden") {
        if let Some(hidden) = hidden.as_bool() {
            object.insert("retrievable".into(), Value::Bool(!hidden));
        }
    }
    if let Some(children) = object.get_mut("fields").and_then(Value::as_array_mut) {
        children.iter_mut().for_each(field_to_wire);
    }
}

fn field_from_wire(field: &mut Value) {
    let Some(object) = field.as_object_mut() else {
        return;
    };
    if let Some(retrievable) = object.remove("retrievable") {
        if let Some(retrievable) = retrievable.as_bool() {
            object.insert("hidden".into(), Value::Bool(!retrievable));
        }
    }
    match object.get_mut("fields") {
        Some(Value::Array(children)) => children.iter_mut().for_each(field_from_wire),
        // Simple fields come back with `fields: null` on some API versions
        Some(Value::Null) => {
            object.remove("fields");
        }
        _ => {}
    }
}

fn data_source_to_wire(mut data_source: Value) -> Value {
    if let Some(object) = data_source.as_object_mut() {
        if let Some(connection_string) = object.remove("connectionString") {
            let mut credentials = Map::new();
            credentials.insert("connectionString".into(), connection_string);
            object.insert("credentials".into(), Value::Object(credentials));
        }
    }
    data_source
}

fn data_source_from_wire(mut data_source: Value) -> Value {
    if let Some(object) = data_source.as_object_mut() {
        let connection_string = object
            .remove("credentials")
            .and_then(|mut c| c.get_mut("connectionString").map(Value::take))
            .filter(|c| !c.is_null());
        if let Some(connection_string) = connection_string {
            object.insert("connectionString".into(), connection_string);
        }
    }
    data_source
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use quiver_schema::{ComplexField, SimpleField};
    use serde::de::DeserializeOwned;
    use serde_json::json;

    fn decode<T: DeserializeOwned>(value: Value) -> MigrateResult<T> {
        Ok(serde_json::from_value(value)?)
    }

    fn api_version() -> Matcher {
        Matcher::UrlEncoded("api-version".into(), DEFAULT_API_VERSION.into())
    }

    #[test]
    fn test_hidden_maps_to_retrievable() {
        let index = SearchIndex::new(
            "hotels",
            vec![
                SimpleField {
                    hidden: Some(true),
                    ..SimpleField::new("secret", "Edm.String")
                }
                .into(),
                ComplexField::new(
                    "address",
                    vec![SimpleField {
                        hidden: Some(false),
                        ..SimpleField::new("city", "Edm.String")
                    }
                    .into()],
                )
                .into(),
            ],
        );

        let wire = index_to_wire(serde_json::to_value(&index).unwrap());
        assert_eq!(wire["fields"][0]["retrievable"], json!(false));
        assert!(wire["fields"][0].get("hidden").is_none());
        assert_eq!(wire["fields"][1]["fields"][0]["retrievable"], json!(true));

        let back: SearchIndex = decode(index_from_wire(wire)).unwrap();
        assert_eq!(back, index);
    }

    #[test]
    fn test_connection_string_maps_to_credentials() {
        let mut ds = DataSourceConnection::new("hotels-ds", "azureblob", "hotels");
        ds.connection_string = Some("DefaultEndpointsProtocol=https".into());

        let wire = data_source_to_wire(serde_json::to_value(&ds).unwrap());
        assert_eq!(
            wire["credentials"]["connectionString"],
            json!("DefaultEndpointsProtocol=https")
        );
        assert!(wire.get("connectionString").is_none());

        let back: DataSourceConnection = decode(data_source_from_wire(wire)).unwrap();
        assert_eq!(back, ds);
    }

    #[test]
    fn test_null_credentials_dropped() {
        let wire = json!({
            "name": "ds",
            "type": "azureblob",
            "credentials": {"connectionString": null},
            "container": {"name": "c"}
        });
        let ds: DataSourceConnection = decode(data_source_from_wire(wire)).unwrap();
        assert_eq!(ds.connection_string, None);
        assert!(!ds.extra.contains_key("credentials"));
    }

    #[test]
    fn test_error_message() {
        assert_eq!(
            error_message(r#"{"error":{"code":"Conflict","message":"already exists"}}"#),
            "already exists"
        );
        assert_eq!(error_message("  plain text "), "plain text");
    }

    #[tokio::test]
    async fn test_create_index_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/indexes")
            .match_query(api_version())
            .match_header("api-key", "admin-key")
            .match_body(Matcher::PartialJson(json!({
                "name": "hotels",
                "fields": [{"name": "id", "retrievable": true}]
            })))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "@odata.etag": "\"0x1\"",
                    "name": "hotels",
                    "fields": [{"name": "id", "type": "Edm.String", "key": true, "retrievable": true}]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let service = RestSearchService::new(server.url(), "admin-key").unwrap();
        let index = SearchIndex::new(
            "hotels",
            vec![
                SimpleField {
                    key: Some(true),
                    hidden: Some(false),
                    ..SimpleField::new("id", "Edm.String")
                }
                .into(),
            ],
        );

        let created = service.create_index(&index).await.unwrap();

        mock.assert_async().await;
        assert_eq!(created.etag.as_deref(), Some("\"0x1\""));
        assert_eq!(created.fields.len(), 1);
    }

    #[tokio::test]
    async fn test_service_error_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("DELETE", "/indexers/hotels-indexer")
            .match_query(api_version())
            .with_status(403)
            .with_body(r#"{"error":{"code":"Forbidden","message":"key is read-only"}}"#)
            .create_async()
            .await;

        let service = RestSearchService::new(server.url(), "query-key").unwrap();
        let err = service
            .delete_resource(ResourceType::Indexer, "hotels-indexer")
            .await
            .unwrap_err();

        match err {
            MigrationError::Service { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(message, "key is read-only");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_list_names() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/datasources")
            .match_query(Matcher::AllOf(vec![
                api_version(),
                Matcher::UrlEncoded("$select".into(), "name".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"value":[{"name":"a"},{"name":"b"}]}"#)
            .create_async()
            .await;

        let service = RestSearchService::new(format!("{}/", server.url()), "k").unwrap();
        let names = service.list_names(ResourceType::DataSource).await.unwrap();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_custom_api_version() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/indexers/nightly")
            .match_query(Matcher::UrlEncoded("api-version".into(), "2023-11-01".into()))
            .with_status(200)
            .with_body(r#"{"name":"nightly","dataSourceName":"ds","targetIndexName":"idx"}"#)
            .create_async()
            .await;

        let service = RestSearchService::new(server.url(), "k")
            .unwrap()
            .with_api_version("2023-11-01");
        let indexer = service.get_indexer("nightly").await.unwrap();

        mock.assert_async().await;
        assert_eq!(indexer.target_index_name, "idx");
    }
}

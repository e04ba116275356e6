//! Deterministic checksums of built resources.
//!
//! Every resource is first reduced to the properties the schema layer owns,
//! then cleaned (nulls, empty strings, empty arrays and empty objects are
//! dropped so an absent property and an empty one hash the same) and finally
//! rendered in a canonical form with sorted object keys. Resource checksums
//! also sort array elements, so declaration order never registers as drift.
//!
//! Service-assigned metadata such as etags is outside the sanitized shape and
//! never affects a checksum.

use quiver_schema::{DataSourceConnection, SearchField, SearchIndex, SearchIndexer};
use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};

use crate::error::MigrateResult;
use crate::file::MigrationFile;

/// Checksum of an index field.
///
/// Simple fields hash their managed flags; complex fields hash their name,
/// type and the checksums of their children regardless of child order.
pub fn field_checksum(field: &SearchField) -> String {
    match field {
        SearchField::Simple(f) => hash_value(
            json!({
                "name": f.name,
                "type": f.field_type,
                "key": f.key,
                "hidden": f.hidden,
                "filterable": f.filterable,
                "facetable": f.facetable,
                "sortable": f.sortable,
                "searchable": f.searchable,
            }),
            false,
        ),
        SearchField::Complex(f) => hash_value(
            json!({
                "name": f.name,
                "type": f.field_type,
                "fields": f.fields.iter().map(field_checksum).collect::<Vec<_>>(),
            }),
            true,
        ),
    }
}

/// Checksum of an index.
pub fn index_checksum(index: &SearchIndex) -> String {
    hash_value(
        json!({
            "name": index.name,
            "suggesters": index.suggesters,
            "fields": index.fields.iter().map(field_checksum).collect::<Vec<_>>(),
        }),
        true,
    )
}

/// Checksum of an indexer.
pub fn indexer_checksum(indexer: &SearchIndexer) -> String {
    hash_value(
        json!({
            "name": indexer.name,
            "dataSourceName": indexer.data_source_name,
            "description": indexer.description,
            "encryptionKey": indexer.encryption_key,
            "fieldMappings": indexer.field_mappings,
            "isDisabled": indexer.is_disabled,
            "outputFieldMappings": indexer.output_field_mappings,
            "parameters": indexer.parameters,
            "schedule": indexer.schedule,
            "skillsetName": indexer.skillset_name,
            "targetIndexName": indexer.target_index_name,
        }),
        true,
    )
}

/// Checksum of a data source.
///
/// The connection string is hashed in its placeholder form.
pub fn data_source_checksum(data_source: &DataSourceConnection) -> String {
    hash_value(
        json!({
            "name": data_source.name,
            "description": data_source.description,
            "connectionString": data_source.connection_string,
            "container": data_source.container,
            "type": data_source.data_source_type,
            "dataChangeDetectionPolicy": data_source.data_change_detection_policy,
            "dataDeletionDetectionPolicy": data_source.data_deletion_detection_policy,
            "encryptionKey": data_source.encryption_key,
        }),
        true,
    )
}

/// Checksum of a migration file's content.
///
/// This is the integrity anchor stored with the migration record. The file
/// is already normalized when written, so order is significant here.
pub fn migration_checksum(file: &MigrationFile) -> MigrateResult<String> {
    let bytes = serde_json::to_vec(file)?;
    Ok(sha256_hex(&bytes))
}

/// Hash an arbitrary JSON value after cleaning and canonicalizing it.
pub fn hash_value(value: Value, unordered_arrays: bool) -> String {
    let cleaned = clean(value).unwrap_or(Value::Object(Map::new()));
    let mut out = String::new();
    write_canonical(&cleaned, unordered_arrays, &mut out);
    sha256_hex(out.as_bytes())
}

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Recursively drop nulls, empty strings, empty arrays and empty objects.
///
/// `false` and `0` are kept.
fn clean(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::Array(items) => {
            let items: Vec<Value> = items.into_iter().filter_map(clean).collect();
            (!items.is_empty()).then_some(Value::Array(items))
        }
        Value::Object(map) => {
            let map: Map<String, Value> = map
                .into_iter()
                .filter_map(|(k, v)| clean(v).map(|v| (k, v)))
                .collect();
            (!map.is_empty()).then_some(Value::Object(map))
        }
        other => Some(other),
    }
}

fn write_canonical(value: &Value, unordered_arrays: bool, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (i, (key, value)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::from(key.as_str()).to_string());
                out.push(':');
                write_canonical(value, unordered_arrays, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            let mut parts: Vec<String> = items
                .iter()
                .map(|item| {
                    let mut part = String::new();
                    write_canonical(item, unordered_arrays, &mut part);
                    part
                })
                .collect();
            if unordered_arrays {
                parts.sort();
            }

            out.push('[');
            out.push_str(&parts.join(","));
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiver_schema::{ComplexField, SimpleField, Suggester};

    fn simple(name: &str) -> SearchField {
        SearchField::Simple(SimpleField {
            key: Some(false),
            filterable: Some(true),
            ..SimpleField::new(name, "Edm.String")
        })
    }

    #[test]
    fn test_checksum_is_hex_sha256() {
        let checksum = indexer_checksum(&SearchIndexer::new("idxr", "ds", "idx"));
        assert_eq!(checksum.len(), 64);
        assert!(checksum.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_index_field_order_ignored() {
        let a = SearchIndex::new("a", vec![simple("x"), simple("y")]);
        let b = SearchIndex::new("a", vec![simple("y"), simple("x")]);
        assert_eq!(index_checksum(&a), index_checksum(&b));
    }

    #[test]
    fn test_key_order_ignored() {
        let a = hash_value(json!({"name": "a", "type": "b"}), true);
        let b = hash_value(json!({"type": "b", "name": "a"}), true);
        assert_eq!(a, b);
    }

    #[test]
    fn test_etag_ignored() {
        let plain = SearchIndexer::new("idxr", "ds", "idx");
        let mut tagged = plain.clone();
        tagged.etag = Some("\"0x8DC\"".to_string());
        tagged.extra.insert("@odata.context".into(), json!("https://example"));

        assert_eq!(indexer_checksum(&plain), indexer_checksum(&tagged));

        let mut index = SearchIndex::new("a", vec![simple("x")]);
        let before = index_checksum(&index);
        index.etag = Some("etag".into());
        assert_eq!(before, index_checksum(&index));
    }

    #[test]
    fn test_managed_flag_changes_checksum() {
        let a = SearchIndex::new("a", vec![simple("x")]);
        let mut b = a.clone();
        if let SearchField::Simple(f) = &mut b.fields[0] {
            f.filterable = Some(false);
        }
        assert_ne!(index_checksum(&a), index_checksum(&b));
    }

    #[test]
    fn test_analyzer_is_unmanaged() {
        let SearchField::Simple(base) = simple("x") else {
            unreachable!()
        };
        let mut analyzed = base.clone();
        analyzed.analyzer_name = Some("en.lucene".into());
        assert_eq!(
            field_checksum(&SearchField::Simple(base)),
            field_checksum(&SearchField::Simple(analyzed))
        );
    }

    #[test]
    fn test_undefined_same_as_missing() {
        let mut a = SearchIndexer::new("idxr", "ds", "idx");
        a.description = Some(String::new());
        let b = SearchIndexer::new("idxr", "ds", "idx");
        assert_eq!(indexer_checksum(&a), indexer_checksum(&b));
    }

    #[test]
    fn test_false_is_not_dropped() {
        let mut a = SearchIndexer::new("idxr", "ds", "idx");
        a.is_disabled = Some(false);
        let b = SearchIndexer::new("idxr", "ds", "idx");
        assert_ne!(indexer_checksum(&a), indexer_checksum(&b));
    }

    #[test]
    fn test_complex_child_order_ignored() {
        let a: SearchField = ComplexField::new("address", vec![simple("city"), simple("zip")]).into();
        let b: SearchField = ComplexField::new("address", vec![simple("zip"), simple("city")]).into();
        assert_eq!(field_checksum(&a), field_checksum(&b));

        let c: SearchField = ComplexField::collection("address", vec![simple("city"), simple("zip")]).into();
        assert_ne!(field_checksum(&a), field_checksum(&c));
    }

    #[test]
    fn test_suggesters_are_managed() {
        let a = SearchIndex::new("a", vec![simple("x")]);
        let mut b = a.clone();
        b.suggesters.push(Suggester::new("sg", ["x"]));
        assert_ne!(index_checksum(&a), index_checksum(&b));
    }

    #[test]
    fn test_data_source_placeholder_is_hashed() {
        let mut a = DataSourceConnection::new("ds", "azureblob", "hotels");
        a.connection_string = Some("@kv(conn)".into());
        let mut b = a.clone();
        b.connection_string = Some("@kv(other)".into());
        assert_ne!(data_source_checksum(&a), data_source_checksum(&b));

        let mut c = a.clone();
        c.etag = Some("x".into());
        assert_eq!(data_source_checksum(&a), data_source_checksum(&c));
    }
}

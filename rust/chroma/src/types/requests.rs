use bon::Builder;
use chroma_collection_types::{to_configuration_map, to_schema_map, CollectionConfiguration, Schema};
use serde_json::{Map, Value};

use crate::types::Metadata;

/// Parameters of a create-collection call.
///
/// The configuration is sent in the flat create shape, with an embedded schema carried
/// inside it under `schema`.
#[derive(Builder, Clone, Debug)]
pub struct CreateCollectionRequest {
    /// Collection name.
    #[builder(into)]
    pub name: String,
    /// Index, embedding function and schema configuration.
    pub configuration: Option<CollectionConfiguration>,
    /// Top-level schema, sent alongside the configuration.
    pub schema: Option<Schema>,
    /// Free-form collection metadata.
    pub metadata: Option<Metadata>,
    /// Return the existing collection instead of failing when the name is taken.
    #[builder(default)]
    pub get_or_create: bool,
}

impl CreateCollectionRequest {
    /// The JSON body of the request.
    pub fn to_body(&self) -> Value {
        let mut body = Map::new();
        body.insert("name".to_string(), Value::from(self.name.clone()));
        if let Some(configuration) = &self.configuration {
            body.insert(
                "configuration".to_string(),
                Value::Object(to_configuration_map(configuration)),
            );
        }
        if let Some(schema) = &self.schema {
            body.insert("schema".to_string(), Value::Object(to_schema_map(schema)));
        }
        if let Some(metadata) = &self.metadata {
            body.insert("metadata".to_string(), Value::Object(metadata.clone()));
        }
        body.insert("get_or_create".to_string(), Value::Bool(self.get_or_create));
        Value::Object(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chroma_collection_types::Space;
    use serde_json::json;

    #[test]
    fn test_body_uses_create_shape() {
        let configuration = CollectionConfiguration::builder()
            .space(Space::Ip)
            .hnsw_search_ef(150)
            .and_then(|builder| builder.build())
            .unwrap();
        let request = CreateCollectionRequest::builder()
            .name("docs")
            .configuration(configuration)
            .get_or_create(true)
            .build();
        assert_eq!(
            request.to_body(),
            json!({
                "name": "docs",
                "configuration": {"hnsw:space": "ip", "hnsw:search_ef": 150},
                "get_or_create": true
            })
        );
    }

    #[test]
    fn test_minimal_body() {
        let request = CreateCollectionRequest::builder().name("empty").build();
        assert_eq!(
            request.to_body(),
            json!({"name": "empty", "get_or_create": false})
        );
    }
}

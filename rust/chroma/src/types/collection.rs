use chroma_collection_types::{
    decode, parse_configuration, parse_schema, CollectionConfiguration, DeserializationError,
    Schema,
};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Free-form collection metadata.
pub type Metadata = Map<String, Value>;

/// Wire key holding a collection's configuration in the create shape.
pub const CONFIGURATION_JSON_KEY: &str = "configuration_json";

/// A collection as returned by the server.
#[derive(Clone, Debug, PartialEq)]
pub struct Collection {
    /// Server-assigned identifier.
    pub collection_id: Uuid,
    /// Collection name, unique within its database.
    pub name: String,
    /// Persisted configuration, if the server returned one.
    pub configuration: Option<CollectionConfiguration>,
    /// Top-level schema, if the server returned one.
    pub schema: Option<Schema>,
    /// Free-form metadata.
    pub metadata: Option<Metadata>,
    /// Owning tenant.
    pub tenant: String,
    /// Owning database.
    pub database: String,
}

impl Collection {
    /// Parses the JSON object the server returns for a collection.
    ///
    /// # Errors
    ///
    /// Returns a [`DeserializationError`] locating the first malformed field.
    pub fn from_wire(value: &Value) -> Result<Self, DeserializationError> {
        let Value::Object(map) = value else {
            return Err(DeserializationError::new("collection", "must be an object"));
        };
        let required = |key: &str| {
            map.get(key)
                .filter(|value| !value.is_null())
                .ok_or_else(|| DeserializationError::new(key, "is required"))
        };
        let object = |key: &str| -> Result<Option<&Map<String, Value>>, DeserializationError> {
            match map.get(key) {
                None | Some(Value::Null) => Ok(None),
                Some(Value::Object(object)) => Ok(Some(object)),
                Some(_) => Err(DeserializationError::new(key, "must be an object")),
            }
        };

        let configuration = object(CONFIGURATION_JSON_KEY)?
            .map(|map| parse_configuration(map).map_err(|err| err.nested(CONFIGURATION_JSON_KEY)))
            .transpose()?;
        let schema = object("schema")?.map(parse_schema).transpose()?;

        Ok(Collection {
            collection_id: decode("id", required("id")?)?,
            name: decode("name", required("name")?)?,
            configuration,
            schema,
            metadata: object("metadata")?.cloned(),
            tenant: decode("tenant", required("tenant")?)?,
            database: decode("database", required("database")?)?,
        })
    }

    /// Returns the collection name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

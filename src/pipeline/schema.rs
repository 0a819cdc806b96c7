use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Column type of a dataset field
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataType {
    String,
    Binary,
    Bool,
    Int32,
    Int64,
    Float32,
    Float64,
    List(Box<DataType>),
}

impl DataType {
    pub fn list(item: DataType) -> Self {
        DataType::List(Box::new(item))
    }

    fn type_name(&self) -> &'static str {
        match self {
            DataType::String => "string",
            DataType::Binary => "binary",
            DataType::Bool => "bool",
            DataType::Int32 => "int32",
            DataType::Int64 => "int64",
            DataType::Float32 => "float32",
            DataType::Float64 => "float64",
            DataType::List(_) => "array",
        }
    }

    fn from_type_name(name: &str, items: Option<DataType>) -> Option<Self> {
        Some(match name {
            "string" | "utf8" => DataType::String,
            "binary" => DataType::Binary,
            "bool" => DataType::Bool,
            "int32" => DataType::Int32,
            "int64" => DataType::Int64,
            "float32" => DataType::Float32,
            "float64" => DataType::Float64,
            "array" => DataType::List(Box::new(items?)),
            _ => return None,
        })
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::List(item) => write!(f, "list<{}>", item),
            other => f.write_str(other.type_name()),
        }
    }
}

// Serialized as `{"type": "string"}` / `{"type": "array", "items": {...}}`
impl Serialize for DataType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DataType::List(item) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", "array")?;
                map.serialize_entry("items", item.as_ref())?;
                map.end()
            }
            other => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("type", other.type_name())?;
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for DataType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            #[serde(rename = "type")]
            kind: String,
            items: Option<Box<DataType>>,
        }

        let raw = Raw::deserialize(deserializer)?;
        DataType::from_type_name(&raw.kind, raw.items.map(|item| *item)).ok_or_else(|| {
            serde::de::Error::custom(format!("unsupported data type '{}'", raw.kind))
        })
    }
}

/// Named columns of a dataset, kept in name order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    fields: BTreeMap<String, DataType>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion
    pub fn field(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.fields.insert(name.into(), data_type);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, data_type: DataType) -> Option<DataType> {
        self.fields.insert(name.into(), data_type)
    }

    pub fn get(&self, name: &str) -> Option<&DataType> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Add every column of `other`, overwriting columns that already exist
    pub fn merge(&mut self, other: &Schema) {
        for (name, data_type) in &other.fields {
            self.fields.insert(name.clone(), data_type.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &DataType)> {
        self.fields.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.fields.keys().map(|k| k.as_str()).collect()
    }
}

impl FromIterator<(String, DataType)> for Schema {
    fn from_iter<T: IntoIterator<Item = (String, DataType)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

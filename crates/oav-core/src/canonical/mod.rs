//! The engine-ready schema tree produced by the normalizer.
//!
//! References are already inlined, OpenAPI-only keywords (`nullable`,
//! `discriminator`, parameter objects) are rewritten into plain
//! validation constructs, and every node is exclusively owned by its parent.

pub mod formats;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

pub use formats::{FormatDefinition, FormatRegistry};

/// JSON instance types as the validation engine sees them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
    Null,
}

impl InstanceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceType::String => "string",
            InstanceType::Number => "number",
            InstanceType::Integer => "integer",
            InstanceType::Boolean => "boolean",
            InstanceType::Array => "array",
            InstanceType::Object => "object",
            InstanceType::Null => "null",
        }
    }
}

/// A normalized schema node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CanonicalSchema {
    /// Accepts every instance.
    Any,
    /// Keyword-driven node: object, array or scalar rules keyed on `types`.
    Typed(Box<TypedSchema>),
    AllOf(Vec<CanonicalSchema>),
    AnyOf(Vec<CanonicalSchema>),
    OneOf(Vec<CanonicalSchema>),
    Not(Box<CanonicalSchema>),
    /// Tagged union: the tag is checked before any branch is tried.
    Discriminated(Box<DiscriminatedSchema>),
}

impl CanonicalSchema {
    pub fn typed(schema: TypedSchema) -> Self {
        CanonicalSchema::Typed(Box::new(schema))
    }

    pub fn null() -> Self {
        Self::typed(TypedSchema::of(vec![InstanceType::Null]))
    }

    /// Union this node with an explicit `null` type.
    ///
    /// Typed nodes gain `null` in their type list; composite nodes become
    /// `anyOf[null, node]`.
    pub fn or_null(self) -> Self {
        match self {
            CanonicalSchema::Any => CanonicalSchema::Any,
            CanonicalSchema::Typed(mut typed) => {
                if typed.types.is_empty() {
                    return CanonicalSchema::Typed(typed);
                }
                if !typed.types.contains(&InstanceType::Null) {
                    typed.types.push(InstanceType::Null);
                }
                if !typed.enum_values.is_empty() && !typed.enum_values.contains(&Value::Null) {
                    typed.enum_values.push(Value::Null);
                }
                CanonicalSchema::Typed(typed)
            }
            CanonicalSchema::AnyOf(members) if members.first() == Some(&Self::null()) => {
                CanonicalSchema::AnyOf(members)
            }
            other => CanonicalSchema::AnyOf(vec![Self::null(), other]),
        }
    }
}

/// What an object does with properties it does not declare.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AdditionalPolicy {
    #[default]
    Allowed,
    Forbidden,
    Schema(Box<CanonicalSchema>),
}

/// Object, array and scalar keywords of one node. An empty `types` list
/// means any type; the per-type rules only apply to instances of that type.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedSchema {
    pub types: Vec<InstanceType>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub const_value: Option<Value>,

    // Numbers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclusive_minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclusive_maximum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiple_of: Option<f64>,

    // Strings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    // Arrays
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<CanonicalSchema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,
    pub unique_items: bool,

    // Objects
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, CanonicalSchema>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    pub additional: AdditionalPolicy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_properties: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_properties: Option<u64>,
}

impl TypedSchema {
    pub fn of(types: Vec<InstanceType>) -> Self {
        Self {
            types,
            ..Self::default()
        }
    }

    /// An object node with the given properties and nothing else.
    pub fn object(
        properties: IndexMap<String, CanonicalSchema>,
        required: Vec<String>,
        additional: AdditionalPolicy,
    ) -> Self {
        Self {
            types: vec![InstanceType::Object],
            properties,
            required,
            additional,
            ..Self::default()
        }
    }

    /// Add a property to the required set, keeping declaration order.
    pub fn require(&mut self, name: &str) {
        if !self.required.iter().any(|r| r == name) {
            self.required.push(name.to_string());
        }
    }

    pub fn is_object(&self) -> bool {
        self.types == [InstanceType::Object]
    }

    /// True when the node constrains nothing at all.
    pub fn is_trivial(&self) -> bool {
        *self == Self::default()
    }
}

/// A discriminated union: `property_name` selects exactly one branch.
///
/// `branches` is ordered by declaration; that order is also the order in
/// which allowed tag values are reported.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscriminatedSchema {
    pub property_name: String,
    pub branches: IndexMap<String, CanonicalSchema>,
}

impl DiscriminatedSchema {
    pub fn allowed_tags(&self) -> Vec<&str> {
        self.branches.keys().map(String::as_str).collect()
    }
}

/// The body schemas of one endpoint, one per distinct declared schema,
/// with every declared media type pointing at the schema it selects.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalBody {
    pub schemas: Vec<CanonicalSchema>,
    pub media_types: IndexMap<String, usize>,
    /// Index of the schema used when no content type is supplied.
    pub primary: usize,
}

impl CanonicalBody {
    pub fn declared_media_types(&self) -> Vec<&str> {
        self.media_types.keys().map(String::as_str).collect()
    }
}

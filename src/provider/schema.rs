//! Declared resource shapes.
//!
//! The runner uses these to tell required input from computed output and to
//! decide which changes force a replacement. Enforcement is the runner's job;
//! the provider only declares.

use serde_json::json;

/// Attribute value types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeType {
    String,
    Int64,
    Bool,
    List(Box<AttributeType>),
    Map(Box<AttributeType>),
}

impl AttributeType {
    /// cty-style type expression, e.g. `["list","string"]`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            AttributeType::String => json!("string"),
            AttributeType::Int64 => json!("number"),
            AttributeType::Bool => json!("bool"),
            AttributeType::List(elem) => json!(["list", elem.to_json()]),
            AttributeType::Map(elem) => json!(["map", elem.to_json()]),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: &'static str,
    pub ty: AttributeType,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub sensitive: bool,
    pub requires_replace: bool,
    pub default: Option<serde_json::Value>,
    pub description: &'static str,
}

impl Attribute {
    fn new(name: &'static str, ty: AttributeType) -> Self {
        Self {
            name,
            ty,
            required: false,
            optional: false,
            computed: false,
            sensitive: false,
            requires_replace: false,
            default: None,
            description: "",
        }
    }

    pub fn required(name: &'static str, ty: AttributeType) -> Self {
        Self {
            required: true,
            ..Self::new(name, ty)
        }
    }

    pub fn optional(name: &'static str, ty: AttributeType) -> Self {
        Self {
            optional: true,
            ..Self::new(name, ty)
        }
    }

    pub fn computed(name: &'static str, ty: AttributeType) -> Self {
        Self {
            computed: true,
            ..Self::new(name, ty)
        }
    }

    /// Optional input the provider fills in when the user leaves it out.
    pub fn optional_computed(name: &'static str, ty: AttributeType) -> Self {
        Self {
            optional: true,
            computed: true,
            ..Self::new(name, ty)
        }
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn requires_replace(mut self) -> Self {
        self.requires_replace = true;
        self
    }

    pub fn with_default(mut self, value: serde_json::Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "name": self.name,
            "type": self.ty.to_json(),
            "required": self.required,
            "optional": self.optional,
            "computed": self.computed,
            "sensitive": self.sensitive,
            "requires_replace": self.requires_replace,
            "default": self.default,
            "description": self.description,
        })
    }
}

/// Schema for one resource type.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceSchema {
    pub type_name: &'static str,
    pub description: &'static str,
    pub version: i64,
    pub attributes: Vec<Attribute>,
}

impl ResourceSchema {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Attributes whose change forces destroy-then-create.
    pub fn replace_triggering(&self) -> Vec<&'static str> {
        self.attributes
            .iter()
            .filter(|a| a.requires_replace)
            .map(|a| a.name)
            .collect()
    }

    pub fn sensitive(&self) -> Vec<&'static str> {
        self.attributes
            .iter()
            .filter(|a| a.sensitive)
            .map(|a| a.name)
            .collect()
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "type_name": self.type_name,
            "version": self.version,
            "block": {
                "description": self.description,
                "attributes": self.attributes.iter().map(Attribute::to_json).collect::<Vec<_>>(),
            },
        })
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Role assigned to a console user.
///
/// Mirrors the backend enum. Unknown values are kept verbatim in `Other`
/// so a newer backend never breaks session loading.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Admin,
    Operations,
    Customer,
    Supplier,
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::Admin => "ADMIN",
            Role::Operations => "OPERATIONS",
            Role::Customer => "CUSTOMER",
            Role::Supplier => "SUPPLIER",
            Role::Other(s) => s,
        }
    }

    /// Display label used in listings
    pub fn label(&self) -> &str {
        match self {
            Role::Admin => "Admin",
            Role::Operations => "Operations",
            Role::Customer => "Customer",
            Role::Supplier => "Supplier",
            Role::Other(s) => s,
        }
    }

    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Admin | Role::Operations)
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        match value.as_str() {
            "ADMIN" => Role::Admin,
            "OPERATIONS" => Role::Operations,
            "CUSTOMER" => Role::Customer,
            "SUPPLIER" => Role::Supplier,
            _ => Role::Other(value),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User identifier. The backend hands out numeric ids today but string
/// ids (UUIDs) are accepted as well.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Number(i64),
    Text(String),
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserId::Number(n) => write!(f, "{}", n),
            UserId::Text(s) => f.write_str(s),
        }
    }
}

/// Identity record returned by the login endpoint.
///
/// Only `id` and `role` are relied on; every other field the backend sends
/// is preserved in `extra` so it survives a persist/load cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    pub fn new(id: impl Into<UserId>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
            email: None,
            name: None,
            extra: Map::new(),
        }
    }

    /// Name shown in the status line, falling back to email then id
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.email.clone())
            .unwrap_or_else(|| format!("user #{}", self.id))
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        UserId::Number(id)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        UserId::Text(id.to_string())
    }
}

//! Generic CRUD clients for the console's REST resources.
//!
//! Every call goes through the auth layer and returns the unwrapped result
//! (`data` field of the envelope, or the raw body). Record shapes are left
//! to the caller as `serde_json::Value`.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use super::{ApiClient, ApiError, ApiRequest};
use crate::models::{unwrap_envelope, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Users,
    Customers,
    /// Customer-portal users: the `/users` collection scoped to `CUSTOMER`
    CustomerUsers,
    CustomerOrders,
    Sites,
}

impl Resource {
    pub const ALL: [Resource; 5] = [
        Resource::Users,
        Resource::Customers,
        Resource::CustomerUsers,
        Resource::CustomerOrders,
        Resource::Sites,
    ];

    /// Name used on the command line
    pub fn name(&self) -> &'static str {
        match self {
            Resource::Users => "users",
            Resource::Customers => "customers",
            Resource::CustomerUsers => "customer-users",
            Resource::CustomerOrders => "customer-orders",
            Resource::Sites => "sites",
        }
    }

    /// Collection path on the API
    pub fn path(&self) -> &'static str {
        match self {
            Resource::Users | Resource::CustomerUsers => "/users",
            Resource::Customers => "/customers",
            Resource::CustomerOrders => "/customer-orders",
            Resource::Sites => "/sites",
        }
    }

    /// Role every record of this resource is pinned to, if any
    fn scoped_role(&self) -> Option<Role> {
        match self {
            Resource::CustomerUsers => Some(Role::Customer),
            _ => None,
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Resource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Resource::ALL
            .into_iter()
            .find(|r| r.name() == s)
            .ok_or_else(|| {
                let known: Vec<_> = Resource::ALL.iter().map(|r| r.name()).collect();
                format!("unknown resource '{}' (expected one of: {})", s, known.join(", "))
            })
    }
}

pub struct ResourceApi<'a> {
    client: &'a ApiClient,
    resource: Resource,
}

impl<'a> ResourceApi<'a> {
    pub(crate) fn new(client: &'a ApiClient, resource: Resource) -> Self {
        Self { client, resource }
    }

    fn item_path(&self, id: &str) -> String {
        format!("{}/{}", self.resource.path(), id)
    }

    async fn call(&self, request: ApiRequest) -> Result<Value, ApiError> {
        self.client.execute(request).await.map(unwrap_envelope)
    }

    /// List records, filtered by `params`
    pub async fn list(&self, params: &[(String, String)]) -> Result<Value, ApiError> {
        let mut query: Vec<(String, String)> = Vec::with_capacity(params.len() + 1);
        if let Some(role) = self.resource.scoped_role() {
            query.push(("role".to_string(), role.to_string()));
        }
        query.extend(
            params
                .iter()
                .filter(|(k, _)| !(self.resource.scoped_role().is_some() && k == "role"))
                .cloned(),
        );
        self.call(ApiRequest::get(self.resource.path()).with_query(query))
            .await
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Value, ApiError> {
        self.call(ApiRequest::get(self.item_path(id))).await
    }

    pub async fn create(&self, mut payload: Value) -> Result<Value, ApiError> {
        if let (Some(role), Some(fields)) = (self.resource.scoped_role(), payload.as_object_mut()) {
            fields.insert("role".to_string(), Value::String(role.to_string()));
        }
        self.call(ApiRequest::post(self.resource.path(), payload))
            .await
    }

    pub async fn update(&self, id: &str, payload: Value) -> Result<Value, ApiError> {
        self.call(ApiRequest::put(self.item_path(id), payload)).await
    }

    pub async fn remove(&self, id: &str) -> Result<Value, ApiError> {
        self.call(ApiRequest::delete(self.item_path(id))).await
    }
}

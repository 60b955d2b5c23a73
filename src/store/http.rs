//! REST adapter over a JSON HTTP backend.
//!
//! Wire conventions: `GET /{resource}?skip=&limit=[&sort=][&where=]` returns
//! `{ "items": [...], "total": n }`; item routes are `GET/PUT/PATCH/DELETE
//! /{resource}/{id}` and `POST /{resource}` for creation. Validation
//! failures answer 422 with a field→message body.

use serde_json::Value;

use crate::error::{ModelError, ValidationErrors};
use crate::model::{encode_id, item_id, Id, Item, QueryOption, Wheres};
use crate::store::{QueryPage, RestAdapter};

pub struct HttpAdapter {
    client: reqwest::Client,
    base_url: String,
    resource: String,
}

impl HttpAdapter {
    pub fn new(base_url: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            resource: resource.into(),
        }
    }

    fn collection_url(&self) -> String {
        format!("{}/{}", self.base_url, self.resource)
    }

    fn item_url(&self, id: &Id) -> String {
        format!("{}/{}/{}", self.base_url, self.resource, encode_id(id))
    }

    fn transport(err: reqwest::Error) -> ModelError {
        ModelError::Transport(err.to_string())
    }

    /// Map an error response onto the error taxonomy.
    async fn check(&self, response: reqwest::Response) -> Result<reqwest::Response, ModelError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let path = response.url().path().to_string();
        match status.as_u16() {
            404 => Err(ModelError::NotFound(path)),
            401 | 403 => Err(ModelError::PermissionDenied(path)),
            400 | 422 => {
                let body: Value = response.json().await.unwrap_or(Value::Null);
                Err(ModelError::Validation(parse_field_errors(&body)))
            }
            _ => Err(ModelError::Transport(format!("{} for {}", status, path))),
        }
    }
}

/// Accepts either `{ "fields": { name: message } }` or a bare field→message
/// object; anything else becomes a single unkeyed message.
fn parse_field_errors(body: &Value) -> ValidationErrors {
    let map = body.get("fields").unwrap_or(body);
    let mut errors = ValidationErrors::default();
    if let Some(obj) = map.as_object() {
        for (field, message) in obj {
            if let Some(text) = message.as_str() {
                errors.insert(field.clone(), text);
            }
        }
    }
    if errors.is_empty() {
        errors.insert("_", body.to_string());
    }
    errors
}

#[async_trait::async_trait]
impl RestAdapter for HttpAdapter {
    async fn get(&self, id: &Id) -> Result<Item, ModelError> {
        let response = self
            .client
            .get(self.item_url(id))
            .send()
            .await
            .map_err(Self::transport)?;
        self.check(response).await?.json().await.map_err(Self::transport)
    }

    async fn query(&self, option: &QueryOption, wheres: &Wheres) -> Result<QueryPage, ModelError> {
        let mut request = self
            .client
            .get(self.collection_url())
            .query(&[("skip", option.skip), ("limit", option.limit)]);
        if let Some(sort) = &option.sort {
            request = request.query(&[("sort", sort)]);
        }
        if !wheres.is_empty() {
            let encoded = serde_json::to_string(wheres)
                .map_err(|e| ModelError::Transport(e.to_string()))?;
            request = request.query(&[("where", encoded)]);
        }
        let response = request.send().await.map_err(Self::transport)?;
        self.check(response).await?.json().await.map_err(Self::transport)
    }

    async fn save(&self, item: &Item, partial: bool) -> Result<Item, ModelError> {
        let request = match item_id(item) {
            Some(id) if partial => self.client.patch(self.item_url(&id)),
            Some(id) => self.client.put(self.item_url(&id)),
            None => self.client.post(self.collection_url()),
        };
        let response = request.json(item).send().await.map_err(Self::transport)?;
        self.check(response).await?.json().await.map_err(Self::transport)
    }

    async fn delete(&self, id: &Id) -> Result<(), ModelError> {
        let response = self
            .client
            .delete(self.item_url(id))
            .send()
            .await
            .map_err(Self::transport)?;
        self.check(response).await?;
        Ok(())
    }
}

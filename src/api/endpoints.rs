// Dashboard endpoint definitions and typed client methods.
// Registers every REST operation the dashboard uses, then wraps the
// generic mount/mutate surface with typed helpers.

use reqwest::Method;
use serde_json::{Value, json};

use crate::client::{
    HttpTransport, MultipartField, RequestBody, ResourceClient, Transport,
};
use crate::config::Config;
use crate::error::Result;
use crate::registry::{EndpointDescriptor, EndpointKind, EndpointRegistry};
use crate::session::{Session, TokenStore};

use super::TypedQuery;
use super::types::{
    ImageFile, LoginResponse, NewPromotion, NewUser, Promotion, PromotionUpdate, User, UserUpdate,
};

/// Invalidation tags used by the dashboard endpoints.
pub mod tags {
    use crate::registry::Tag;

    pub const PROMOTION: Tag = Tag("Promotion");
    pub const USER: Tag = Tag("User");
}

/// Registry holding every dashboard endpoint. Populated once; the
/// duplicate check makes a clashing registration fail at startup.
pub fn builtin() -> Result<EndpointRegistry> {
    let mut registry = EndpointRegistry::new();

    registry.register(EndpointDescriptor {
        name: "loginUser",
        kind: EndpointKind::Mutation,
        method: Method::POST,
        url_template: "login",
        tags: vec![],
    })?;

    registry.register(EndpointDescriptor {
        name: "getAllPromotions",
        kind: EndpointKind::Query,
        method: Method::GET,
        url_template: "promotions",
        tags: vec![tags::PROMOTION],
    })?;
    registry.register(EndpointDescriptor {
        name: "getPromotionById",
        kind: EndpointKind::Query,
        method: Method::GET,
        url_template: "promotions/{id}",
        tags: vec![tags::PROMOTION],
    })?;
    registry.register(EndpointDescriptor {
        name: "addPromotion",
        kind: EndpointKind::Mutation,
        method: Method::POST,
        url_template: "promotions2",
        tags: vec![tags::PROMOTION],
    })?;
    registry.register(EndpointDescriptor {
        name: "updatePromotion",
        kind: EndpointKind::Mutation,
        method: Method::PUT,
        url_template: "promotions/{id}",
        tags: vec![tags::PROMOTION],
    })?;
    registry.register(EndpointDescriptor {
        name: "deletePromotion",
        kind: EndpointKind::Mutation,
        method: Method::DELETE,
        url_template: "promotions/{id}",
        tags: vec![tags::PROMOTION],
    })?;

    registry.register(EndpointDescriptor {
        name: "getAllUsers",
        kind: EndpointKind::Query,
        method: Method::GET,
        url_template: "users",
        tags: vec![tags::USER],
    })?;
    registry.register(EndpointDescriptor {
        name: "addUser",
        kind: EndpointKind::Mutation,
        method: Method::POST,
        url_template: "users",
        tags: vec![tags::USER],
    })?;
    registry.register(EndpointDescriptor {
        name: "updateUser",
        kind: EndpointKind::Mutation,
        method: Method::PUT,
        url_template: "users/{id}",
        tags: vec![tags::USER],
    })?;
    registry.register(EndpointDescriptor {
        name: "deleteUser",
        kind: EndpointKind::Mutation,
        method: Method::DELETE,
        url_template: "users/{id}",
        tags: vec![tags::USER],
    })?;

    Ok(registry)
}

/// Build a production client: built-in endpoints, reqwest transport,
/// and a session persisted at the platform default location.
pub fn connect(config: Config) -> Result<ResourceClient<HttpTransport>> {
    let registry = builtin()?;
    let transport = HttpTransport::new(config.request_timeout)?;
    let session = Session::with_store(TokenStore::new()?)?;
    Ok(ResourceClient::new(config, registry, transport, session))
}

fn date_field(name: &str, date: chrono::NaiveDate) -> MultipartField {
    MultipartField::Text {
        name: name.to_string(),
        value: date.format("%Y-%m-%d").to_string(),
    }
}

fn image_field(name: &str, image: ImageFile) -> MultipartField {
    MultipartField::File {
        name: name.to_string(),
        file_name: image.file_name,
        content_type: image.content_type,
        bytes: image.bytes,
    }
}

impl<T: Transport> ResourceClient<T> {
    /// Log in and store the returned bearer token in the session.
    pub async fn login(&self, username: &str, password: &str) -> Result<String> {
        let body = RequestBody::Json(json!({ "username": username, "password": password }));
        let value = self.mutate("loginUser", Value::Null, body).await?;
        let response: LoginResponse = serde_json::from_value(value)?;
        self.session().set_token(&response.access_token)?;
        Ok(response.access_token)
    }

    /// Log out: clears the session token and its persisted copy.
    pub fn logout(&self) -> Result<()> {
        self.session().clear()
    }

    pub fn all_promotions(&self) -> Result<TypedQuery<Vec<Promotion>, T>> {
        Ok(TypedQuery::new(self.mount("getAllPromotions", json!({}))?))
    }

    pub fn promotion_by_id(&self, id: u64) -> Result<TypedQuery<Promotion, T>> {
        Ok(TypedQuery::new(
            self.mount("getPromotionById", json!({ "id": id }))?,
        ))
    }

    pub async fn add_promotion(&self, promotion: NewPromotion) -> Result<Value> {
        let body = RequestBody::Multipart(vec![
            MultipartField::Text {
                name: "name".to_string(),
                value: promotion.name,
            },
            date_field("startDate", promotion.start_date),
            date_field("endDate", promotion.end_date),
            image_field("image", promotion.image),
        ]);
        self.mutate("addPromotion", Value::Null, body).await
    }

    pub async fn update_promotion(&self, update: PromotionUpdate) -> Result<Value> {
        let mut fields = vec![
            MultipartField::Text {
                name: "id".to_string(),
                value: update.id.to_string(),
            },
            MultipartField::Text {
                name: "name".to_string(),
                value: update.name,
            },
            date_field("startDate", update.start_date),
            date_field("endDate", update.end_date),
        ];
        if let Some(image) = update.image {
            fields.push(image_field("image", image));
        }
        self.mutate(
            "updatePromotion",
            json!({ "id": update.id }),
            RequestBody::Multipart(fields),
        )
        .await
    }

    pub async fn delete_promotion(&self, id: u64) -> Result<Value> {
        self.mutate("deletePromotion", json!({ "id": id }), RequestBody::Empty)
            .await
    }

    pub fn all_users(&self) -> Result<TypedQuery<Vec<User>, T>> {
        Ok(TypedQuery::new(self.mount("getAllUsers", json!({}))?))
    }

    pub async fn add_user(&self, user: NewUser) -> Result<Value> {
        let body = RequestBody::Json(serde_json::to_value(&user)?);
        self.mutate("addUser", Value::Null, body).await
    }

    pub async fn update_user(&self, update: UserUpdate) -> Result<Value> {
        let args = json!({ "id": update.id });
        let body = RequestBody::Json(serde_json::to_value(&update)?);
        self.mutate("updateUser", args, body).await
    }

    pub async fn delete_user(&self, id: u64) -> Result<Value> {
        self.mutate("deleteUser", json!({ "id": id }), RequestBody::Empty)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_is_complete() {
        let registry = builtin().unwrap();
        assert_eq!(registry.len(), 10);

        for name in [
            "loginUser",
            "getAllPromotions",
            "getPromotionById",
            "addPromotion",
            "updatePromotion",
            "deletePromotion",
            "getAllUsers",
            "addUser",
            "updateUser",
            "deleteUser",
        ] {
            assert!(registry.resolve(name).is_ok(), "missing endpoint {name}");
        }
    }

    #[test]
    fn test_mutations_declare_their_tags() {
        let registry = builtin().unwrap();
        assert_eq!(
            registry.resolve("addPromotion").unwrap().tags,
            vec![tags::PROMOTION]
        );
        assert_eq!(registry.resolve("deleteUser").unwrap().tags, vec![tags::USER]);
        assert!(registry.resolve("loginUser").unwrap().tags.is_empty());
    }
}

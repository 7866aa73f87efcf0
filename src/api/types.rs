// Dashboard API types.
// Wire shapes for promotions, users, and the login exchange.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A promotional campaign. Dates are ISO `YYYY-MM-DD` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Promotion {
    pub id: u64,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub image_path: String,
}

/// A dashboard account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub role: Role,
}

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
    #[serde(other)]
    Unknown,
}

/// Raw image bytes for a multipart upload. The bytes are sent verbatim;
/// nothing re-encodes them.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Payload for creating a promotion.
#[derive(Debug, Clone)]
pub struct NewPromotion {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub image: ImageFile,
}

/// Payload for updating a promotion. The image is optional; omitting
/// it keeps the stored one.
#[derive(Debug, Clone)]
pub struct PromotionUpdate {
    pub id: u64,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub image: Option<ImageFile>,
}

/// Payload for creating a user.
#[derive(Debug, Clone, Serialize)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub role: Role,
}

/// Payload for updating a user.
#[derive(Debug, Clone, Serialize)]
pub struct UserUpdate {
    #[serde(skip)]
    pub id: u64,
    pub username: String,
    pub role: Role,
}

/// Successful login response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_promotion_wire_shape() {
        let wire = json!({
            "id": 3,
            "name": "Summer Sale",
            "startDate": "2024-06-01",
            "endDate": "2024-06-30",
            "imagePath": "/uploads/summer.png"
        });

        let promotion: Promotion = serde_json::from_value(wire.clone()).unwrap();
        assert_eq!(promotion.name, "Summer Sale");
        assert_eq!(promotion.start_date.to_string(), "2024-06-01");
        assert_eq!(promotion.image_path, "/uploads/summer.png");

        // Round-trips without field loss.
        assert_eq!(serde_json::to_value(&promotion).unwrap(), wire);
    }

    #[test]
    fn test_unknown_role_falls_back() {
        let user: User =
            serde_json::from_value(json!({ "id": 1, "username": "john", "role": "owner" }))
                .unwrap();
        assert_eq!(user.role, Role::Unknown);
    }

    #[test]
    fn test_missing_role_defaults() {
        let user: User = serde_json::from_value(json!({ "id": 1, "username": "john" })).unwrap();
        assert_eq!(user.role, Role::User);
    }

    #[test]
    fn test_login_response_field_name() {
        let response: LoginResponse =
            serde_json::from_value(json!({ "accessToken": "tok123" })).unwrap();
        assert_eq!(response.access_token, "tok123");
    }
}

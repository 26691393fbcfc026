use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::error::Result;
use crate::products::ImageFile;
use crate::request::ApiRequest;
use crate::rest::ApiClient;

const NATIONAL_ID_CHECK: &str = "/users/check-national-id/";

#[derive(Deserialize)]
struct Exists {
    exists: bool,
}

#[derive(Deserialize)]
struct CompletedProfile {
    #[serde(default)]
    data: Option<Value>,
}

/// Account endpoints for the signed-in user
#[derive(Debug, Clone, Copy)]
pub struct Users<'a> {
    client: &'a ApiClient,
}

impl ApiClient {
    /// Account endpoints for the signed-in user
    pub fn users(&self) -> Users<'_> {
        Users { client: self }
    }
}

impl<'a> Users<'a> {
    /// Fetch the current profile and refresh the stored copy
    pub fn me(&self) -> Result<Value> {
        let user: Value = self.client.get("/users/me/")?;
        self.client.session().update_user(&user)?;
        Ok(user)
    }

    /// Partially update the profile; returns the updated profile
    pub fn update_profile<B>(&self, payload: &B) -> Result<Value>
    where
        B: Serialize + ?Sized,
    {
        let user: Value = self.client.patch("/users/update_profile/", payload)?;
        self.client.session().update_user(&user)?;
        Ok(user)
    }

    /// Submit the onboarding form.
    ///
    /// A 401 here is reported as is, without refresh or forced logout.
    pub fn complete_profile<B>(&self, payload: &B) -> Result<Value>
    where
        B: Serialize + ?Sized,
    {
        let completed: CompletedProfile = self.client.post("/users/complete_profile/", payload)?;
        let user = completed.data.unwrap_or(Value::Null);
        if user.is_object() {
            self.client.session().update_user(&user)?;
        }
        Ok(user)
    }

    pub fn upload_picture<T>(&self, picture: ImageFile) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.client.apply(
            ApiRequest::post("/users/upload_picture/")
                .multipart(vec![picture.into_part("profile_picture")]),
        )
    }

    /// Check whether a national ID number is already registered
    pub fn national_id_exists(&self, national_id: &str) -> Result<bool> {
        let found: Exists = self.client.apply(
            ApiRequest::get(NATIONAL_ID_CHECK).query("nationalIdNumber", national_id),
        )?;
        Ok(found.exists)
    }

    /// Deactivate the account and drop the local session
    pub fn delete_account(&self, password: &str) -> Result<()> {
        self.client.send(
            ApiRequest::delete("/users/delete_account/").json(&json!({ "password": password }))?,
        )?;
        self.client.session().clear()?;
        info!("account deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ApiError, ErrorKind};
    use crate::testing::{body_json, client, logged_in, MockTransport};
    use crate::transport::{HttpResponse, WireBody};

    #[test]
    fn test_me_updates_stored_user() {
        let transport = MockTransport::new(|_| {
            Ok(HttpResponse::json(
                200,
                &json!({"id": 1, "email": "ana@example.com", "profile_completed": true}),
            ))
        });
        let client = logged_in(transport.clone());

        let user = client.users().me().unwrap();

        assert_eq!(user["profileCompleted"], true);
        assert_eq!(client.session().user().unwrap()["profileCompleted"], true);
        assert_eq!(transport.last().url.path(), "/api/users/me/");
    }

    #[test]
    fn test_update_profile_snake_cases_body() {
        let transport = MockTransport::new(|_| Ok(HttpResponse::json(200, &json!({"id": 1, "last_name": "Lovelace"}))));
        let client = logged_in(transport.clone());

        let user = client.users().update_profile(&json!({"lastName": "Lovelace"})).unwrap();

        assert_eq!(user["lastName"], "Lovelace");
        let sent = transport.last();
        assert_eq!(sent.method, reqwest::Method::PATCH);
        assert_eq!(body_json(&sent), json!({"last_name": "Lovelace"}));
    }

    #[test]
    fn test_complete_profile_unauthorized_keeps_session() {
        let transport = MockTransport::new(|_| {
            Ok(HttpResponse::json(401, &json!({"detail": "Given token not valid for any token type"})))
        });
        let client = logged_in(transport.clone());

        let error = client
            .users()
            .complete_profile(&json!({"nationalIdNumber": "12345678"}))
            .unwrap_err();

        assert!(matches!(error, ApiError::Unauthorized { .. }));
        assert_eq!(error.message(), "Given token not valid for any token type");
        assert_eq!(transport.count("/auth/token/refresh/"), 0);
        assert!(client.session().has_user());
    }

    #[test]
    fn test_complete_profile_stores_returned_user() {
        let transport = MockTransport::new(|_| {
            Ok(HttpResponse::json(
                200,
                &json!({
                    "message": "Profile completed successfully",
                    "data": {"id": 1, "phone_number": "+254700000000"},
                    "profile_completed": true
                }),
            ))
        });
        let client = logged_in(transport);

        let user = client.users().complete_profile(&json!({"phoneNumber": "+254700000000"})).unwrap();

        assert_eq!(user["phoneNumber"], "+254700000000");
        assert_eq!(client.session().user().unwrap()["id"], 1);
    }

    #[test]
    fn test_upload_picture_field_name() {
        let transport = MockTransport::new(|_| Ok(HttpResponse::json(200, &json!({"profile_picture": "/media/p.png"}))));
        let client = logged_in(transport.clone());

        let picture: Value = client
            .users()
            .upload_picture(ImageFile::new("p.png", "image/png", vec![1, 2, 3]))
            .unwrap();

        assert_eq!(picture["profilePicture"], "/media/p.png");
        match transport.last().body {
            WireBody::Multipart(parts) => assert!(matches!(
                &parts[0],
                crate::request::FormPart::File { name, .. } if name == "profile_picture"
            )),
            other => panic!("expected multipart body, got {:?}", other),
        }
    }

    #[test]
    fn test_national_id_exists() {
        let transport = MockTransport::new(|_| Ok(HttpResponse::json(200, &json!({"exists": true}))));
        let client = client(transport.clone());

        assert!(client.users().national_id_exists("12345678").unwrap());
        assert_eq!(transport.last().url.query(), Some("national_id_number=12345678"));
    }

    #[test]
    fn test_delete_account() {
        let transport = MockTransport::new(|_| Ok(HttpResponse::empty(204)));
        let client = logged_in(transport.clone());

        client.users().delete_account("secret").unwrap();

        assert_eq!(body_json(&transport.last()), json!({"password": "secret"}));
        assert!(!client.session().has_user());
    }

    #[test]
    fn test_delete_account_wrong_password() {
        let transport = MockTransport::new(|_| Ok(HttpResponse::json(400, &json!({"error": "Invalid password"}))));
        let client = logged_in(transport);

        let error = client.users().delete_account("nope").unwrap_err();

        assert_eq!(error.kind(), ErrorKind::Validation);
        assert_eq!(error.message(), "Invalid password");
        assert!(client.session().has_user());
    }
}

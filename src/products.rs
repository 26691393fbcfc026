use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::Result;
use crate::request::{ApiRequest, FormPart};
use crate::response::Page;
use crate::rest::ApiClient;

/// Rental duration unit used by pricing tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationUnit {
    Day,
    Week,
    Month,
}

impl DurationUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            DurationUnit::Day => "day",
            DurationUnit::Week => "week",
            DurationUnit::Month => "month",
        }
    }
}

/// An image file to upload
#[derive(Debug, Clone, PartialEq)]
pub struct ImageFile {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImageFile {
    pub fn new(filename: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        ImageFile {
            filename: filename.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub(crate) fn into_part(self, field: &str) -> FormPart {
        FormPart::file(field, self.filename, self.mime_type, self.bytes)
    }
}

#[derive(Deserialize)]
struct Available {
    available: bool,
}

#[derive(Deserialize)]
struct Price {
    price: Value,
}

/// Product listing endpoints
#[derive(Debug, Clone, Copy)]
pub struct Products<'a> {
    client: &'a ApiClient,
}

impl ApiClient {
    /// Product listing endpoints
    pub fn products(&self) -> Products<'_> {
        Products { client: self }
    }
}

fn product_path(id: u64) -> String {
    format!("/products/{}/", id)
}

impl<'a> Products<'a> {
    /// List products, filtered by query parameters in client casing
    /// (e.g. `("category", "tent")`, `("page", "2")`)
    pub fn list<T>(&self, query: &[(&str, &str)]) -> Result<Page<T>>
    where
        T: DeserializeOwned,
    {
        let request = query
            .iter()
            .fold(ApiRequest::get("/products/"), |req, (k, v)| req.query(*k, *v));
        self.client.apply(request)
    }

    /// Get a single product
    pub fn get<T>(&self, id: u64) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.client.get(&product_path(id))
    }

    /// Up to `limit` products of the same category, excluding `exclude_id`
    pub fn similar(&self, category: &str, exclude_id: u64, limit: usize) -> Result<Vec<Value>> {
        let page: Page<Value> = self.list(&[("category", category)])?;
        Ok(page
            .results
            .into_iter()
            .filter(|p| p.get("id").and_then(Value::as_u64) != Some(exclude_id))
            .take(limit)
            .collect())
    }

    /// Products owned by the signed-in user
    pub fn mine<T>(&self) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.client.get("/products/my_products/")
    }

    /// Create a listing (saved as a draft by the backend)
    pub fn create<T, B>(&self, payload: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.client.post("/products/", payload)
    }

    /// Partially update a listing
    pub fn update<T, B>(&self, id: u64, payload: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.client.patch(&product_path(id), payload)
    }

    pub fn delete(&self, id: u64) -> Result<()> {
        self.client.delete(&product_path(id))
    }

    /// Upload one image for a listing as multipart form data
    pub fn upload_image<T>(&self, id: u64, image: ImageFile) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let path = format!("/products/{}/upload_image/", id);
        self.client
            .apply(ApiRequest::post(path).multipart(vec![image.into_part("image")]))
    }

    pub fn delete_image(&self, id: u64, image_id: u64) -> Result<()> {
        let path = format!("/products/{}/delete_image/", id);
        self.client
            .send(ApiRequest::delete(path).json(&json!({ "imageId": image_id }))?)
            .map(|_| ())
    }

    /// Change a listing's moderation status
    pub fn update_status<T>(&self, id: u64, status: &str, message: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let path = format!("/products/{}/update_status/", id);
        self.client
            .patch(&path, &json!({ "status": status, "statusMessage": message }))
    }

    pub fn submit_for_review<T>(&self, id: u64) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let path = format!("/products/{}/submit_for_review/", id);
        self.client.apply(ApiRequest::post(path))
    }

    /// Check whether a listing is free for a date range (`YYYY-MM-DD`)
    pub fn availability(&self, id: u64, start_date: &str, end_date: &str) -> Result<bool> {
        let path = format!("/products/{}/availability/", id);
        let available: Available = self.client.apply(
            ApiRequest::get(path)
                .query("startDate", start_date)
                .query("endDate", end_date),
        )?;
        Ok(available.available)
    }

    /// Check whether a listing is free on a single date
    pub fn available_on(&self, id: u64, date: &str) -> Result<bool> {
        let path = format!("/products/{}/availability/", id);
        let available: Available = self.client.apply(ApiRequest::get(path).query("date", date))?;
        Ok(available.available)
    }

    /// Price of renting a listing for `duration` units
    pub fn pricing(&self, id: u64, duration: u32, unit: DurationUnit) -> Result<Value> {
        let path = format!("/products/{}/pricing/", id);
        let price: Price = self.client.apply(
            ApiRequest::get(path)
                .query("duration", duration.to_string())
                .query("unit", unit.as_str()),
        )?;
        Ok(price.price)
    }
}

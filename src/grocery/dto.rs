use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub name: String,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub start: String,
    pub end: String,
}

//! Catalogue and book request bodies. Query strings are read as raw text and
//! parsed here so a malformed value gets the usual `{"error"}` response.

use crate::api::forms::parse_id;
use crate::domain::book::{BookFilter, BookListing};
use crate::domain::book_request::RequestListing;
use crate::domain::page::Page;
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

fn parsed<T: FromStr>(raw: Option<&str>, name: &str) -> Result<Option<T>> {
    raw.map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| v.parse::<T>().map_err(|_| AppError::BadRequest(format!("Invalid {name}"))))
        .transpose()
}

fn blank_to_none(raw: Option<String>) -> Option<String> {
    raw.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl PageQuery {
    /// # Errors
    /// Returns `AppError::BadRequest` when `page` or `limit` is not a number.
    pub fn page(&self) -> Result<Page> {
        Ok(Page::new(parsed(self.page.as_deref(), "page")?, parsed(self.limit.as_deref(), "limit")?))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub min_pages: Option<String>,
    pub max_pages: Option<String>,
    pub product_type: Option<String>,
    pub condition: Option<String>,
    pub uploader_id: Option<String>,
    pub author: Option<String>,
    #[serde(flatten)]
    pub paging: PageQuery,
}

impl BookQuery {
    /// # Errors
    /// Returns `AppError::BadRequest` naming the first parameter that does not parse.
    pub fn into_filter(self) -> Result<(BookFilter, Page)> {
        let page = self.paging.page()?;
        let id = |raw: Option<&str>, what| raw.map(str::trim).filter(|v| !v.is_empty()).map(|v| parse_id(v, what));
        let filter = BookFilter {
            category_id: id(self.category.as_deref(), "category").transpose()?,
            uploader_id: id(self.uploader_id.as_deref(), "uploader").transpose()?,
            min_price: parsed(self.min_price.as_deref(), "minPrice")?,
            max_price: parsed(self.max_price.as_deref(), "maxPrice")?,
            min_pages: parsed(self.min_pages.as_deref(), "minPages")?,
            max_pages: parsed(self.max_pages.as_deref(), "maxPages")?,
            product_type: parsed(self.product_type.as_deref(), "productType")?,
            condition: parsed(self.condition.as_deref(), "condition")?,
            search: blank_to_none(self.search),
            author: blank_to_none(self.author),
        };
        Ok((filter, page))
    }
}

#[derive(Debug, Serialize)]
pub struct FilteredBooks {
    pub total: u64,
    pub books: Vec<BookListing>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestBook {
    #[serde(default)]
    pub book_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SetRequestStatus {
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlreadyRequested {
    pub already_requested: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PagedRequests {
    pub requests: Vec<RequestListing>,
    pub current_page: u32,
    pub total_pages: u64,
    pub total_items: u64,
}

#[derive(Debug, Serialize)]
pub struct SentRequests {
    pub requests: Vec<RequestListing>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookDeleted {
    pub message: &'static str,
    pub book_id: Uuid,
}

use crate::domain::category::Category;
use crate::domain::user::PublicUser;
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

/// Images one book listing may carry.
pub const MAX_BOOK_IMAGES: usize = 5;

/// How many related books a listing page shows.
pub const RELATED_LIMIT: usize = 10;

pub const MISSING_BOOK_FIELDS: &str = "Title, genre, condition, location, productType and categoryId are required";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    New,
    Used,
}

impl Condition {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Used => "used",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Condition {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "new" => Ok(Self::New),
            "used" => Ok(Self::Used),
            _ => Err(AppError::BadRequest("Invalid condition".to_string())),
        }
    }
}

/// What the uploader wants in return for the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductType {
    Exchange,
    Free,
    Sale,
}

impl ProductType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Exchange => "exchange",
            Self::Free => "free",
            Self::Sale => "sale",
        }
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exchange" => Ok(Self::Exchange),
            "free" => Ok(Self::Free),
            "sale" => Ok(Self::Sale),
            _ => Err(AppError::BadRequest("Invalid productType".to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    /// Free-text author name as typed by the uploader.
    pub author: Option<String>,
    pub uploader_id: Uuid,
    pub genre: Vec<String>,
    pub condition: Condition,
    pub product_type: ProductType,
    pub price: f64,
    pub description: Option<String>,
    pub pages: Option<i32>,
    pub category_id: Uuid,
    pub images: Vec<String>,
    pub location: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Book {
    #[must_use]
    pub fn is_uploaded_by(&self, user_id: Uuid) -> bool {
        self.uploader_id == user_id
    }

    /// Another book in the same category or sharing at least one genre.
    #[must_use]
    pub fn is_related_to(&self, other: &Self) -> bool {
        self.id != other.id
            && (self.category_id == other.category_id || self.genre.iter().any(|g| other.genre.contains(g)))
    }

    /// Applies the fields present in `fields`. Images are handled by the caller.
    ///
    /// # Errors
    /// Returns `AppError::BadRequest` if a present field is invalid or a sale ends up without a price.
    pub fn apply(&mut self, fields: BookFields) -> Result<()> {
        if let Some(title) = fields.title {
            self.title =
                required_text(Some(title)).ok_or_else(|| AppError::BadRequest(MISSING_BOOK_FIELDS.to_string()))?;
        }
        if let Some(author) = fields.author {
            self.author = required_text(Some(author));
        }
        let genre = parse_genres(fields.genre);
        if !genre.is_empty() {
            self.genre = genre;
        }
        if let Some(condition) = fields.condition {
            self.condition = condition.parse()?;
        }
        if let Some(product_type) = fields.product_type {
            self.product_type = product_type.parse()?;
        }
        if let Some(description) = fields.description {
            self.description = required_text(Some(description));
        }
        if let Some(pages) = fields.pages {
            self.pages = Some(checked_pages(pages)?);
        }
        if let Some(category_id) = fields.category_id {
            self.category_id = parse_category_id(&category_id)?;
        }
        if let Some(location) = fields.location {
            self.location =
                required_text(Some(location)).ok_or_else(|| AppError::BadRequest(MISSING_BOOK_FIELDS.to_string()))?;
        }
        self.price = listing_price(self.product_type, fields.price.or(Some(self.price)))?;
        Ok(())
    }
}

/// Loosely shaped book input, as it arrives from a form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookFields {
    pub title: Option<String>,
    pub author: Option<String>,
    pub genre: Vec<String>,
    pub condition: Option<String>,
    pub product_type: Option<String>,
    pub price: Option<f64>,
    pub description: Option<String>,
    pub pages: Option<i32>,
    pub category_id: Option<String>,
    pub location: Option<String>,
}

/// A validated book that has not been persisted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBook {
    pub title: String,
    pub slug: String,
    pub author: Option<String>,
    pub uploader_id: Uuid,
    pub genre: Vec<String>,
    pub condition: Condition,
    pub product_type: ProductType,
    pub price: f64,
    pub description: Option<String>,
    pub pages: Option<i32>,
    pub category_id: Uuid,
    pub images: Vec<String>,
    pub location: String,
}

impl NewBook {
    /// Validates a new listing. The slug is derived from the title and images start empty.
    ///
    /// # Errors
    /// Returns `AppError::BadRequest` if a required field is missing or a field is invalid.
    pub fn new(uploader_id: Uuid, fields: BookFields) -> Result<Self> {
        let genre = parse_genres(fields.genre);
        let (Some(title), Some(condition), Some(product_type), Some(category_id), Some(location)) = (
            required_text(fields.title),
            required_text(fields.condition),
            required_text(fields.product_type),
            required_text(fields.category_id),
            required_text(fields.location),
        ) else {
            return Err(AppError::BadRequest(MISSING_BOOK_FIELDS.to_string()));
        };
        if genre.is_empty() {
            return Err(AppError::BadRequest(MISSING_BOOK_FIELDS.to_string()));
        }

        let product_type: ProductType = product_type.parse()?;
        Ok(Self {
            slug: slugify(&title),
            title,
            author: required_text(fields.author),
            uploader_id,
            genre,
            condition: condition.parse()?,
            product_type,
            price: listing_price(product_type, fields.price)?,
            description: required_text(fields.description),
            pages: fields.pages.map(checked_pages).transpose()?,
            category_id: parse_category_id(&category_id)?,
            images: Vec::new(),
            location,
        })
    }
}

/// Search criteria for the public catalogue. Every criterion is optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookFilter {
    /// Case-insensitive substring of the title.
    pub search: Option<String>,
    pub category_id: Option<Uuid>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_pages: Option<i32>,
    pub max_pages: Option<i32>,
    pub product_type: Option<ProductType>,
    pub condition: Option<Condition>,
    pub uploader_id: Option<Uuid>,
    /// Case-insensitive substring of the author name.
    pub author: Option<String>,
}

impl BookFilter {
    #[must_use]
    pub fn matches(&self, book: &Book) -> bool {
        let contains = |haystack: &str, needle: &str| haystack.to_lowercase().contains(&needle.to_lowercase());

        self.search.as_deref().is_none_or(|q| contains(&book.title, q))
            && self.category_id.is_none_or(|id| book.category_id == id)
            && self.min_price.is_none_or(|min| book.price >= min)
            && self.max_price.is_none_or(|max| book.price <= max)
            && self.min_pages.is_none_or(|min| book.pages.is_some_and(|p| p >= min))
            && self.max_pages.is_none_or(|max| book.pages.is_some_and(|p| p <= max))
            && self.product_type.is_none_or(|t| book.product_type == t)
            && self.condition.is_none_or(|c| book.condition == c)
            && self.uploader_id.is_none_or(|id| book.uploader_id == id)
            && self.author.as_deref().is_none_or(|a| book.author.as_deref().is_some_and(|name| contains(name, a)))
    }
}

/// A book with its category and uploader resolved, as listings show it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookListing {
    #[serde(flatten)]
    pub book: Book,
    pub category: Option<Category>,
    pub uploader: Option<PublicUser>,
}

/// Lowercase ASCII slug with single dashes between words.
#[must_use]
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() { "book".to_string() } else { slug.to_string() }
}

/// Splits comma separated values, trims them and drops blanks and repeats.
#[must_use]
pub fn parse_genres(values: Vec<String>) -> Vec<String> {
    let mut genres: Vec<String> = Vec::new();
    for genre in values.iter().flat_map(|v| v.split(',')).map(str::trim).filter(|g| !g.is_empty()) {
        if !genres.iter().any(|g| g == genre) {
            genres.push(genre.to_string());
        }
    }
    genres
}

fn required_text(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_category_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::BadRequest("Invalid category ID".to_string()))
}

fn checked_pages(pages: i32) -> Result<i32> {
    if pages < 1 {
        return Err(AppError::BadRequest("Invalid pages".to_string()));
    }
    Ok(pages)
}

/// Sales need a positive price; every other listing is free of charge.
fn listing_price(product_type: ProductType, price: Option<f64>) -> Result<f64> {
    if product_type != ProductType::Sale {
        return Ok(0.0);
    }
    match price {
        Some(price) if !price.is_finite() || price < 0.0 => Err(AppError::BadRequest("Invalid price".to_string())),
        Some(price) if price > 0.0 => Ok(price),
        _ => Err(AppError::BadRequest("Price is required for sale books".to_string())),
    }
}

#[cfg(test)]
pub(crate) fn sample_fields(category_id: Uuid) -> BookFields {
    BookFields {
        title: Some("Dune".to_string()),
        author: Some("Frank Herbert".to_string()),
        genre: vec!["sci-fi, classic".to_string()],
        condition: Some("used".to_string()),
        product_type: Some("exchange".to_string()),
        price: None,
        description: None,
        pages: Some(412),
        category_id: Some(category_id.to_string()),
        location: Some("Lisbon".to_string()),
    }
}

#[cfg(test)]
pub(crate) fn sample(uploader_id: Uuid, category_id: Uuid, title: &str, genre: &[&str]) -> Book {
    let now = OffsetDateTime::now_utc();
    Book {
        id: Uuid::new_v4(),
        title: title.to_string(),
        slug: slugify(title),
        author: None,
        uploader_id,
        genre: genre.iter().map(ToString::to_string).collect(),
        condition: Condition::Used,
        product_type: ProductType::Exchange,
        price: 0.0,
        description: None,
        pages: None,
        category_id,
        images: Vec::new(),
        location: "Porto".to_string(),
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("The Left Hand of Darkness"), "the-left-hand-of-darkness");
        assert_eq!(slugify("  C++ -- for  Dummies! "), "c-for-dummies");
        assert_eq!(slugify("???"), "book");
    }

    #[test]
    fn test_parse_genres_splits_and_dedupes() {
        let genres = parse_genres(vec!["sci-fi, classic".to_string(), " classic ".to_string(), ",".to_string()]);
        assert_eq!(genres, vec!["sci-fi", "classic"]);
    }

    #[test]
    fn test_new_book_requires_fields() {
        let category = Uuid::new_v4();
        let book = NewBook::new(Uuid::new_v4(), sample_fields(category)).unwrap();
        assert_eq!(book.slug, "dune");
        assert_eq!(book.genre, vec!["sci-fi", "classic"]);
        assert_eq!(book.category_id, category);
        assert!(book.images.is_empty());

        let strips: [fn(&mut BookFields); 6] = [
            |f| f.title = Some("  ".to_string()),
            |f| f.genre.clear(),
            |f| f.condition = None,
            |f| f.location = None,
            |f| f.product_type = None,
            |f| f.category_id = None,
        ];
        for strip in strips {
            let mut fields = sample_fields(category);
            strip(&mut fields);
            let err = NewBook::new(Uuid::new_v4(), fields).unwrap_err();
            assert!(matches!(err, AppError::BadRequest(ref m) if m == MISSING_BOOK_FIELDS));
        }

        let mut fields = sample_fields(category);
        fields.condition = Some("mint".to_string());
        let err = NewBook::new(Uuid::new_v4(), fields).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(ref m) if m == "Invalid condition"));
    }

    #[test]
    fn test_sale_needs_price_and_others_are_free() {
        let category = Uuid::new_v4();

        let mut fields = sample_fields(category);
        fields.product_type = Some("sale".to_string());
        let err = NewBook::new(Uuid::new_v4(), fields.clone()).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(ref m) if m == "Price is required for sale books"));

        fields.price = Some(12.5);
        assert!((NewBook::new(Uuid::new_v4(), fields).unwrap().price - 12.5).abs() < f64::EPSILON);

        let mut fields = sample_fields(category);
        fields.price = Some(30.0);
        assert!(NewBook::new(Uuid::new_v4(), fields).unwrap().price.abs() < f64::EPSILON);
    }

    #[test]
    fn test_apply_updates_present_fields_only() {
        let mut book = sample(Uuid::new_v4(), Uuid::new_v4(), "Dune", &["sci-fi"]);
        book.apply(BookFields {
            title: Some("Dune Messiah".to_string()),
            product_type: Some("sale".to_string()),
            price: Some(8.0),
            ..BookFields::default()
        })
        .unwrap();

        assert_eq!(book.title, "Dune Messiah");
        assert_eq!(book.slug, "dune");
        assert_eq!(book.genre, vec!["sci-fi"]);
        assert_eq!(book.product_type, ProductType::Sale);
        assert!((book.price - 8.0).abs() < f64::EPSILON);

        book.apply(BookFields { product_type: Some("free".to_string()), ..BookFields::default() }).unwrap();
        assert!(book.price.abs() < f64::EPSILON);

        let err = book.apply(BookFields { product_type: Some("sale".to_string()), ..BookFields::default() });
        assert!(matches!(err, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_filter_matches() {
        let (me, category) = (Uuid::new_v4(), Uuid::new_v4());
        let mut book = sample(me, category, "The Hobbit", &["fantasy"]);
        book.author = Some("J. R. R. Tolkien".to_string());
        book.pages = Some(310);

        assert!(BookFilter::default().matches(&book));
        assert!(BookFilter { search: Some("hobb".to_string()), ..BookFilter::default() }.matches(&book));
        assert!(BookFilter { author: Some("tolkien".to_string()), ..BookFilter::default() }.matches(&book));
        assert!(BookFilter { min_pages: Some(300), max_pages: Some(320), ..BookFilter::default() }.matches(&book));
        assert!(!BookFilter { category_id: Some(Uuid::new_v4()), ..BookFilter::default() }.matches(&book));
        assert!(!BookFilter { product_type: Some(ProductType::Sale), ..BookFilter::default() }.matches(&book));

        book.pages = None;
        assert!(!BookFilter { min_pages: Some(1), ..BookFilter::default() }.matches(&book));
    }

    #[test]
    fn test_related_books_share_category_or_genre() {
        let (me, fantasy, poetry) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let hobbit = sample(me, fantasy, "The Hobbit", &["fantasy"]);

        assert!(!hobbit.is_related_to(&hobbit));
        assert!(hobbit.is_related_to(&sample(me, fantasy, "Earthsea", &["magic"])));
        assert!(hobbit.is_related_to(&sample(me, poetry, "Beowulf", &["fantasy", "epic"])));
        assert!(!hobbit.is_related_to(&sample(me, poetry, "Odes", &["verse"])));
    }
}

use serde::Deserialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProductSortBy {
    CreatedAt,
    Price,
    Name,
}

impl ProductSortBy {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ProductSortBy::CreatedAt => "created_at",
            ProductSortBy::Price => "price",
            ProductSortBy::Name => "name",
        }
    }
}

/// Catalog filters; every supplied filter must match. Price bounds are
/// inclusive, `search` is a case-insensitive substring over name, brand
/// and description. The pagination fields live directly on this struct:
/// query-string deserialization cannot route numeric fields through
/// `#[serde(flatten)]`.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ProductQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub category: Option<String>,
    pub search: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub sort_by: Option<ProductSortBy>,
    pub sort_order: Option<SortOrder>,
}

impl ProductQuery {
    pub fn normalize(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1) * per_page;
        (page, per_page, offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_unset() {
        let q = ProductQuery::default();
        assert_eq!(q.normalize(), (1, 20, 0));
    }

    #[test]
    fn per_page_is_clamped() {
        let q = ProductQuery {
            page: Some(3),
            per_page: Some(1000),
            ..Default::default()
        };
        assert_eq!(q.normalize(), (3, 100, 200));
    }

    #[test]
    fn nonpositive_page_snaps_to_first() {
        let q = ProductQuery {
            page: Some(-2),
            per_page: Some(10),
            ..Default::default()
        };
        assert_eq!(q.normalize(), (1, 10, 0));
    }

    #[test]
    fn sort_defaults_do_not_consume_the_query() {
        let q = ProductQuery {
            sort_by: Some(ProductSortBy::Price),
            ..Default::default()
        };
        let sort_by = q.sort_by.unwrap_or(ProductSortBy::CreatedAt);
        let sort_order = q.sort_order.unwrap_or(SortOrder::Desc);
        assert_eq!(sort_by.as_sql(), "price");
        assert_eq!(sort_order.as_sql(), "DESC");
        // The query must stay usable after the sort fields are read out.
        assert!(q.category.is_none());
        assert_eq!(q.normalize(), (1, 20, 0));
    }
}

use axum::{extract::Query, http::Uri};
use storefront_api::routes::params::ProductQuery;

fn parse(query: &str) -> ProductQuery {
    let uri: Uri = format!("/api/products{query}").parse().unwrap();
    let Query(parsed) = Query::<ProductQuery>::try_from_uri(&uri).unwrap();
    parsed
}

#[test]
fn bare_request_uses_defaults() {
    let q = parse("");
    assert_eq!(q.normalize(), (1, 20, 0));
    assert!(q.category.is_none());
    assert!(q.search.is_none());
}

#[test]
fn pagination_params_deserialize_as_numbers() {
    let q = parse("?page=2&per_page=10");
    assert_eq!(q.page, Some(2));
    assert_eq!(q.per_page, Some(10));
    assert_eq!(q.normalize(), (2, 10, 10));
}

#[test]
fn every_documented_filter_parses_together() {
    let q = parse(
        "?page=3&per_page=5&category=smartphones&search=pro&min_price=1000&max_price=200000&sort_by=price&sort_order=asc",
    );
    assert_eq!(q.normalize(), (3, 5, 10));
    assert_eq!(q.category.as_deref(), Some("smartphones"));
    assert_eq!(q.search.as_deref(), Some("pro"));
    assert_eq!(q.min_price, Some(1000));
    assert_eq!(q.max_price, Some(200000));
    assert_eq!(q.sort_by.unwrap().as_sql(), "price");
    assert_eq!(q.sort_order.unwrap().as_sql(), "ASC");
}

#[test]
fn non_numeric_page_is_rejected() {
    let uri: Uri = "/api/products?page=abc".parse().unwrap();
    assert!(Query::<ProductQuery>::try_from_uri(&uri).is_err());
}

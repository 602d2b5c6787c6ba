use super::*;
use crate::condition::SortDir;
use crate::mock::{MockConnection, MockResponse};
use crate::record;
use crate::record::Record;
use crate::value::Value;

fn count(n: i64) -> MockResponse {
    MockResponse::rows(vec![record! { "count" => n }])
}

fn users(n: i64) -> Vec<Record> {
    (1..=n)
        .map(|i| record! { "id" => i, "name" => format!("user{i}") })
        .collect()
}

fn users_query() -> TabularQuery {
    TabularQuery::new("users").columns(["id", "name", "created_at"])
}

#[tokio::test]
async fn unlimited_length_returns_every_filtered_row() {
    let conn = MockConnection::new();
    conn.push(count(5))
        .push(count(5))
        .push(MockResponse::rows(users(5)));
    let endpoint = TabularEndpoint::new(&conn);

    let page = endpoint
        .paginated(&users_query(), &TabularRequest::new())
        .await
        .unwrap();

    assert_eq!(page.draw, 1);
    assert_eq!(page.records_total, 5);
    assert_eq!(page.records_filtered, 5);
    assert_eq!(page.data.len() as i64, page.records_filtered);

    let statements = conn.statements();
    assert_eq!(statements[0], "SELECT COUNT(*) FROM users");
    assert_eq!(statements[1], "SELECT COUNT(*) FROM users");
    assert_eq!(
        statements[2],
        "SELECT id, name, created_at FROM users ORDER BY id ASC"
    );
}

#[tokio::test]
async fn page_length_binds_limit_and_offset() {
    let conn = MockConnection::new();
    conn.push(count(5))
        .push(count(5))
        .push(MockResponse::rows(users(2)));
    let endpoint = TabularEndpoint::new(&conn);
    let request = TabularRequest::new().page(0, 2);

    let page = endpoint.paginated(&users_query(), &request).await.unwrap();
    assert_eq!(page.data.len(), 2);

    let (sql, params) = conn.calls().pop().unwrap();
    assert_eq!(
        sql,
        "SELECT id, name, created_at FROM users ORDER BY id ASC LIMIT $1 OFFSET $2"
    );
    assert_eq!(params, vec![Value::Int(2), Value::Int(0)]);
}

#[test]
fn out_of_range_order_falls_back_to_primary_key() {
    let config = TabularConfig::default();
    let query = users_query().primary_key("user_id");
    let request = TabularRequest::new().order(9, SortDir::Desc).order(-1, SortDir::Asc);
    assert_eq!(
        query.data_sql(&request, &config).to_sql(),
        "SELECT id, name, created_at FROM users ORDER BY user_id ASC"
    );
}

#[test]
fn order_strips_alias_and_casts_datetime_columns() {
    let config = TabularConfig::new().datetime_column("u.created_at");
    let query = TabularQuery::new("users u").columns([
        "u.id",
        "u.name AS user_name",
        "u.created_at AS joined",
    ]);
    let request = TabularRequest::new()
        .order(2, SortDir::Desc)
        .order(1, SortDir::Asc);
    assert_eq!(
        query.data_sql(&request, &config).to_sql(),
        "SELECT u.id, u.name AS user_name, u.created_at AS joined FROM users u \
         ORDER BY CAST(u.created_at AS TIMESTAMP) DESC, u.name ASC"
    );
}

#[test]
fn direction_is_desc_only_when_requested() {
    let config = TabularConfig::default().datetime_cast("DATE");
    let query = users_query();
    let mut request = TabularRequest::new();
    request.order = vec![
        OrderSpec {
            column: 1,
            dir: "DESC".to_string(),
        },
        OrderSpec {
            column: 0,
            dir: "sideways".to_string(),
        },
    ];
    assert!(
        query
            .data_sql(&request, &config)
            .to_sql()
            .ends_with("ORDER BY name DESC, id ASC")
    );
}

#[test]
fn search_covers_plain_columns_and_escapes_wildcards() {
    let config = TabularConfig::default();
    let query = TabularQuery::new("users").columns(["id", "name AS label", "COUNT(x) AS n"]);
    let request = TabularRequest::new().search(" 50%_off ");

    let sql = query.filtered_sql(&request);
    assert_eq!(
        sql.to_sql(),
        "SELECT COUNT(*) FROM users WHERE (CAST(id AS TEXT) LIKE $1 OR CAST(name AS TEXT) LIKE $2)"
    );
    assert_eq!(sql.params()[0], Value::from("%50\\%\\_off%"));
    assert_eq!(sql.params().len(), 2);

    let data = query.data_sql(&request, &config);
    assert!(data.to_sql().contains("WHERE (CAST(id AS TEXT) LIKE $1"));
}

#[test]
fn blank_search_adds_nothing() {
    let query = users_query();
    let request = TabularRequest::new().search("   ");
    assert_eq!(query.filtered_sql(&request).to_sql(), "SELECT COUNT(*) FROM users");
}

#[test]
fn where_order_is_filters_search_then_condition() {
    let query = users_query()
        .join("LEFT JOIN roles r ON r.id = users.role_id")
        .condition("users.deleted_at IS NULL OR users.keep");
    let request = TabularRequest::new()
        .filter("status", "A")
        .filter("r.kind", Value::Null)
        .search("ann");

    let sql = query.filtered_sql(&request);
    assert_eq!(
        sql.to_sql(),
        "SELECT COUNT(*) FROM users LEFT JOIN roles r ON r.id = users.role_id \
         WHERE status = $1 AND r.kind IS NULL \
         AND (CAST(id AS TEXT) LIKE $2 OR CAST(name AS TEXT) LIKE $3 OR CAST(created_at AS TEXT) LIKE $4) \
         AND (users.deleted_at IS NULL OR users.keep)"
    );
    assert_eq!(sql.params()[0], Value::from("A"));

    // Total ignores request filters.
    assert_eq!(
        query.total_sql().to_sql(),
        "SELECT COUNT(*) FROM users LEFT JOIN roles r ON r.id = users.role_id"
    );
}

#[test]
fn condition_with_bindings_numbers_after_filters() {
    let condition = Sql::template("tenant_id = ?", [Value::from(7)]).unwrap();
    let query = users_query().condition_sql(condition);
    let request = TabularRequest::new().filter("status", "A");
    let sql = query.filtered_sql(&request);
    assert_eq!(
        sql.to_sql(),
        "SELECT COUNT(*) FROM users WHERE status = $1 AND (tenant_id = $2)"
    );
    assert_eq!(sql.params(), &[Value::from("A"), Value::from(7)]);
}

#[tokio::test]
async fn grouped_total_equals_filtered() {
    let conn = MockConnection::new();
    conn.push(count(3)).push(MockResponse::rows(Vec::new()));
    let endpoint = TabularEndpoint::new(&conn);
    let query = TabularQuery::new("orders")
        .columns(["customer_id", "SUM(total) AS total"])
        .primary_key("customer_id")
        .group_by("customer_id")
        .having("SUM(total) > 100");

    let page = endpoint
        .paginated(&query, &TabularRequest::new().search("42"))
        .await
        .unwrap();
    assert_eq!(page.records_total, 3);
    assert_eq!(page.records_filtered, 3);

    let statements = conn.statements();
    assert_eq!(statements.len(), 2);
    assert_eq!(
        statements[0],
        "SELECT COUNT(*) FROM (SELECT customer_id, SUM(total) AS total FROM orders \
         WHERE (CAST(customer_id AS TEXT) LIKE $1) \
         GROUP BY customer_id HAVING SUM(total) > 100) AS grouped"
    );
    assert_eq!(
        statements[1],
        "SELECT customer_id, SUM(total) AS total FROM orders \
         WHERE (CAST(customer_id AS TEXT) LIKE $1) \
         GROUP BY customer_id HAVING SUM(total) > 100 ORDER BY customer_id ASC"
    );
}

#[tokio::test]
async fn invalid_requests_are_rejected_before_any_statement() {
    let conn = MockConnection::new();
    let endpoint = TabularEndpoint::new(&conn);

    let err = endpoint
        .paginated(&users_query(), &TabularRequest::new().page(-1, 10))
        .await
        .unwrap_err();
    assert!(err.is_validation());

    let err = endpoint
        .paginated(&users_query(), &TabularRequest::new().page(0, -2))
        .await
        .unwrap_err();
    assert!(err.is_validation());

    let err = endpoint
        .paginated(
            &users_query(),
            &TabularRequest::new().filter("1=1 OR status", "A"),
        )
        .await
        .unwrap_err();
    assert!(err.is_validation());

    assert!(conn.statements().is_empty());
}

#[tokio::test]
async fn counts_propagate_faults() {
    let conn = MockConnection::new();
    conn.push(MockResponse::fail("relation \"users\" does not exist"));
    let endpoint = TabularEndpoint::new(&conn);
    let err = endpoint
        .paginated(&users_query(), &TabularRequest::new())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("does not exist"));
}

#[test]
fn response_uses_protocol_field_names() {
    let response = TabularResponse {
        draw: 4,
        records_total: 10,
        records_filtered: 1,
        data: vec![record! { "id" => 1, "name" => "ann" }],
    };
    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        serde_json::json!({
            "draw": 4,
            "recordsTotal": 10,
            "recordsFiltered": 1,
            "data": [{"id": 1, "name": "ann"}]
        })
    );
}

// ==================== Requests ====================

#[test]
fn request_from_bracket_query_string() {
    let request = TabularRequest::from_query(
        "?draw=3&columns%5B0%5D%5Bdata%5D=0&start=20&length=10\
         &search%5Bvalue%5D=ann+lee&search%5Bregex%5D=false\
         &order[1][column]=0&order[1][dir]=asc&order[0][column]=2&order[0][dir]=desc\
         &where[status]=A&_=1700000000",
    )
    .unwrap();

    assert_eq!(request.draw, 3);
    assert_eq!(request.start, 20);
    assert_eq!(request.length, 10);
    assert_eq!(request.search.value, "ann lee");
    assert_eq!(
        request.order,
        vec![OrderSpec::new(2, SortDir::Desc), OrderSpec::new(0, SortDir::Asc)]
    );
    assert_eq!(request.filters.get("status"), Some(&Value::from("A")));
}

#[test]
fn request_defaults_when_absent() {
    let request = TabularRequest::from_query("").unwrap();
    assert_eq!(request, TabularRequest::default());
    assert_eq!((request.draw, request.start, request.length), (1, 0, -1));
}

#[test]
fn request_rejects_non_numeric_paging() {
    let err = TabularRequest::from_query("start=abc").unwrap_err();
    assert!(err.is_validation());
}

#[test]
fn filters_render_in_request_order() {
    let request = TabularRequest::from_query("where[zeta]=1&where[alpha]=2").unwrap();
    assert_eq!(
        users_query().filtered_sql(&request).to_sql(),
        "SELECT COUNT(*) FROM users WHERE zeta = $1 AND alpha = $2"
    );

    let request: TabularRequest =
        serde_json::from_str(r#"{"where": {"zeta": 1, "alpha": null}}"#).unwrap();
    let columns: Vec<&str> = request.filters.column_names().collect();
    assert_eq!(columns, vec!["zeta", "alpha"]);
}

#[test]
fn unreadable_draw_and_order_column_fall_back() {
    let request = TabularRequest::from_query(
        "draw=abc&order[0][column]=name&order[0][dir]=desc&order[1][column]=2",
    )
    .unwrap();
    assert_eq!(request.draw, 1);
    assert_eq!(request.order, vec![OrderSpec::new(2, SortDir::Asc)]);

    let request: TabularRequest = serde_json::from_value(serde_json::json!({
        "draw": "x7",
        "order": [{"column": "name", "dir": "desc"}, {"column": 1, "dir": "desc"}]
    }))
    .unwrap();
    assert_eq!(request.draw, 1);
    assert_eq!(request.order, vec![OrderSpec::new(1, SortDir::Desc)]);
}

#[test]
fn request_json_accepts_numeric_strings() {
    let request: TabularRequest = serde_json::from_value(serde_json::json!({
        "draw": "2",
        "start": 10,
        "length": "25",
        "search": {"value": "x"},
        "order": [{"column": "1", "dir": "desc"}],
        "where": {"status": "A", "level": 3}
    }))
    .unwrap();
    assert_eq!(request.draw, 2);
    assert_eq!(request.length, 25);
    assert_eq!(request.order[0].column, 1);
    assert_eq!(request.order[0].direction(), SortDir::Desc);
    assert_eq!(request.filters.get("level"), Some(&Value::Int(3)));
}

// ==================== Typeahead ====================

#[tokio::test]
async fn typeahead_renders_joins_condition_and_default_limit() {
    let conn = MockConnection::new();
    conn.push(MockResponse::rows(vec![
        record! { "id" => 1, "text" => "Ann" },
        record! { "id" => 2, "text" => "Anna" },
    ]));
    let endpoint = TabularEndpoint::new(&conn);
    let query = TypeaheadQuery::new("users u", "u.id", "u.name")
        .join(JoinKind::Left, "roles r", "r.id = u.role_id")
        .condition("r.kind = 'staff'");

    let response = endpoint.typeahead(&query, &TypeaheadRequest::new("ann")).await;
    assert!(!response.is_error());
    assert_eq!(response.results().len(), 2);
    assert_eq!(response.results()[1].text, Value::from("Anna"));

    let (sql, params) = conn.calls().pop().unwrap();
    assert_eq!(
        sql,
        "SELECT u.id AS id, u.name AS text FROM users u LEFT JOIN roles r ON r.id = u.role_id \
         WHERE CAST(u.name AS TEXT) LIKE $1 AND (r.kind = 'staff') LIMIT $2"
    );
    assert_eq!(params, vec![Value::from("%ann%"), Value::Int(10)]);
}

#[tokio::test]
async fn typeahead_limit_from_request_or_config() {
    let conn = MockConnection::new();
    let endpoint = TabularEndpoint::with_config(&conn, TabularConfig::new().typeahead_limit(25));
    let query = TypeaheadQuery::new("tags", "id", "label");

    endpoint
        .typeahead(&query, &TypeaheadRequest::from_query("q=rust&limit=5"))
        .await;
    endpoint
        .typeahead(&query, &TypeaheadRequest::from_query("q=rust&limit=oops"))
        .await;

    let calls = conn.calls();
    assert_eq!(calls[0].1[1], Value::Int(5));
    assert_eq!(calls[1].1[1], Value::Int(25));
}

#[tokio::test]
async fn typeahead_fault_becomes_error_shape() {
    let conn = MockConnection::new();
    conn.push(MockResponse::fail("column \"nmae\" does not exist"));
    let endpoint = TabularEndpoint::new(&conn);
    let query = TypeaheadQuery::new("users", "id", "nmae");

    let response = endpoint.typeahead(&query, &TypeaheadRequest::new("a")).await;
    assert!(response.is_error());
    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        serde_json::json!({"error": "column \"nmae\" does not exist"})
    );
}

#[test]
fn typeahead_results_serialize_as_results_object() {
    let response = TypeaheadResponse::Results {
        results: vec![TypeaheadItem {
            id: Value::Int(7),
            text: Value::from("Seven"),
        }],
    };
    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        serde_json::json!({"results": [{"id": 7, "text": "Seven"}]})
    );
}

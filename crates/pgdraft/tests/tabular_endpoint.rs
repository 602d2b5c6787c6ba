//! Tabular and typeahead endpoints against a live PostgreSQL.
//!
//! Runs when `DATABASE_URL` is set; skipped otherwise.

use pgdraft::{
    Connection, DraftResult, JoinKind, PgConnection, SortDir, TabularConfig, TabularEndpoint,
    TabularQuery, TabularRequest, TypeaheadQuery, TypeaheadRequest, Value,
};

async fn try_connect() -> Option<PgConnection> {
    let _ = dotenvy::dotenv();
    let database_url = std::env::var("DATABASE_URL").ok()?;
    let conn = PgConnection::connect(&database_url)
        .await
        .expect("Failed to connect to DATABASE_URL with NoTls");
    Some(conn)
}

async fn seed(conn: &PgConnection) -> DraftResult<()> {
    conn.execute(
        "CREATE TEMP TABLE staff (id SERIAL PRIMARY KEY, name TEXT NOT NULL, dept TEXT NOT NULL, \
         hired_on TEXT NOT NULL, team_id INT)",
        &[],
    )
    .await?;
    conn.execute("CREATE TEMP TABLE teams (id INT PRIMARY KEY, title TEXT)", &[])
        .await?;
    conn.execute("INSERT INTO teams VALUES (1, 'core'), (2, 'web')", &[])
        .await?;
    conn.execute(
        "INSERT INTO staff (name, dept, hired_on, team_id) VALUES \
         ('Ann', 'eng', '2021-03-01', 1), \
         ('Bob', 'eng', '2019-11-20', 1), \
         ('Cleo', 'ops', '2023-01-15', 2), \
         ('Dan', 'ops', '2020-06-30', NULL), \
         ('Eve 100%', 'sales', '2022-08-08', 2)",
        &[],
    )
    .await?;
    Ok(())
}

fn staff() -> TabularQuery {
    TabularQuery::new("staff").columns(["id", "name", "dept", "hired_on"])
}

#[tokio::test]
async fn paginates_sorts_and_filters() -> DraftResult<()> {
    let Some(conn) = try_connect().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return Ok(());
    };
    seed(&conn).await?;
    let config = TabularConfig::new().datetime_column("hired_on");
    let endpoint = TabularEndpoint::with_config(&conn, config);

    let all = endpoint.paginated(&staff(), &TabularRequest::new()).await?;
    assert_eq!(all.records_total, 5);
    assert_eq!(all.records_filtered, 5);
    assert_eq!(all.data.len(), 5);

    let page = endpoint
        .paginated(&staff(), &TabularRequest::new().page(0, 2).order(3, SortDir::Desc))
        .await?;
    assert_eq!(page.data.len(), 2);
    assert_eq!(page.data[0].get("name"), Some(&Value::from("Cleo")));
    assert_eq!(page.data[1].get("name"), Some(&Value::from("Eve 100%")));

    let filtered = endpoint
        .paginated(&staff(), &TabularRequest::new().filter("dept", "ops"))
        .await?;
    assert_eq!(filtered.records_total, 5);
    assert_eq!(filtered.records_filtered, 2);

    // `%` in the term is literal.
    let searched = endpoint
        .paginated(&staff(), &TabularRequest::new().search("100%"))
        .await?;
    assert_eq!(searched.records_filtered, 1);
    Ok(())
}

#[tokio::test]
async fn grouped_counts_collapse() -> DraftResult<()> {
    let Some(conn) = try_connect().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return Ok(());
    };
    seed(&conn).await?;
    let endpoint = TabularEndpoint::new(&conn);
    let query = TabularQuery::new("staff")
        .columns(["dept", "COUNT(*) AS headcount"])
        .primary_key("dept")
        .group_by("dept");

    let page = endpoint.paginated(&query, &TabularRequest::new()).await?;
    assert_eq!(page.records_total, 3);
    assert_eq!(page.records_filtered, 3);
    assert_eq!(page.data[0].get("dept"), Some(&Value::from("eng")));
    assert_eq!(page.data[0].get("headcount"), Some(&Value::Int(2)));
    Ok(())
}

#[tokio::test]
async fn typeahead_results_and_errors() -> DraftResult<()> {
    let Some(conn) = try_connect().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return Ok(());
    };
    seed(&conn).await?;
    let endpoint = TabularEndpoint::new(&conn);

    let query = TypeaheadQuery::new("staff s", "s.id", "s.name")
        .join(JoinKind::Inner, "teams t", "t.id = s.team_id")
        .condition("t.title = 'core'");
    let response = endpoint
        .typeahead(&query, &TypeaheadRequest::from_query("q=n&limit=5"))
        .await;
    let names: Vec<&Value> = response.results().iter().map(|item| &item.text).collect();
    assert_eq!(names, vec![&Value::from("Ann")]);

    let broken = TypeaheadQuery::new("staff", "id", "no_such_column");
    let response = endpoint.typeahead(&broken, &TypeaheadRequest::new("a")).await;
    assert!(response.is_error());
    Ok(())
}

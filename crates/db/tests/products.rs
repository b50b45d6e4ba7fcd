use sqlx::PgPool;
use stockpile_core::csv::ProductRow;
use stockpile_db::models::product::ProductFilter;
use stockpile_db::repositories::ProductRepo;

fn row(name: &str, sku: &str, description: Option<&str>) -> ProductRow {
    ProductRow {
        name: name.to_string(),
        sku: stockpile_core::sku::trim_sku(sku),
        sku_normalized: stockpile_core::sku::normalize_sku(sku),
        description: description.map(String::from),
        active: true,
    }
}

#[sqlx::test(migrations = "./migrations")]
async fn upsert_batch_inserts_and_overwrites_by_normalized_sku(pool: PgPool) {
    ProductRepo::upsert_batch(&pool, &[row("Widget", "SKU-1", Some("Example"))])
        .await
        .unwrap();

    let first = ProductRepo::find_by_normalized_sku(&pool, "sku-1")
        .await
        .unwrap()
        .expect("product should exist");
    assert_eq!(first.name, "Widget");
    assert_eq!(first.sku, "SKU-1");

    // Re-import with different casing: same row, updated fields, same id.
    ProductRepo::upsert_batch(&pool, &[row("New Widget", "sku-1", Some("New desc"))])
        .await
        .unwrap();

    let second = ProductRepo::find_by_normalized_sku(&pool, "sku-1")
        .await
        .unwrap()
        .expect("product should still exist");
    assert_eq!(second.id, first.id, "upsert must not change identity");
    assert_eq!(second.name, "New Widget");
    assert_eq!(second.description.as_deref(), Some("New desc"));
    assert!(second.updated_at >= first.updated_at);

    let (_, total) = ProductRepo::list(&pool, &ProductFilter::default(), 25, 0)
        .await
        .unwrap();
    assert_eq!(total, 1, "no duplicate rows after re-import");
}

#[sqlx::test(migrations = "./migrations")]
async fn upsert_batch_is_idempotent(pool: PgPool) {
    let rows = vec![
        row("Widget", "SKU-1", Some("Example")),
        row("Gadget", "SKU-2", None),
    ];
    ProductRepo::upsert_batch(&pool, &rows).await.unwrap();
    ProductRepo::upsert_batch(&pool, &rows).await.unwrap();

    let (items, total) = ProductRepo::list(&pool, &ProductFilter::default(), 25, 0)
        .await
        .unwrap();
    assert_eq!(total, 2);
    let mut skus: Vec<String> = items.into_iter().map(|p| p.sku_normalized).collect();
    skus.sort();
    assert_eq!(skus, vec!["sku-1", "sku-2"]);
}

#[sqlx::test(migrations = "./migrations")]
async fn existing_normalized_skus_classifies_created_vs_updated(pool: PgPool) {
    ProductRepo::upsert_batch(&pool, &[row("Widget", "SKU-1", None)])
        .await
        .unwrap();

    let existing = ProductRepo::existing_normalized_skus(
        &pool,
        &["sku-1".to_string(), "sku-2".to_string()],
    )
    .await
    .unwrap();
    assert_eq!(existing, vec!["sku-1".to_string()]);
}

#[sqlx::test(migrations = "./migrations")]
async fn list_filters_by_normalized_sku_and_name(pool: PgPool) {
    ProductRepo::upsert_batch(
        &pool,
        &[
            row("Widget", "SKU-1", Some("A widget")),
            row("Gadget", "SKU-2", Some("A gadget")),
        ],
    )
    .await
    .unwrap();

    // SKU filter is case-insensitive exact match on the normalized key.
    let filter = ProductFilter {
        sku: Some(" SKU-1 ".to_string()),
        ..Default::default()
    };
    let (items, total) = ProductRepo::list(&pool, &filter, 25, 0).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(items[0].sku_normalized, "sku-1");

    // Name filter is a case-insensitive contains.
    let filter = ProductFilter {
        name: Some("gadg".to_string()),
        ..Default::default()
    };
    let (items, total) = ProductRepo::list(&pool, &filter, 25, 0).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(items[0].name, "Gadget");
}

#[sqlx::test(migrations = "./migrations")]
async fn delete_all_returns_deleted_count(pool: PgPool) {
    assert_eq!(ProductRepo::delete_all(&pool).await.unwrap(), 0);

    ProductRepo::upsert_batch(
        &pool,
        &[row("Widget", "SKU-1", None), row("Gadget", "SKU-2", None)],
    )
    .await
    .unwrap();
    assert_eq!(ProductRepo::delete_all(&pool).await.unwrap(), 2);
    assert_eq!(ProductRepo::delete_all(&pool).await.unwrap(), 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn update_moves_sku_pair_together(pool: PgPool) {
    let product = ProductRepo::insert(&pool, "Widget", "SKU-1", "sku-1", None, true)
        .await
        .unwrap();

    let updated = ProductRepo::update(
        &pool,
        product.id,
        None,
        Some(("SKU-9", "sku-9")),
        None,
        None,
    )
    .await
    .unwrap()
    .expect("product should exist");

    assert_eq!(updated.sku, "SKU-9");
    assert_eq!(updated.sku_normalized, "sku-9");
    assert_eq!(updated.name, "Widget");
}

// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use smeta_app::{CatalogWorkInput, CategoryInput, WorkCategoryId};
use smeta_db::{Store, validate_db_path};
use smeta_testkit::temp_db_path;

fn work_input(name: &str, category_id: WorkCategoryId) -> CatalogWorkInput {
    CatalogWorkInput {
        name: name.to_owned(),
        unit: "m2".to_owned(),
        price_kopecks: 45_000,
        category_id,
        keywords: String::new(),
    }
}

#[test]
fn validate_db_path_rejects_uri_forms() {
    assert!(validate_db_path("file:test.db").is_err());
    assert!(validate_db_path("https://example.com/db.sqlite").is_err());
    assert!(validate_db_path("db.sqlite?mode=ro").is_err());
    assert!(validate_db_path("/tmp/smeta.db").is_ok());
}

#[test]
fn bootstrap_creates_schema_and_seed_defaults() -> Result<()> {
    let store = Store::open_memory()?;
    store.bootstrap()?;

    let work_categories = store.list_work_categories()?;
    let material_categories = store.list_material_categories()?;

    assert!(!work_categories.is_empty());
    assert!(!material_categories.is_empty());
    assert!(
        work_categories.iter().any(|c| c.name == "Plastering"),
        "expected default work category"
    );
    assert!(
        material_categories.iter().any(|c| c.name == "Tile"),
        "expected default material category"
    );
    Ok(())
}

#[test]
fn bootstrap_rejects_schema_missing_required_column() -> Result<()> {
    let store = Store::open_memory()?;
    store.bootstrap()?;

    store.raw_connection().execute_batch(
        "
            ALTER TABLE works RENAME TO works_old;
            CREATE TABLE works (
              id INTEGER PRIMARY KEY,
              name TEXT NOT NULL,
              unit TEXT NOT NULL DEFAULT '',
              category_id INTEGER NOT NULL,
              keywords TEXT NOT NULL DEFAULT '',
              created_at TEXT NOT NULL,
              updated_at TEXT NOT NULL
            );
            DROP TABLE works_old;
            ",
    )?;

    let err = store
        .bootstrap()
        .expect_err("schema validation should fail");
    let message = err.to_string();
    assert!(message.contains("table `works` is missing required columns"));
    assert!(message.contains("price_kopecks"));
    Ok(())
}

#[test]
fn opening_the_memory_path_bootstraps_and_seeds() -> Result<()> {
    let store = Store::open(std::path::Path::new(":memory:"))?;
    store.bootstrap()?;
    store.seed_demo_data()?;

    let works = store.list_works()?;
    assert!(works.iter().any(|work| work.name == "Tile laying"));
    Ok(())
}

#[test]
fn bootstrap_survives_reopening_a_file_database() -> Result<()> {
    let (_dir, db_path) = temp_db_path()?;

    {
        let store = Store::open(&db_path)?;
        store.bootstrap()?;
        let category_id = store.list_work_categories()?[0].id;
        store.create_work(&work_input("Wall plastering", category_id))?;
    }

    let store = Store::open(&db_path)?;
    store.bootstrap()?;
    let works = store.list_works()?;
    assert_eq!(works.len(), 1);
    assert_eq!(works[0].name, "Wall plastering");
    Ok(())
}

#[test]
fn work_crud_round_trip() -> Result<()> {
    let store = Store::open_memory()?;
    store.bootstrap()?;

    let categories = store.list_work_categories()?;
    let category_id = categories[0].id;
    let other_category_id = categories[1].id;

    let work_id = store.create_work(&work_input("Wall plastering", category_id))?;
    let work = store.get_work(work_id)?.expect("created work exists");
    assert_eq!(work.name, "Wall plastering");
    assert_eq!(work.price_kopecks, 45_000);
    assert_eq!(work.category_id, category_id);

    store.rename_work(work_id, "Wall plastering improved")?;
    store.set_work_price(work_id, 52_000)?;
    store.set_work_unit(work_id, "m")?;
    store.set_work_category(work_id, other_category_id)?;

    let work = store.get_work(work_id)?.expect("updated work exists");
    assert_eq!(work.name, "Wall plastering improved");
    assert_eq!(work.price_kopecks, 52_000);
    assert_eq!(work.unit, "m");
    assert_eq!(work.category_id, other_category_id);

    store.delete_work(work_id)?;
    assert!(store.get_work(work_id)?.is_none());
    assert!(store.delete_work(work_id).is_err());
    Ok(())
}

#[test]
fn create_work_requires_existing_category() -> Result<()> {
    let store = Store::open_memory()?;
    store.bootstrap()?;

    let err = store
        .create_work(&work_input("Orphan", WorkCategoryId::new(9_999)))
        .expect_err("missing category should be rejected");
    assert!(err.to_string().contains("category"));
    Ok(())
}

#[test]
fn search_matches_names_and_keywords_case_insensitively() -> Result<()> {
    let store = Store::open_memory()?;
    store.bootstrap()?;
    store.seed_demo_data()?;

    let by_name = store.search_works("TILE")?;
    assert!(by_name.iter().any(|work| work.name == "Tile laying"));

    let by_keyword = store.search_materials("adhesive")?;
    assert!(
        by_keyword
            .iter()
            .any(|material| material.name == "Tile adhesive 25kg")
    );

    assert!(store.search_works("no such entry")?.is_empty());

    let all = store.search_works("")?;
    assert_eq!(all.len(), store.list_works()?.len());
    Ok(())
}

#[test]
fn listing_by_category_filters_rows() -> Result<()> {
    let store = Store::open_memory()?;
    store.bootstrap()?;
    store.seed_demo_data()?;

    let tiling = store
        .list_work_categories()?
        .into_iter()
        .find(|category| category.name == "Tiling")
        .expect("default tiling category");
    let works = store.list_works_by_category(tiling.id)?;
    assert_eq!(works.len(), 1);
    assert_eq!(works[0].name, "Tile laying");
    Ok(())
}

#[test]
fn deleting_a_category_removes_its_rows() -> Result<()> {
    let store = Store::open_memory()?;
    store.bootstrap()?;
    store.seed_demo_data()?;

    let painting = store
        .list_work_categories()?
        .into_iter()
        .find(|category| category.name == "Painting")
        .expect("default painting category");
    let before = store.list_works()?.len();
    let in_category = store.list_works_by_category(painting.id)?.len();
    assert!(in_category > 0);

    store.delete_work_category(painting.id)?;

    assert_eq!(store.list_works()?.len(), before - in_category);
    assert!(
        store
            .list_work_categories()?
            .iter()
            .all(|category| category.name != "Painting")
    );
    Ok(())
}

#[test]
fn category_crud_round_trip() -> Result<()> {
    let store = Store::open_memory()?;
    store.bootstrap()?;

    let category_id = store.create_work_category(&CategoryInput {
        name: "Masonry".to_owned(),
    })?;
    assert!(
        store
            .list_work_categories()?
            .iter()
            .any(|category| category.id == category_id)
    );

    store.rename_work_category(category_id, "Brick masonry")?;
    assert!(
        store
            .list_work_categories()?
            .iter()
            .any(|category| category.name == "Brick masonry")
    );

    let err = store
        .create_work_category(&CategoryInput {
            name: "  ".to_owned(),
        })
        .expect_err("blank category name should be rejected");
    assert!(err.to_string().contains("name is required"));
    Ok(())
}

#[test]
fn demo_seed_is_idempotent() -> Result<()> {
    let store = Store::open_memory()?;
    store.bootstrap()?;

    store.seed_demo_data()?;
    let works = store.list_works()?.len();
    let materials = store.list_materials()?.len();

    store.seed_demo_data()?;
    assert_eq!(store.list_works()?.len(), works);
    assert_eq!(store.list_materials()?.len(), materials);
    Ok(())
}

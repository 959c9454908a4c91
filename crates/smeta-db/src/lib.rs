// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use rusqlite::{Connection, OptionalExtension, params};
use smeta_app::{
    CatalogMaterial, CatalogMaterialInput, CatalogWork, CatalogWorkInput, CategoryInput,
    MaterialCategory, MaterialCategoryId, MaterialId, WorkCategory, WorkCategoryId, WorkId,
};
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

pub const APP_NAME: &str = "smeta";

const DEFAULT_WORK_CATEGORIES: [&str; 8] = [
    "Demolition",
    "Electrical",
    "Finishing",
    "Flooring",
    "Painting",
    "Plastering",
    "Plumbing",
    "Tiling",
];

const DEFAULT_MATERIAL_CATEGORIES: [&str; 8] = [
    "Adhesives",
    "Electrical",
    "Flooring",
    "Paint",
    "Plaster",
    "Plumbing",
    "Tile",
    "Timber",
];

const DEMO_WORKS: [(&str, &str, i64, &str, &str); 8] = [
    ("Partition demolition", "m2", 28_000, "Demolition", "teardown"),
    ("Socket installation", "pc", 25_000, "Electrical", "outlet socket"),
    ("Wallpaper hanging", "m2", 35_000, "Finishing", "wallpaper"),
    ("Laminate flooring", "m2", 40_000, "Flooring", "laminate floor"),
    ("Ceiling painting", "m2", 30_000, "Painting", "paint ceiling"),
    ("Wall plastering", "m2", 45_000, "Plastering", "plaster leveling"),
    ("Radiator replacement", "pc", 350_000, "Plumbing", "radiator heating"),
    ("Tile laying", "m2", 120_000, "Tiling", "tile floor wall"),
];

const DEMO_MATERIALS: [(&str, &str, i64, &str, &str); 8] = [
    ("Tile adhesive 25kg", "bag", 65_000, "Adhesives", "glue adhesive"),
    ("Cable VVG 3x2.5", "m", 9_500, "Electrical", "cable wire"),
    ("Laminate plank oak", "m2", 78_000, "Flooring", "laminate oak"),
    ("Acrylic paint 9L", "can", 380_000, "Paint", "paint acrylic"),
    ("Gypsum plaster 30kg", "bag", 42_000, "Plaster", "plaster gypsum"),
    ("PP pipe 20mm", "m", 4_500, "Plumbing", "pipe polypropylene"),
    ("Ceramic tile 60x60", "m2", 95_000, "Tile", "tile ceramic"),
    ("Primer 10L", "can", 120_000, "Paint", "primer prep"),
];

const REQUIRED_SCHEMA: &[(&str, &[&str])] = &[
    (
        "work_categories",
        &["id", "name", "created_at", "updated_at"],
    ),
    (
        "material_categories",
        &["id", "name", "created_at", "updated_at"],
    ),
    (
        "works",
        &[
            "id",
            "name",
            "unit",
            "price_kopecks",
            "category_id",
            "keywords",
            "created_at",
            "updated_at",
        ],
    ),
    (
        "materials",
        &[
            "id",
            "name",
            "unit",
            "price_kopecks",
            "category_id",
            "keywords",
            "created_at",
            "updated_at",
        ],
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RequiredIndex {
    name: &'static str,
    create_sql: &'static str,
}

const REQUIRED_INDEXES: &[RequiredIndex] = &[
    RequiredIndex {
        name: "idx_work_categories_name",
        create_sql: "CREATE UNIQUE INDEX IF NOT EXISTS idx_work_categories_name ON work_categories (name);",
    },
    RequiredIndex {
        name: "idx_material_categories_name",
        create_sql: "CREATE UNIQUE INDEX IF NOT EXISTS idx_material_categories_name ON material_categories (name);",
    },
    RequiredIndex {
        name: "idx_works_category_id",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_works_category_id ON works (category_id);",
    },
    RequiredIndex {
        name: "idx_works_name",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_works_name ON works (name);",
    },
    RequiredIndex {
        name: "idx_materials_category_id",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_materials_category_id ON materials (category_id);",
    },
    RequiredIndex {
        name: "idx_materials_name",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_materials_name ON materials (name);",
    },
];

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let printable = path.to_string_lossy().to_string();
        validate_db_path(&printable)?;
        let conn = Connection::open(path)
            .with_context(|| format!("open database at {}", path.display()))?;
        configure_connection(&conn)?;
        // `:memory:` opens an in-memory database; there is no file to chmod.
        if printable != ":memory:" {
            set_private_permissions(path)?;
        }
        Ok(Self { conn })
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory database")?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn raw_connection(&self) -> &Connection {
        &self.conn
    }

    pub fn bootstrap(&self) -> Result<()> {
        if has_user_tables(&self.conn)? {
            validate_schema(&self.conn)?;
        } else {
            self.conn
                .execute_batch(include_str!("sql/schema.sql"))
                .context("create schema")?;
        }

        ensure_required_indexes(&self.conn)?;

        self.seed_defaults()?;
        Ok(())
    }

    pub fn seed_defaults(&self) -> Result<()> {
        for category in DEFAULT_WORK_CATEGORIES {
            self.conn
                .execute(
                    "INSERT OR IGNORE INTO work_categories (name) VALUES (?)",
                    params![category],
                )
                .with_context(|| format!("insert default work category {category}"))?;
        }

        for category in DEFAULT_MATERIAL_CATEGORIES {
            self.conn
                .execute(
                    "INSERT OR IGNORE INTO material_categories (name) VALUES (?)",
                    params![category],
                )
                .with_context(|| format!("insert default material category {category}"))?;
        }
        Ok(())
    }

    /// Fills the catalog with a small fixed set of priced entries. Meant for
    /// the `--demo` launch mode; idempotent by entry name.
    pub fn seed_demo_data(&self) -> Result<()> {
        for (name, unit, price_kopecks, category, keywords) in DEMO_WORKS {
            if self.find_work_by_name(name)?.is_some() {
                continue;
            }
            let category_id = self
                .find_work_category_by_name(category)?
                .ok_or_else(|| anyhow!("demo work category {category} is missing"))?;
            self.create_work(&CatalogWorkInput {
                name: name.to_owned(),
                unit: unit.to_owned(),
                price_kopecks,
                category_id,
                keywords: keywords.to_owned(),
            })?;
        }

        for (name, unit, price_kopecks, category, keywords) in DEMO_MATERIALS {
            if self.find_material_by_name(name)?.is_some() {
                continue;
            }
            let category_id = self
                .find_material_category_by_name(category)?
                .ok_or_else(|| anyhow!("demo material category {category} is missing"))?;
            self.create_material(&CatalogMaterialInput {
                name: name.to_owned(),
                unit: unit.to_owned(),
                price_kopecks,
                category_id,
                keywords: keywords.to_owned(),
            })?;
        }
        Ok(())
    }

    pub fn list_work_categories(&self) -> Result<Vec<WorkCategory>> {
        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT id, name, created_at, updated_at
                FROM work_categories
                ORDER BY name ASC
                ",
            )
            .context("prepare work categories query")?;
        let rows = stmt
            .query_map([], |row| {
                let created_at_raw: String = row.get(2)?;
                let updated_at_raw: String = row.get(3)?;
                Ok(WorkCategory {
                    id: WorkCategoryId::new(row.get(0)?),
                    name: row.get(1)?,
                    created_at: parse_datetime(&created_at_raw).map_err(to_sql_error)?,
                    updated_at: parse_datetime(&updated_at_raw).map_err(to_sql_error)?,
                })
            })
            .context("query work categories")?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect work categories")
    }

    pub fn list_material_categories(&self) -> Result<Vec<MaterialCategory>> {
        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT id, name, created_at, updated_at
                FROM material_categories
                ORDER BY name ASC
                ",
            )
            .context("prepare material categories query")?;
        let rows = stmt
            .query_map([], |row| {
                let created_at_raw: String = row.get(2)?;
                let updated_at_raw: String = row.get(3)?;
                Ok(MaterialCategory {
                    id: MaterialCategoryId::new(row.get(0)?),
                    name: row.get(1)?,
                    created_at: parse_datetime(&created_at_raw).map_err(to_sql_error)?,
                    updated_at: parse_datetime(&updated_at_raw).map_err(to_sql_error)?,
                })
            })
            .context("query material categories")?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect material categories")
    }

    pub fn create_work_category(&self, category: &CategoryInput) -> Result<WorkCategoryId> {
        category.validate()?;
        self.conn
            .execute(
                "INSERT INTO work_categories (name) VALUES (?)",
                params![category.name.trim()],
            )
            .context("insert work category")?;
        Ok(WorkCategoryId::new(self.conn.last_insert_rowid()))
    }

    pub fn create_material_category(&self, category: &CategoryInput) -> Result<MaterialCategoryId> {
        category.validate()?;
        self.conn
            .execute(
                "INSERT INTO material_categories (name) VALUES (?)",
                params![category.name.trim()],
            )
            .context("insert material category")?;
        Ok(MaterialCategoryId::new(self.conn.last_insert_rowid()))
    }

    pub fn rename_work_category(&self, category_id: WorkCategoryId, name: &str) -> Result<()> {
        if name.trim().is_empty() {
            bail!("category name is required -- enter a name and retry");
        }
        let now = now_rfc3339()?;
        let rows_affected = self
            .conn
            .execute(
                "UPDATE work_categories SET name = ?, updated_at = ? WHERE id = ?",
                params![name.trim(), now, category_id.get()],
            )
            .context("rename work category")?;
        if rows_affected == 0 {
            bail!(
                "work category {} not found -- refresh the catalog and retry",
                category_id.get()
            );
        }
        Ok(())
    }

    pub fn rename_material_category(
        &self,
        category_id: MaterialCategoryId,
        name: &str,
    ) -> Result<()> {
        if name.trim().is_empty() {
            bail!("category name is required -- enter a name and retry");
        }
        let now = now_rfc3339()?;
        let rows_affected = self
            .conn
            .execute(
                "UPDATE material_categories SET name = ?, updated_at = ? WHERE id = ?",
                params![name.trim(), now, category_id.get()],
            )
            .context("rename material category")?;
        if rows_affected == 0 {
            bail!(
                "material category {} not found -- refresh the catalog and retry",
                category_id.get()
            );
        }
        Ok(())
    }

    /// Deletes a work category together with every work filed under it.
    pub fn delete_work_category(&self, category_id: WorkCategoryId) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM works WHERE category_id = ?",
                params![category_id.get()],
            )
            .context("delete works in category")?;
        let rows_affected = self
            .conn
            .execute(
                "DELETE FROM work_categories WHERE id = ?",
                params![category_id.get()],
            )
            .context("delete work category")?;
        if rows_affected == 0 {
            bail!(
                "work category {} not found -- refresh the catalog and retry",
                category_id.get()
            );
        }
        Ok(())
    }

    /// Deletes a material category together with every material filed under it.
    pub fn delete_material_category(&self, category_id: MaterialCategoryId) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM materials WHERE category_id = ?",
                params![category_id.get()],
            )
            .context("delete materials in category")?;
        let rows_affected = self
            .conn
            .execute(
                "DELETE FROM material_categories WHERE id = ?",
                params![category_id.get()],
            )
            .context("delete material category")?;
        if rows_affected == 0 {
            bail!(
                "material category {} not found -- refresh the catalog and retry",
                category_id.get()
            );
        }
        Ok(())
    }

    pub fn list_works(&self) -> Result<Vec<CatalogWork>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "{WORK_SELECT} ORDER BY name ASC, id DESC"
            ))
            .context("prepare works query")?;
        let rows = stmt.query_map([], map_work).context("query works")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect works")
    }

    pub fn list_works_by_category(&self, category_id: WorkCategoryId) -> Result<Vec<CatalogWork>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "{WORK_SELECT} WHERE category_id = ? ORDER BY name ASC, id DESC"
            ))
            .context("prepare works by category query")?;
        let rows = stmt
            .query_map(params![category_id.get()], map_work)
            .context("query works by category")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect works by category")
    }

    /// Case-folded substring search over name and keywords. A blank query
    /// returns the whole catalog.
    pub fn search_works(&self, query: &str) -> Result<Vec<CatalogWork>> {
        if query.trim().is_empty() {
            return self.list_works();
        }
        let mut stmt = self
            .conn
            .prepare(&format!(
                "{WORK_SELECT} WHERE (name LIKE ?1 ESCAPE '\\' OR keywords LIKE ?1 ESCAPE '\\') ORDER BY name ASC, id DESC"
            ))
            .context("prepare works search query")?;
        let rows = stmt
            .query_map(params![like_pattern(query)], map_work)
            .context("search works")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect searched works")
    }

    pub fn get_work(&self, work_id: WorkId) -> Result<Option<CatalogWork>> {
        self.conn
            .query_row(
                &format!("{WORK_SELECT} WHERE id = ?"),
                params![work_id.get()],
                map_work,
            )
            .optional()
            .context("get work")
    }

    pub fn create_work(&self, work: &CatalogWorkInput) -> Result<WorkId> {
        work.validate()?;
        self.require_work_category(work.category_id)?;

        let now = now_rfc3339()?;
        self.conn
            .execute(
                "
                INSERT INTO works (
                  name, unit, price_kopecks, category_id, keywords,
                  created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?)
                ",
                params![
                    work.name.trim(),
                    work.unit.trim(),
                    work.price_kopecks,
                    work.category_id.get(),
                    work.keywords.trim(),
                    now,
                    now,
                ],
            )
            .context("insert work")?;
        Ok(WorkId::new(self.conn.last_insert_rowid()))
    }

    pub fn rename_work(&self, work_id: WorkId, name: &str) -> Result<()> {
        if name.trim().is_empty() {
            bail!("catalog work name is required -- enter a name and retry");
        }
        self.update_work_field(work_id, "name", &name.trim())
    }

    pub fn set_work_price(&self, work_id: WorkId, price_kopecks: i64) -> Result<()> {
        if price_kopecks < 0 {
            bail!("catalog work price cannot be negative");
        }
        self.update_work_field(work_id, "price_kopecks", &price_kopecks)
    }

    pub fn set_work_unit(&self, work_id: WorkId, unit: &str) -> Result<()> {
        if unit.trim().is_empty() {
            bail!("catalog work unit is required -- enter a unit and retry");
        }
        self.update_work_field(work_id, "unit", &unit.trim())
    }

    pub fn set_work_category(&self, work_id: WorkId, category_id: WorkCategoryId) -> Result<()> {
        self.require_work_category(category_id)?;
        self.update_work_field(work_id, "category_id", &category_id.get())
    }

    pub fn delete_work(&self, work_id: WorkId) -> Result<()> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM works WHERE id = ?", params![work_id.get()])
            .context("delete work")?;
        if rows_affected == 0 {
            bail!(
                "catalog work {} not found -- refresh the catalog and retry",
                work_id.get()
            );
        }
        Ok(())
    }

    pub fn list_materials(&self) -> Result<Vec<CatalogMaterial>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "{MATERIAL_SELECT} ORDER BY name ASC, id DESC"
            ))
            .context("prepare materials query")?;
        let rows = stmt.query_map([], map_material).context("query materials")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect materials")
    }

    pub fn list_materials_by_category(
        &self,
        category_id: MaterialCategoryId,
    ) -> Result<Vec<CatalogMaterial>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "{MATERIAL_SELECT} WHERE category_id = ? ORDER BY name ASC, id DESC"
            ))
            .context("prepare materials by category query")?;
        let rows = stmt
            .query_map(params![category_id.get()], map_material)
            .context("query materials by category")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect materials by category")
    }

    pub fn search_materials(&self, query: &str) -> Result<Vec<CatalogMaterial>> {
        if query.trim().is_empty() {
            return self.list_materials();
        }
        let mut stmt = self
            .conn
            .prepare(&format!(
                "{MATERIAL_SELECT} WHERE (name LIKE ?1 ESCAPE '\\' OR keywords LIKE ?1 ESCAPE '\\') ORDER BY name ASC, id DESC"
            ))
            .context("prepare materials search query")?;
        let rows = stmt
            .query_map(params![like_pattern(query)], map_material)
            .context("search materials")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect searched materials")
    }

    pub fn get_material(&self, material_id: MaterialId) -> Result<Option<CatalogMaterial>> {
        self.conn
            .query_row(
                &format!("{MATERIAL_SELECT} WHERE id = ?"),
                params![material_id.get()],
                map_material,
            )
            .optional()
            .context("get material")
    }

    pub fn create_material(&self, material: &CatalogMaterialInput) -> Result<MaterialId> {
        material.validate()?;
        self.require_material_category(material.category_id)?;

        let now = now_rfc3339()?;
        self.conn
            .execute(
                "
                INSERT INTO materials (
                  name, unit, price_kopecks, category_id, keywords,
                  created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?)
                ",
                params![
                    material.name.trim(),
                    material.unit.trim(),
                    material.price_kopecks,
                    material.category_id.get(),
                    material.keywords.trim(),
                    now,
                    now,
                ],
            )
            .context("insert material")?;
        Ok(MaterialId::new(self.conn.last_insert_rowid()))
    }

    pub fn rename_material(&self, material_id: MaterialId, name: &str) -> Result<()> {
        if name.trim().is_empty() {
            bail!("catalog material name is required -- enter a name and retry");
        }
        self.update_material_field(material_id, "name", &name.trim())
    }

    pub fn set_material_price(&self, material_id: MaterialId, price_kopecks: i64) -> Result<()> {
        if price_kopecks < 0 {
            bail!("catalog material price cannot be negative");
        }
        self.update_material_field(material_id, "price_kopecks", &price_kopecks)
    }

    pub fn set_material_unit(&self, material_id: MaterialId, unit: &str) -> Result<()> {
        if unit.trim().is_empty() {
            bail!("catalog material unit is required -- enter a unit and retry");
        }
        self.update_material_field(material_id, "unit", &unit.trim())
    }

    pub fn set_material_category(
        &self,
        material_id: MaterialId,
        category_id: MaterialCategoryId,
    ) -> Result<()> {
        self.require_material_category(category_id)?;
        self.update_material_field(material_id, "category_id", &category_id.get())
    }

    pub fn delete_material(&self, material_id: MaterialId) -> Result<()> {
        let rows_affected = self
            .conn
            .execute(
                "DELETE FROM materials WHERE id = ?",
                params![material_id.get()],
            )
            .context("delete material")?;
        if rows_affected == 0 {
            bail!(
                "catalog material {} not found -- refresh the catalog and retry",
                material_id.get()
            );
        }
        Ok(())
    }

    fn find_work_by_name(&self, name: &str) -> Result<Option<WorkId>> {
        self.conn
            .query_row(
                "SELECT id FROM works WHERE name = ?",
                params![name],
                |row| row.get::<_, i64>(0).map(WorkId::new),
            )
            .optional()
            .context("find work by name")
    }

    fn find_material_by_name(&self, name: &str) -> Result<Option<MaterialId>> {
        self.conn
            .query_row(
                "SELECT id FROM materials WHERE name = ?",
                params![name],
                |row| row.get::<_, i64>(0).map(MaterialId::new),
            )
            .optional()
            .context("find material by name")
    }

    fn find_work_category_by_name(&self, name: &str) -> Result<Option<WorkCategoryId>> {
        self.conn
            .query_row(
                "SELECT id FROM work_categories WHERE name = ?",
                params![name],
                |row| row.get::<_, i64>(0).map(WorkCategoryId::new),
            )
            .optional()
            .context("find work category by name")
    }

    fn find_material_category_by_name(&self, name: &str) -> Result<Option<MaterialCategoryId>> {
        self.conn
            .query_row(
                "SELECT id FROM material_categories WHERE name = ?",
                params![name],
                |row| row.get::<_, i64>(0).map(MaterialCategoryId::new),
            )
            .optional()
            .context("find material category by name")
    }

    fn require_work_category(&self, category_id: WorkCategoryId) -> Result<()> {
        let exists = self
            .conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM work_categories WHERE id = ?)",
                params![category_id.get()],
                |row| row.get::<_, i64>(0),
            )
            .context("check work category existence")?;
        if exists != 1 {
            bail!(
                "work category {} not found -- choose an existing category and retry",
                category_id.get()
            );
        }
        Ok(())
    }

    fn require_material_category(&self, category_id: MaterialCategoryId) -> Result<()> {
        let exists = self
            .conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM material_categories WHERE id = ?)",
                params![category_id.get()],
                |row| row.get::<_, i64>(0),
            )
            .context("check material category existence")?;
        if exists != 1 {
            bail!(
                "material category {} not found -- choose an existing category and retry",
                category_id.get()
            );
        }
        Ok(())
    }

    fn update_work_field(
        &self,
        work_id: WorkId,
        column: &str,
        value: &dyn rusqlite::ToSql,
    ) -> Result<()> {
        let now = now_rfc3339()?;
        let sql = format!("UPDATE works SET {column} = ?1, updated_at = ?2 WHERE id = ?3");
        let rows_affected = self
            .conn
            .execute(&sql, params![value, now, work_id.get()])
            .with_context(|| format!("update work {column}"))?;
        if rows_affected == 0 {
            bail!(
                "catalog work {} not found -- refresh the catalog and retry",
                work_id.get()
            );
        }
        Ok(())
    }

    fn update_material_field(
        &self,
        material_id: MaterialId,
        column: &str,
        value: &dyn rusqlite::ToSql,
    ) -> Result<()> {
        let now = now_rfc3339()?;
        let sql = format!("UPDATE materials SET {column} = ?1, updated_at = ?2 WHERE id = ?3");
        let rows_affected = self
            .conn
            .execute(&sql, params![value, now, material_id.get()])
            .with_context(|| format!("update material {column}"))?;
        if rows_affected == 0 {
            bail!(
                "catalog material {} not found -- refresh the catalog and retry",
                material_id.get()
            );
        }
        Ok(())
    }
}

const WORK_SELECT: &str = "
    SELECT id, name, unit, price_kopecks, category_id, keywords, created_at, updated_at
    FROM works
";

const MATERIAL_SELECT: &str = "
    SELECT id, name, unit, price_kopecks, category_id, keywords, created_at, updated_at
    FROM materials
";

fn map_work(row: &rusqlite::Row<'_>) -> rusqlite::Result<CatalogWork> {
    let created_at_raw: String = row.get(6)?;
    let updated_at_raw: String = row.get(7)?;
    Ok(CatalogWork {
        id: WorkId::new(row.get(0)?),
        name: row.get(1)?,
        unit: row.get(2)?,
        price_kopecks: row.get(3)?,
        category_id: WorkCategoryId::new(row.get(4)?),
        keywords: row.get(5)?,
        created_at: parse_datetime(&created_at_raw).map_err(to_sql_error)?,
        updated_at: parse_datetime(&updated_at_raw).map_err(to_sql_error)?,
    })
}

fn map_material(row: &rusqlite::Row<'_>) -> rusqlite::Result<CatalogMaterial> {
    let created_at_raw: String = row.get(6)?;
    let updated_at_raw: String = row.get(7)?;
    Ok(CatalogMaterial {
        id: MaterialId::new(row.get(0)?),
        name: row.get(1)?,
        unit: row.get(2)?,
        price_kopecks: row.get(3)?,
        category_id: MaterialCategoryId::new(row.get(4)?),
        keywords: row.get(5)?,
        created_at: parse_datetime(&created_at_raw).map_err(to_sql_error)?,
        updated_at: parse_datetime(&updated_at_raw).map_err(to_sql_error)?,
    })
}

fn like_pattern(query: &str) -> String {
    let escaped = query
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

pub fn default_db_path() -> Result<PathBuf> {
    if let Some(override_path) = env::var_os("SMETA_DB_PATH") {
        return Ok(PathBuf::from(override_path));
    }

    let data_root = dirs::data_local_dir().ok_or_else(|| {
        anyhow!("cannot resolve data directory; set SMETA_DB_PATH to a writable database path")
    })?;

    let app_dir = data_root.join(APP_NAME);
    fs::create_dir_all(&app_dir)
        .with_context(|| format!("create data directory {}", app_dir.display()))?;
    Ok(app_dir.join("smeta.db"))
}

pub fn validate_db_path(path: &str) -> Result<()> {
    if path.is_empty() {
        bail!("database path must not be empty");
    }
    if path == ":memory:" {
        return Ok(());
    }

    if let Some(index) = path.find("://")
        && index > 0
    {
        let scheme = &path[..index];
        if scheme.chars().all(char::is_alphabetic) {
            bail!(
                "database path {path:?} looks like a URI ({scheme}://); pass a filesystem path instead"
            );
        }
    }

    if path.starts_with("file:") {
        bail!("database path {path:?} uses file: URI syntax; pass a plain filesystem path");
    }

    if path.contains('?') {
        bail!(
            "database path {path:?} contains '?'; remove query parameters and use a plain file path"
        );
    }

    Ok(())
}

fn has_user_tables(conn: &Connection) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "
            SELECT COUNT(*)
            FROM sqlite_master
            WHERE type = 'table'
              AND name NOT LIKE 'sqlite_%'
            ",
            [],
            |row| row.get(0),
        )
        .context("count user tables")?;
    Ok(count > 0)
}

fn validate_schema(conn: &Connection) -> Result<()> {
    for (table, required_columns) in REQUIRED_SCHEMA {
        if !table_exists(conn, table)? {
            bail!(
                "database is missing required table `{table}`; use a smeta-compatible database or migrate first"
            );
        }

        let columns = table_columns(conn, table)?;
        let missing: Vec<&str> = required_columns
            .iter()
            .copied()
            .filter(|column| !columns.contains(*column))
            .collect();

        if !missing.is_empty() {
            bail!(
                "table `{table}` is missing required columns: {}; run migration before launching",
                missing.join(", ")
            );
        }
    }

    Ok(())
}

fn ensure_required_indexes(conn: &Connection) -> Result<()> {
    for index in REQUIRED_INDEXES {
        conn.execute_batch(index.create_sql)
            .with_context(|| format!("ensure required index `{}`", index.name))?;
    }

    let existing_indexes = index_names(conn)?;
    let missing = REQUIRED_INDEXES
        .iter()
        .filter(|index| !existing_indexes.contains(index.name))
        .map(|index| index.name)
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        bail!(
            "database is missing required indexes: {}; run migration before launching",
            missing.join(", ")
        );
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let exists = conn
        .query_row(
            "
            SELECT EXISTS(
              SELECT 1
              FROM sqlite_master
              WHERE type = 'table' AND name = ?
            )
            ",
            params![table],
            |row| row.get::<_, i64>(0),
        )
        .with_context(|| format!("check table existence for {table}"))?;
    Ok(exists == 1)
}

fn table_columns(conn: &Connection, table: &str) -> Result<BTreeSet<String>> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .with_context(|| format!("inspect columns for {table}"))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .with_context(|| format!("query column info for {table}"))?;

    let names = rows
        .collect::<rusqlite::Result<BTreeSet<_>>>()
        .with_context(|| format!("collect columns for {table}"))?;
    Ok(names)
}

fn index_names(conn: &Connection) -> Result<BTreeSet<String>> {
    let mut stmt = conn
        .prepare(
            "
            SELECT name
            FROM sqlite_master
            WHERE type = 'index'
              AND name NOT LIKE 'sqlite_%'
            ORDER BY name ASC
            ",
        )
        .context("prepare index names query")?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .context("query index names")?;
    rows.collect::<rusqlite::Result<BTreeSet<_>>>()
        .context("collect index names")
}

fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        ",
    )
    .context("configure sqlite pragmas")
}

fn now_rfc3339() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .context("format current timestamp")
}

fn parse_datetime(raw: &str) -> Result<OffsetDateTime> {
    if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Ok(value);
    }

    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    ) {
        return Ok(value.assume_utc());
    }

    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    ) {
        return Ok(value.assume_utc());
    }

    bail!("unsupported datetime format {raw:?}")
}

fn to_sql_error(error: anyhow::Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            error.to_string(),
        )),
    )
}

fn set_private_permissions(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let mut permissions = fs::metadata(path)
            .with_context(|| format!("stat {}", path.display()))?
            .permissions();
        permissions.set_mode(0o600);
        fs::set_permissions(path, permissions)
            .with_context(|| format!("set permissions on {}", path.display()))?;
    }
    Ok(())
}

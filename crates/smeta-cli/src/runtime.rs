// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use smeta_app::{CatalogMaterial, CatalogWork};
use smeta_db::Store;

pub struct DbCatalog<'a> {
    store: &'a Store,
}

impl<'a> DbCatalog<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }
}

impl smeta_tui::CatalogRuntime for DbCatalog<'_> {
    fn search_works(&mut self, query: &str) -> Result<Vec<CatalogWork>> {
        self.store.search_works(query)
    }

    fn search_materials(&mut self, query: &str) -> Result<Vec<CatalogMaterial>> {
        self.store.search_materials(query)
    }
}

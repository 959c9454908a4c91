// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Deterministic fixtures for estimate and catalog tests. Everything here is
//! seeded; the same seed always produces the same estimate.

use anyhow::{Context, Result, anyhow};
use smeta_app::{EstimateTree, MaterialField, WorkField};
use std::path::PathBuf;

const WORK_NAMES: [&str; 10] = [
    "Wall plastering",
    "Ceiling painting",
    "Tile laying",
    "Laminate flooring",
    "Socket installation",
    "Wallpaper hanging",
    "Partition demolition",
    "Radiator replacement",
    "Doorway widening",
    "Skirting installation",
];

const MATERIAL_NAMES: [&str; 10] = [
    "Gypsum plaster",
    "Acrylic paint",
    "Ceramic tile",
    "Tile adhesive",
    "Laminate plank",
    "Primer",
    "Drywall sheet",
    "Mounting foam",
    "PP pipe",
    "Cable VVG",
];

const UNITS: [&str; 6] = ["m2", "m", "pc", "bag", "can", "kg"];

const SECTION_NAMES: [&str; 6] = [
    "Rough works",
    "Finishing",
    "Electrical",
    "Plumbing",
    "Flooring",
    "Ceilings",
];

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }
}

/// Seeded generator of estimate trees and plausible line-item values.
#[derive(Debug, Clone)]
pub struct EstimateFaker {
    rng: DeterministicRng,
}

impl EstimateFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
        }
    }

    pub fn int_n(&mut self, n: usize) -> usize {
        self.rng.int_n(n)
    }

    pub fn work_name(&mut self) -> &'static str {
        self.pick(&WORK_NAMES)
    }

    pub fn material_name(&mut self) -> &'static str {
        self.pick(&MATERIAL_NAMES)
    }

    pub fn unit(&mut self) -> &'static str {
        self.pick(&UNITS)
    }

    /// Quantities land on half-unit steps between 0.5 and 50.
    pub fn quantity(&mut self) -> f64 {
        (self.int_range_i64(1, 100) as f64) / 2.0
    }

    pub fn labor_price_kopecks(&mut self) -> i64 {
        self.int_range_i64(5_000, 150_000)
    }

    pub fn material_price_kopecks(&mut self) -> i64 {
        self.int_range_i64(1_000, 100_000)
    }

    /// Builds a fully populated estimate: `sections` sections, each with
    /// `works_per_section` works carrying `materials_per_work` materials.
    pub fn estimate(
        &mut self,
        sections: usize,
        works_per_section: usize,
        materials_per_work: usize,
    ) -> Result<EstimateTree> {
        let mut tree = EstimateTree::new();
        for section in 0..sections {
            let name = SECTION_NAMES[section % SECTION_NAMES.len()];
            if section == 0 {
                tree.rename_section(0, name)
                    .ok_or_else(|| anyhow!("rename initial section"))?;
            } else {
                tree.add_section(name);
            }

            for work in 0..works_per_section {
                let work_row = tree
                    .append_work(section)
                    .ok_or_else(|| anyhow!("append work to section {section}"))?;
                let name = self.work_name().to_owned();
                let unit = self.unit().to_owned();
                let quantity = self.quantity();
                let labor = self.labor_price_kopecks();
                tree.update_work(section, work, WorkField::Name(name))
                    .ok_or_else(|| anyhow!("set work name"))?;
                tree.update_work(section, work, WorkField::Unit(unit))
                    .ok_or_else(|| anyhow!("set work unit"))?;
                tree.update_work(section, work, WorkField::Quantity(quantity))
                    .ok_or_else(|| anyhow!("set work quantity"))?;
                tree.update_work(section, work, WorkField::LaborCost(labor))
                    .ok_or_else(|| anyhow!("set work labor cost"))?;

                for material in 0..materials_per_work {
                    tree.insert_material_after(work_row + material)
                        .ok_or_else(|| anyhow!("insert material {material}"))?;
                    let name = self.material_name().to_owned();
                    let unit = self.unit().to_owned();
                    let quantity = self.quantity();
                    let price = self.material_price_kopecks();
                    tree.update_material(section, work, material, MaterialField::Name(name))
                        .ok_or_else(|| anyhow!("set material name"))?;
                    tree.update_material(section, work, material, MaterialField::Unit(unit))
                        .ok_or_else(|| anyhow!("set material unit"))?;
                    tree.update_material(
                        section,
                        work,
                        material,
                        MaterialField::Quantity(quantity),
                    )
                    .ok_or_else(|| anyhow!("set material quantity"))?;
                    tree.update_material(section, work, material, MaterialField::Price(price))
                        .ok_or_else(|| anyhow!("set material price"))?;
                }
            }
        }
        Ok(tree)
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }

    fn int_range_i64(&mut self, min: i64, max: i64) -> i64 {
        if max <= min {
            return min;
        }
        let span = max - min + 1;
        min + (self.rng.next_u64() % (span as u64)) as i64
    }
}

pub fn temp_db_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let db_path = dir.path().join("smeta.db");
    Ok((dir, db_path))
}

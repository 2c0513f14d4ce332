//! Database migrations for the Watchtower pipeline.
//!
//! This module contains all database migrations using SeaORM Migration.

pub use sea_orm_migration::prelude::*;

mod m2025_12_01_100000_create_jobs;
mod m2025_12_01_100100_create_records;
mod m2025_12_01_100200_create_analysis_results;
mod m2025_12_01_100300_create_signals;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2025_12_01_100000_create_jobs::Migration),
            Box::new(m2025_12_01_100100_create_records::Migration),
            Box::new(m2025_12_01_100200_create_analysis_results::Migration),
            Box::new(m2025_12_01_100300_create_signals::Migration),
        ]
    }
}

//! Migration to create the records table.
//!
//! This migration creates the records table, the content store of ingested
//! items. The unique index on content_hash is the deduplication gate: an
//! insert with an existing hash violates the constraint and is counted as a
//! duplicate, never stored twice.

use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Statement;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Records::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Records::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Records::SourceRef).text().not_null())
                    .col(ColumnDef::new(Records::Payload).json_binary().not_null())
                    .col(ColumnDef::new(Records::ContentHash).text().not_null())
                    .col(
                        ColumnDef::new(Records::IngestedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_records_content_hash")
                    .table(Records::Table)
                    .col(Records::ContentHash)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Index for loading a dataset's records by source and ingestion time
        manager
            .get_connection()
            .execute(Statement::from_string(
                manager.get_database_backend(),
                "CREATE INDEX IF NOT EXISTS idx_records_source_ingested ON records (source_ref, ingested_at DESC)"
                    .to_string(),
            ))
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_records_content_hash").to_owned())
            .await?;

        manager
            .drop_index(Index::drop().name("idx_records_source_ingested").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Records::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Records {
    Table,
    Id,
    SourceRef,
    Payload,
    ContentHash,
    IngestedAt,
}

//! Migration to create the signals table.
//!
//! Signals are ledger-transmission intents derived from analysis results.
//! The unique index on analysis_result_id makes signal creation idempotent:
//! at most one signal ever exists per analysis result.

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
                    .table(Signals::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Signals::Id).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(Signals::AnalysisResultId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Signals::Severity).text().not_null())
                    .col(ColumnDef::new(Signals::PayloadDigest).text().not_null())
                    .col(
                        ColumnDef::new(Signals::Status)
                            .text()
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(Signals::TxHash).text().null())
                    .col(
                        ColumnDef::new(Signals::TxConfirmed)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Signals::AttemptStartedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Signals::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Signals::SentAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_signals_analysis_result_id")
                            .from(Signals::Table, Signals::AnalysisResultId)
                            .to(AnalysisResults::Table, AnalysisResults::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_signals_analysis_result")
                    .table(Signals::Table)
                    .col(Signals::AnalysisResultId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Index for the monitor sweep over pending high/critical signals
        manager
            .get_connection()
            .execute(Statement::from_string(
                manager.get_database_backend(),
                "CREATE INDEX IF NOT EXISTS idx_signals_status_severity_created ON signals (status, severity, created_at)"
                    .to_string(),
            ))
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_signals_analysis_result").to_owned())
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_signals_status_severity_created")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(Signals::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Signals {
    Table,
    Id,
    AnalysisResultId,
    Severity,
    PayloadDigest,
    Status,
    TxHash,
    TxConfirmed,
    AttemptStartedAt,
    CreatedAt,
    SentAt,
}

#[derive(DeriveIden)]
enum AnalysisResults {
    Table,
    Id,
}

//! Migration to create the analysis_results table.
//!
//! Analysis results are written once by the analysis worker and never
//! mutated afterwards; the signal gate reads them to decide whether a ledger
//! transmission is warranted.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AnalysisResults::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AnalysisResults::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AnalysisResults::DatasetRef).uuid().not_null())
                    .col(ColumnDef::new(AnalysisResults::Category).text().not_null())
                    .col(
                        ColumnDef::new(AnalysisResults::Metrics)
                            .json_binary()
                            .not_null(),
                    )
                    .col(ColumnDef::new(AnalysisResults::QualityScore).double().null())
                    .col(ColumnDef::new(AnalysisResults::Severity).text().not_null())
                    .col(
                        ColumnDef::new(AnalysisResults::CreatedAt)
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
                    .name("idx_analysis_results_dataset_created")
                    .table(AnalysisResults::Table)
                    .col(AnalysisResults::DatasetRef)
                    .col(AnalysisResults::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_analysis_results_severity")
                    .table(AnalysisResults::Table)
                    .col(AnalysisResults::Severity)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_analysis_results_dataset_created")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(Index::drop().name("idx_analysis_results_severity").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(AnalysisResults::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum AnalysisResults {
    Table,
    Id,
    DatasetRef,
    Category,
    Metrics,
    QualityScore,
    Severity,
    CreatedAt,
}

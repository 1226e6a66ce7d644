use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Campaign jobs: one row per bulk-send campaign
        manager
            .create_table(
                Table::create()
                    .table(CampaignJobs::Table)
                    .if_not_exists()
                    .col(pk_uuid(CampaignJobs::Id))
                    .col(
                        ColumnDef::new(CampaignJobs::Subject)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(text(CampaignJobs::HtmlContent))
                    .col(
                        ColumnDef::new(CampaignJobs::TotalRecipients)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CampaignJobs::SentCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CampaignJobs::FailedCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CampaignJobs::SkippedCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CampaignJobs::Status)
                            .string_len(32)
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(CampaignJobs::CurrentBatch)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CampaignJobs::TotalBatches)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CampaignJobs::BatchSize)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CampaignJobs::DelayBetweenBatchesMs)
                            .big_integer()
                            .not_null(),
                    )
                    .col(json_binary_null(CampaignJobs::ErrorLog))
                    .col(ColumnDef::new(CampaignJobs::LeaseToken).uuid().null())
                    .col(timestamp_with_time_zone_null(CampaignJobs::LeaseUntil))
                    .col(timestamp_with_time_zone_null(CampaignJobs::StartedAt))
                    .col(timestamp_with_time_zone_null(CampaignJobs::CompletedAt))
                    .col(
                        timestamp_with_time_zone(CampaignJobs::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(CampaignJobs::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Per-recipient delivery ledger
        manager
            .create_table(
                Table::create()
                    .table(CampaignRecipients::Table)
                    .if_not_exists()
                    .col(pk_uuid(CampaignRecipients::Id))
                    .col(ColumnDef::new(CampaignRecipients::JobId).uuid().not_null())
                    .col(
                        ColumnDef::new(CampaignRecipients::Email)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(string_len_null(CampaignRecipients::Name, 255))
                    .col(
                        ColumnDef::new(CampaignRecipients::BatchNumber)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CampaignRecipients::Status)
                            .string_len(32)
                            .not_null()
                            .default("pending"),
                    )
                    .col(text_null(CampaignRecipients::ErrorMessage))
                    .col(timestamp_with_time_zone_null(CampaignRecipients::SentAt))
                    .col(
                        timestamp_with_time_zone(CampaignRecipients::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_campaign_recipients_job")
                            .from(CampaignRecipients::Table, CampaignRecipients::JobId)
                            .to(CampaignJobs::Table, CampaignJobs::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Sending identity: encrypted provider key plus from address
        manager
            .create_table(
                Table::create()
                    .table(SenderSettings::Table)
                    .if_not_exists()
                    .col(pk_uuid(SenderSettings::Id))
                    .col(text(SenderSettings::ApiKey))
                    .col(
                        ColumnDef::new(SenderSettings::FromEmail)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SenderSettings::FromName)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        timestamp_with_time_zone(SenderSettings::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(SenderSettings::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Permanent do-not-contact list, consulted at job intake
        manager
            .create_table(
                Table::create()
                    .table(Suppressions::Table)
                    .if_not_exists()
                    .col(pk_uuid(Suppressions::Id))
                    .col(
                        ColumnDef::new(Suppressions::Email)
                            .string_len(255)
                            .not_null()
                            .unique_key(),
                    )
                    .col(string_len_null(Suppressions::Reason, 255))
                    .col(
                        timestamp_with_time_zone(Suppressions::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Immutable terminal-state snapshots, one per finished job
        manager
            .create_table(
                Table::create()
                    .table(SendHistory::Table)
                    .if_not_exists()
                    .col(pk_uuid(SendHistory::Id))
                    .col(
                        ColumnDef::new(SendHistory::Subject)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SendHistory::RecipientCount)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SendHistory::SentCount).integer().not_null())
                    .col(
                        ColumnDef::new(SendHistory::FailedCount)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SendHistory::SkippedCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SendHistory::Status)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(json_binary_null(SendHistory::ErrorLog))
                    .col(
                        timestamp_with_time_zone(SendHistory::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // The dispatch driver selects the next pending batch by
        // (job_id, status, batch_number); this index keeps that cheap.
        manager
            .create_index(
                Index::create()
                    .name("idx_campaign_recipients_job_status_batch")
                    .table(CampaignRecipients::Table)
                    .col(CampaignRecipients::JobId)
                    .col(CampaignRecipients::Status)
                    .col(CampaignRecipients::BatchNumber)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_campaign_jobs_status")
                    .table(CampaignJobs::Table)
                    .col(CampaignJobs::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_campaign_jobs_created_at")
                    .table(CampaignJobs::Table)
                    .col(CampaignJobs::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_suppressions_email")
                    .table(Suppressions::Table)
                    .col(Suppressions::Email)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_send_history_created_at")
                    .table(SendHistory::Table)
                    .col(SendHistory::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SendHistory::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Suppressions::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(SenderSettings::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(CampaignRecipients::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(CampaignJobs::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum CampaignJobs {
    Table,
    Id,
    Subject,
    HtmlContent,
    TotalRecipients,
    SentCount,
    FailedCount,
    SkippedCount,
    Status,
    CurrentBatch,
    TotalBatches,
    BatchSize,
    DelayBetweenBatchesMs,
    ErrorLog,
    LeaseToken,
    LeaseUntil,
    StartedAt,
    CompletedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum CampaignRecipients {
    Table,
    Id,
    JobId,
    Email,
    Name,
    BatchNumber,
    Status,
    ErrorMessage,
    SentAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum SenderSettings {
    Table,
    Id,
    ApiKey,
    FromEmail,
    FromName,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Suppressions {
    Table,
    Id,
    Email,
    Reason,
    CreatedAt,
}

#[derive(DeriveIden)]
enum SendHistory {
    Table,
    Id,
    Subject,
    RecipientCount,
    SentCount,
    FailedCount,
    SkippedCount,
    Status,
    ErrorLog,
    CreatedAt,
}

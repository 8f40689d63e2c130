use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Webhooks::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Webhooks::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Webhooks::OrganizationId).uuid().not_null())
                    .col(ColumnDef::new(Webhooks::Name).string().not_null())
                    .col(ColumnDef::new(Webhooks::Description).text())
                    .col(ColumnDef::new(Webhooks::Url).string().not_null())
                    .col(ColumnDef::new(Webhooks::Events).json().not_null())
                    .col(
                        ColumnDef::new(Webhooks::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(Webhooks::Secret).string())
                    .col(ColumnDef::new(Webhooks::Headers).json().not_null())
                    .col(ColumnDef::new(Webhooks::RetryPolicy).json().not_null())
                    .col(
                        ColumnDef::new(Webhooks::DeliveryAttempts)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Webhooks::LastDeliveryAttempt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Webhooks::LastSuccessfulDelivery)
                            .timestamp_with_time_zone(),
                    )
                    .col(ColumnDef::new(Webhooks::LastFailedDelivery).timestamp_with_time_zone())
                    .col(ColumnDef::new(Webhooks::FailureReason).text())
                    .col(
                        ColumnDef::new(Webhooks::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Webhooks::UpdatedAt)
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
                    .name("idx_webhooks_organization_active")
                    .table(Webhooks::Table)
                    .col(Webhooks::OrganizationId)
                    .col(Webhooks::IsActive)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Webhooks::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Webhooks {
    Table,
    Id,
    OrganizationId,
    Name,
    Description,
    Url,
    Events,
    IsActive,
    Secret,
    Headers,
    RetryPolicy,
    DeliveryAttempts,
    LastDeliveryAttempt,
    LastSuccessfulDelivery,
    LastFailedDelivery,
    FailureReason,
    CreatedAt,
    UpdatedAt,
}

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Rsvps::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Rsvps::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Rsvps::Name).string().not_null())
                    .col(ColumnDef::new(Rsvps::Email).string().not_null())
                    .col(ColumnDef::new(Rsvps::Phone).string())
                    .col(
                        ColumnDef::new(Rsvps::Guests)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(Rsvps::PaymentStatus)
                            .string_len(50)
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(Rsvps::PaymentIntentId).string())
                    .col(ColumnDef::new(Rsvps::RefundId).string())
                    .col(ColumnDef::new(Rsvps::RefundAmount).big_integer())
                    .col(ColumnDef::new(Rsvps::CreatedAt).big_integer().not_null())
                    .col(ColumnDef::new(Rsvps::UpdatedAt).big_integer().not_null())
                    .to_owned(),
            )
            .await?;

        // Admin lookups filter by email; capacity accounting filters by status.
        manager
            .create_index(
                Index::create()
                    .name("idx_rsvps_email")
                    .table(Rsvps::Table)
                    .col(Rsvps::Email)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_rsvps_payment_status")
                    .table(Rsvps::Table)
                    .col(Rsvps::PaymentStatus)
                    .to_owned(),
            )
            .await?;

        // Webhook reconciliation upserts by charge ref.
        manager
            .create_index(
                Index::create()
                    .name("idx_rsvps_payment_intent_id")
                    .table(Rsvps::Table)
                    .col(Rsvps::PaymentIntentId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let _ = manager
            .drop_index(Index::drop().name("idx_rsvps_payment_intent_id").to_owned())
            .await;
        let _ = manager
            .drop_index(Index::drop().name("idx_rsvps_payment_status").to_owned())
            .await;
        let _ = manager
            .drop_index(Index::drop().name("idx_rsvps_email").to_owned())
            .await;

        manager
            .drop_table(Table::drop().table(Rsvps::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Rsvps {
    Table,
    Id,
    Name,
    Email,
    Phone,
    Guests,
    PaymentStatus,
    PaymentIntentId,
    RefundId,
    RefundAmount,
    CreatedAt,
    UpdatedAt,
}

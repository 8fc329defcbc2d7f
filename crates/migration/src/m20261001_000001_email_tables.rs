use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum EmailEvents {
    Table,
    ProviderMessageId,
    EventType,
    Recipient,
    ErrorText,
    OccurredAt,
    RawPayload,
}

#[derive(Iden)]
enum EmailMessages {
    Table,
    ProviderMessageId,
    Recipient,
    Status,
    StatusRank,
    LastEventAt,
    LastError,
}

#[derive(Iden)]
enum EmailSuppressions {
    Table,
    Recipient,
    Reason,
    ProviderMessageId,
    CreatedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // One ledger row per (message, event type): re-deliveries overwrite
        // their own row and never another event type's.
        manager
            .create_table(
                Table::create()
                    .table(EmailEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EmailEvents::ProviderMessageId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(EmailEvents::EventType).string().not_null())
                    .col(ColumnDef::new(EmailEvents::Recipient).string().not_null())
                    .col(ColumnDef::new(EmailEvents::ErrorText).text())
                    .col(
                        ColumnDef::new(EmailEvents::OccurredAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(EmailEvents::RawPayload).blob().not_null())
                    .primary_key(
                        Index::create()
                            .col(EmailEvents::ProviderMessageId)
                            .col(EmailEvents::EventType),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(EmailMessages::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EmailMessages::ProviderMessageId)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(EmailMessages::Recipient).string().not_null())
                    .col(
                        ColumnDef::new(EmailMessages::Status)
                            .string()
                            .not_null()
                            .default("sent"),
                    )
                    .col(
                        ColumnDef::new(EmailMessages::StatusRank)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(EmailMessages::LastEventAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(EmailMessages::LastError).text())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-email_messages-recipient")
                    .table(EmailMessages::Table)
                    .col(EmailMessages::Recipient)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(EmailSuppressions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EmailSuppressions::Recipient)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(EmailSuppressions::Reason).string().not_null())
                    .col(
                        ColumnDef::new(EmailSuppressions::ProviderMessageId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EmailSuppressions::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EmailSuppressions::Table).to_owned())
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx-email_messages-recipient")
                    .table(EmailMessages::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(EmailMessages::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(EmailEvents::Table).to_owned())
            .await?;
        Ok(())
    }
}

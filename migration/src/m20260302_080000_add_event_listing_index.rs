use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // The public listing filters on is_active and orders by date
        manager
            .create_index(
                Index::create()
                    .name("events_is_active_date")
                    .table((Alias::new("hyperlocal"), Alias::new("events")))
                    .col(Alias::new("is_active"))
                    .col(Alias::new("date"))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("events_host_id")
                    .table((Alias::new("hyperlocal"), Alias::new("events")))
                    .col(Alias::new("host_id"))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("events_host_id")
                    .table((Alias::new("hyperlocal"), Alias::new("events")))
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("events_is_active_date")
                    .table((Alias::new("hyperlocal"), Alias::new("events")))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum Events {
    Table,
    Id,
    HostId,
    Title,
    Description,
    LocationName,
    Latitude,
    Longitude,
    ImageUrl,
    Date,
    Price,
    TotalTickets,
    RemainingTickets,
    AverageRating,
    ReviewCount,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table((Alias::new("hyperlocal"), Events::Table))
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Events::Id)
                            .uuid()
                            .not_null()
                            .primary_key()
                            .default(Expr::cust("gen_random_uuid()")),
                    )
                    .col(ColumnDef::new(Events::HostId).uuid().not_null())
                    .col(ColumnDef::new(Events::Title).string().not_null())
                    .col(ColumnDef::new(Events::Description).text().not_null())
                    .col(ColumnDef::new(Events::LocationName).string().not_null())
                    .col(ColumnDef::new(Events::Latitude).double().not_null())
                    .col(ColumnDef::new(Events::Longitude).double().not_null())
                    .col(ColumnDef::new(Events::ImageUrl).string())
                    .col(
                        ColumnDef::new(Events::Date)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Events::Price)
                            .double()
                            .not_null()
                            .default(0.0)
                            .check(Expr::col(Events::Price).gte(0.0)),
                    )
                    .col(
                        ColumnDef::new(Events::TotalTickets)
                            .integer()
                            .not_null()
                            .check(Expr::col(Events::TotalTickets).gte(1)),
                    )
                    .col(ColumnDef::new(Events::RemainingTickets).integer().not_null())
                    .col(
                        ColumnDef::new(Events::AverageRating)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(Events::ReviewCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Events::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Events::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Events::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    // The decrement in the reservation transaction relies on this
                    .check(
                        Expr::col(Events::RemainingTickets).gte(0).and(
                            Expr::col(Events::RemainingTickets)
                                .lte(Expr::col(Events::TotalTickets)),
                        ),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("events_host_id_fkey")
                            .from(
                                (Alias::new("hyperlocal"), Events::Table),
                                Events::HostId,
                            )
                            .to((Alias::new("hyperlocal"), Users::Table), Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::NoAction),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table((Alias::new("hyperlocal"), Events::Table))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}

use sea_orm_migration::prelude::extension::postgres::Type;
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::{EnumIter, Iterable};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
struct ReservationStatus;

#[derive(DeriveIden, EnumIter)]
enum ReservationStatusVariants {
    Going,
    Interested,
}

#[derive(DeriveIden)]
enum Reservations {
    Table,
    Id,
    EventId,
    UserId,
    Status,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Events {
    Table,
    Id,
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
            .create_type(
                Type::create()
                    .as_enum((Alias::new("hyperlocal"), ReservationStatus))
                    .values(ReservationStatusVariants::iter())
                    .to_owned(),
            )
            .await?;

        // The text key is "{event_id}_{user_id}", so a second insert for the
        // same pair fails on the primary key.
        manager
            .create_table(
                Table::create()
                    .table((Alias::new("hyperlocal"), Reservations::Table))
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Reservations::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Reservations::EventId).uuid().not_null())
                    .col(ColumnDef::new(Reservations::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(Reservations::Status)
                            .custom(Alias::new("hyperlocal.reservation_status"))
                            .not_null()
                            .default("going"),
                    )
                    .col(
                        ColumnDef::new(Reservations::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("reservations_event_id_fkey")
                            .from(
                                (Alias::new("hyperlocal"), Reservations::Table),
                                Reservations::EventId,
                            )
                            .to((Alias::new("hyperlocal"), Events::Table), Events::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("reservations_user_id_fkey")
                            .from(
                                (Alias::new("hyperlocal"), Reservations::Table),
                                Reservations::UserId,
                            )
                            .to((Alias::new("hyperlocal"), Users::Table), Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Backs the attendee dashboard lookup
        manager
            .create_index(
                Index::create()
                    .name("reservations_user_id")
                    .table((Alias::new("hyperlocal"), Reservations::Table))
                    .col(Reservations::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table((Alias::new("hyperlocal"), Reservations::Table))
                    .to_owned(),
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared("DROP TYPE IF EXISTS hyperlocal.reservation_status")
            .await?;

        Ok(())
    }
}

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared("CREATE SCHEMA IF NOT EXISTS hyperlocal;")
            .await?;

        db.execute_unprepared("SET search_path TO hyperlocal, public;")
            .await?;

        // gen_random_uuid() ships with pgcrypto before PostgreSQL 13
        db.execute_unprepared("CREATE EXTENSION IF NOT EXISTS pgcrypto;")
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // CASCADE removes every table and type in the schema
        manager
            .get_connection()
            .execute_unprepared("DROP SCHEMA IF EXISTS hyperlocal CASCADE;")
            .await?;

        Ok(())
    }
}

pub use crate::QueryFilterMap;

use crate::error::Error;
use sea_orm::strum::IntoEnumIterator;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};

/// Find all records of an entity by the given query filter map.
pub async fn find_by<E, C>(
    db: &impl ConnectionTrait,
    query_filter_map: QueryFilterMap,
) -> Result<Vec<E::Model>, Error>
where
    E: EntityTrait<Column = C>,
    C: ColumnTrait + IntoEnumIterator,
{
    let mut query = E::find();

    // We iterate through the entity's defined columns so that we only attempt
    // to filter by columns that exist.
    for column in C::iter() {
        if let Some(value) = query_filter_map.get(&column.to_string()) {
            query = query.filter(column.eq(value));
        }
    }

    Ok(query.all(db).await?)
}

#[cfg(test)]
#[cfg(feature = "mock")]
mod tests {
    use super::*;
    use entity::{events, Id};
    use sea_orm::{DatabaseBackend, MockDatabase, Transaction, Value};

    #[tokio::test]
    async fn find_by_only_filters_on_existing_columns() -> Result<(), Error> {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![Vec::<events::Model>::new()])
            .into_connection();

        let host_id = Id::new_v4();
        let mut query_filter_map = QueryFilterMap::new();
        query_filter_map.insert(
            "host_id".to_string(),
            Some(Value::Uuid(Some(Box::new(host_id)))),
        );
        query_filter_map.insert(
            "not_a_column".to_string(),
            Some(Value::String(Some(Box::new("ignored".to_string())))),
        );

        let _ = find_by::<events::Entity, events::Column>(&db, query_filter_map).await?;

        assert_eq!(
            db.into_transaction_log(),
            [Transaction::from_sql_and_values(
                DatabaseBackend::Postgres,
                r#"SELECT "events"."id", "events"."host_id", "events"."title", "events"."description", "events"."location_name", "events"."latitude", "events"."longitude", "events"."image_url", "events"."date", "events"."price", "events"."total_tickets", "events"."remaining_tickets", "events"."average_rating", "events"."review_count", "events"."is_active", "events"."created_at", "events"."updated_at" FROM "hyperlocal"."events" WHERE "events"."host_id" = $1"#,
                [host_id.into()]
            )]
        );

        Ok(())
    }
}

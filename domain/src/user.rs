use crate::error::Error;
use crate::{roles::Role, users, Id};
use chrono::Utc;
use email_address::EmailAddress;
use log::*;
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use utoipa::ToSchema;

pub use entity_api::user::{find_by_email, find_by_id, AuthSession, Backend, Credentials};

const MIN_PASSWORD_CHARS: usize = 8;

/// Sign-up request. The role is not part of it: everyone starts as an attendee.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Creates an attendee account.
pub async fn create(db: &DatabaseConnection, new_user: NewUser) -> Result<users::Model, Error> {
    let email = new_user.email.trim().to_lowercase();
    if !EmailAddress::is_valid(&email) {
        return Err(Error::invalid("Email address is not valid"));
    }
    if new_user.password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(Error::invalid(format!(
            "Password must be at least {MIN_PASSWORD_CHARS} characters"
        )));
    }

    let now = Utc::now();
    let user = entity_api::user::create(
        db,
        users::Model {
            id: Id::nil(),
            email,
            display_name: new_user
                .display_name
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty()),
            password: new_user.password,
            role: Role::Attendee,
            created_at: now.into(),
            updated_at: now.into(),
        },
    )
    .await?;

    info!("Created user {}", user.id);
    Ok(user)
}

pub async fn find_all(db: &DatabaseConnection) -> Result<Vec<users::Model>, Error> {
    Ok(entity_api::user::find_all(db).await?)
}

/// Checks whether `actor` may give `target_id` the role `role`. Only
/// administrators assign roles, and nobody can be made an administrator.
pub fn authorize_role_change(actor: &users::Model, target_id: Id, role: Role) -> Result<(), Error> {
    if !actor.role.is_admin() {
        warn!("User {} tried to change the role of user {target_id}", actor.id);
        return Err(Error::forbidden("Only administrators can change roles"));
    }
    if role == Role::Admin {
        warn!("Admin {} tried to grant the admin role to {target_id}", actor.id);
        return Err(Error::forbidden("The admin role cannot be granted"));
    }
    if actor.id == target_id {
        return Err(Error::forbidden("Administrators cannot change their own role"));
    }
    Ok(())
}

pub async fn set_role(
    db: &DatabaseConnection,
    actor: &users::Model,
    target_id: Id,
    role: Role,
) -> Result<users::Model, Error> {
    authorize_role_change(actor, target_id, role)?;

    let user = entity_api::user::update_role(db, target_id, role).await?;
    info!("Admin {} set role of user {} to {role}", actor.id, user.id);
    Ok(user)
}


#[cfg(test)]
// We need to gate seaORM's mock feature behind conditional compilation because
// the feature removes the Clone trait implementation from seaORM's DatabaseConnection.
// see https://github.com/SeaQL/sea-orm/issues/830
#[cfg(feature = "mock")]
mod mock_tests {
    use super::*;
    use crate::error::{DomainErrorKind, EntityErrorKind, InternalErrorKind};
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn create_rejects_malformed_emails_before_touching_the_database() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();

        let result = create(
            &db,
            NewUser {
                email: "not-an-email".to_string(),
                password: "long enough".to_string(),
                display_name: None,
            },
        )
        .await;

        assert_eq!(
            result.err().map(|e| e.error_kind),
            Some(DomainErrorKind::Internal(InternalErrorKind::Entity(
                EntityErrorKind::Invalid
            )))
        );
        assert!(db.into_transaction_log().is_empty());
    }
}

use crate::orm::{password_resets, posts, sessions, topics, users};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, SaltString},
    Argon2, PasswordHasher, PasswordVerifier,
};
use chrono::Utc;
use once_cell::sync::OnceCell;
use sea_orm::{entity::*, query::*, sea_query::Expr, DatabaseConnection, DbErr};

/// Name of the placeholder identity which inherits content from removed
/// accounts. The row can never log in and is never deleted.
pub const DELETED_USER_NAME: &str = "non_existing_user";

static DELETED_USER_ID: OnceCell<i32> = OnceCell::new();

/// A mini struct for holding only what information we need about a client.
#[derive(Clone, Debug)]
pub struct ClientUser {
    pub id: i32,
    pub name: String,
}

#[inline(always)]
pub fn get_deleted_user_id() -> i32 {
    *DELETED_USER_ID
        .get()
        .expect("deleted-user sentinel was not initialized")
}

/// Ensures the sentinel row exists and pins its id. Runs once at startup,
/// before the server accepts requests.
pub async fn init_deleted_user(db: &DatabaseConnection) -> Result<i32, DbErr> {
    if let Some(user) = users::Entity::find()
        .filter(users::Column::Name.eq(DELETED_USER_NAME))
        .one(db)
        .await?
    {
        let _ = DELETED_USER_ID.set(user.id);
        return Ok(user.id);
    }

    let res = users::Entity::insert(users::ActiveModel {
        name: Set(DELETED_USER_NAME.to_owned()),
        email: Set(String::new()),
        // Not a PHC string, so no submitted password can ever verify.
        password: Set("!".to_owned()),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    })
    .exec(db)
    .await?;
    let _ = DELETED_USER_ID.set(res.last_insert_id);
    Ok(res.last_insert_id)
}

/// Detaches a user from their content and removes the account. Topics and
/// posts are reassigned to the sentinel identity so history stays intact.
pub async fn delete_user(db: &DatabaseConnection, user_id: i32) -> Result<(), DbErr> {
    let sentinel = get_deleted_user_id();

    let txn = db.begin().await?;

    topics::Entity::update_many()
        .col_expr(topics::Column::StartingUserId, Expr::value(sentinel))
        .filter(topics::Column::StartingUserId.eq(user_id))
        .exec(&txn)
        .await?;
    posts::Entity::update_many()
        .col_expr(posts::Column::CreatedById, Expr::value(sentinel))
        .filter(posts::Column::CreatedById.eq(user_id))
        .exec(&txn)
        .await?;
    posts::Entity::update_many()
        .col_expr(posts::Column::UpdatedById, Expr::value(sentinel))
        .filter(posts::Column::UpdatedById.eq(user_id))
        .exec(&txn)
        .await?;
    sessions::Entity::delete_many()
        .filter(sessions::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;
    password_resets::Entity::delete_many()
        .filter(password_resets::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;
    users::Entity::delete_many()
        .filter(users::Column::Id.eq(user_id))
        .exec(&txn)
        .await?;

    txn.commit().await
}

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Shared rules for choosing a new password, used by signup, password
/// change and password reset alike.
pub fn password_errors(password1: &str, password2: &str) -> Vec<String> {
    let mut errors = Vec::new();
    if password1.chars().count() < 8 {
        errors.push("This password is too short. It must contain at least 8 characters.".to_owned());
    }
    if password1 != password2 {
        errors.push("The two password fields didn't match.".to_owned());
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashed_password_verifies() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(verify_password(&hash, "correct horse battery"));
        assert!(!verify_password(&hash, "incorrect horse battery"));
    }

    #[test]
    fn sentinel_password_never_verifies() {
        assert!(!verify_password("!", "!"));
        assert!(!verify_password("!", ""));
    }

    #[test]
    fn password_rules() {
        assert!(password_errors("longenough", "longenough").is_empty());
        assert_eq!(password_errors("short", "short").len(), 1);
        assert_eq!(password_errors("longenough", "different-one").len(), 1);
        assert_eq!(password_errors("short", "other").len(), 2);
    }
}

use crate::orm::{sessions, users};
use crate::user::ClientUser;
use chrono::{Duration, NaiveDateTime, Utc};
use once_cell::sync::OnceCell;
use sea_orm::{entity::*, query::*, DatabaseConnection, DbErr};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// Minutes a session token stays valid when SESSION_TIME is not configured.
const DEFAULT_SESSION_MINUTES: i64 = 60 * 24 * 14;

pub struct Session {
    pub user_id: i32,
    pub expires_at: NaiveDateTime,
}

pub type SessionMap = RwLock<HashMap<Uuid, Session>>;

static SESSION_CACHE: OnceCell<SessionMap> = OnceCell::new();
static SESSION_TIME: OnceCell<Duration> = OnceCell::new();

/// Reads SESSION_TIME (minutes) from the environment and prepares the
/// in-process session cache. Safe to call more than once.
pub fn init() {
    let minutes = match std::env::var("SESSION_TIME") {
        Ok(time) => {
            let time = time
                .parse::<i64>()
                .expect("SESSION_TIME cannot be parsed as an integer");
            if time < 0 {
                panic!("SESSION_TIME is a negative number!");
            }
            time
        }
        Err(_) => DEFAULT_SESSION_MINUTES,
    };
    let _ = SESSION_TIME.set(Duration::minutes(minutes));
    let _ = SESSION_CACHE.set(RwLock::new(HashMap::new()));
}

#[inline(always)]
pub fn get_session_cache() -> &'static SessionMap {
    unsafe { SESSION_CACHE.get_unchecked() }
}

#[inline(always)]
pub fn get_session_time() -> &'static Duration {
    unsafe { SESSION_TIME.get_unchecked() }
}

/// Loads every live session row into the in-process cache.
pub async fn reload_session_cache(db: &DatabaseConnection) -> Result<(), DbErr> {
    let now = Utc::now().naive_utc();
    let rows = sessions::Entity::find().all(db).await?;

    let cache = &mut *get_session_cache().write().unwrap();
    cache.clear();
    for row in rows {
        if row.expires_at <= now {
            continue;
        }
        if let Ok(uuid) = Uuid::parse_str(&row.id) {
            cache.insert(
                uuid,
                Session {
                    user_id: row.user_id,
                    expires_at: row.expires_at,
                },
            );
        }
    }

    Ok(())
}

pub async fn new_session(db: &DatabaseConnection, user_id: i32) -> Result<Uuid, DbErr> {
    let expires_at = Utc::now().naive_utc() + *get_session_time();
    let mut uuid;
    loop {
        uuid = Uuid::new_v4();
        let cache = &mut *get_session_cache().write().unwrap();
        if !cache.contains_key(&uuid) {
            cache.insert(
                uuid,
                Session {
                    user_id,
                    expires_at,
                },
            );
            break;
        }
    }

    sessions::Entity::insert(sessions::ActiveModel {
        id: Set(uuid.to_string()),
        user_id: Set(user_id),
        expires_at: Set(expires_at),
    })
    .exec(db)
    .await?;

    Ok(uuid)
}

pub async fn remove_session(db: &DatabaseConnection, uuid: Uuid) -> Result<(), DbErr> {
    get_session_cache().write().unwrap().remove(&uuid);
    sessions::Entity::delete_many()
        .filter(sessions::Column::Id.eq(uuid.to_string()))
        .exec(db)
        .await?;
    Ok(())
}

/// Drops every session belonging to a user, cache and rows both. Used when
/// an account is deleted or its password is reset.
pub async fn remove_sessions_for_user(db: &DatabaseConnection, user_id: i32) -> Result<(), DbErr> {
    get_session_cache()
        .write()
        .unwrap()
        .retain(|_, session| session.user_id != user_id);
    sessions::Entity::delete_many()
        .filter(sessions::Column::UserId.eq(user_id))
        .exec(db)
        .await?;
    Ok(())
}

/// Resolves the request's "token" cookie to a user, if the session is
/// still alive.
pub async fn authenticate_client_by_session(cookies: &actix_session::Session) -> Option<ClientUser> {
    let token = match cookies.get::<String>("token") {
        Ok(Some(token)) => token,
        Ok(None) => return None,
        Err(e) => {
            log::error!("authenticate_client_by_session: cookies.get() {}", e);
            return None;
        }
    };
    let uuid = match Uuid::parse_str(&token) {
        Ok(uuid) => uuid,
        Err(e) => {
            log::error!("authenticate_client_by_session: parse_str() {}", e);
            return None;
        }
    };

    let user_id = {
        let cache = get_session_cache().read().unwrap();
        match cache.get(&uuid) {
            Some(session) if session.expires_at > Utc::now().naive_utc() => session.user_id,
            _ => return None,
        }
    };

    match users::Entity::find_by_id(user_id)
        .one(crate::get_db_pool())
        .await
    {
        Ok(Some(user)) => Some(ClientUser {
            id: user.id,
            name: user.name,
        }),
        Ok(None) => None,
        Err(e) => {
            log::error!("authenticate_client_by_session: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_round_trip() {
        init();
        let uuid = Uuid::new_v4();
        let expires_at = Utc::now().naive_utc() + *get_session_time();
        get_session_cache().write().unwrap().insert(
            uuid,
            Session {
                user_id: 1,
                expires_at,
            },
        );
        assert!(get_session_cache().read().unwrap().contains_key(&uuid));
        get_session_cache().write().unwrap().remove(&uuid);
        assert!(!get_session_cache().read().unwrap().contains_key(&uuid));
    }

    #[test]
    fn default_session_time_is_positive() {
        init();
        assert!(*get_session_time() > Duration::zero());
    }
}

use crate::get_db_pool;
use crate::login::redirect_to_login;
use crate::middleware::ClientCtx;
use crate::orm::{posts, users};
use actix_web::{error, get, post, web, Error, HttpRequest, HttpResponse};
use askama_actix::{Template, TemplateToResponse};
use chrono::prelude::Utc;
use sea_orm::{entity::*, query::*, sea_query::Expr, DatabaseConnection, DbErr, FromQueryResult};
use serde::Deserialize;

pub const MESSAGE_MAX: usize = 4000;

/// A post row joined with its author's name.
#[derive(Debug, FromQueryResult)]
pub struct PostForTemplate {
    pub id: i32,
    pub topic_id: i32,
    pub message: String,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: Option<chrono::NaiveDateTime>,
    pub created_by_id: i32,
    pub updated_by_id: Option<i32>,
    // join users
    pub username: Option<String>,
}

#[derive(Template)]
#[template(path = "edit_post.html")]
pub struct EditPostTemplate {
    pub client: ClientCtx,
    pub board_id: i32,
    pub topic_id: i32,
    pub post: PostForTemplate,
    pub message: String,
    pub errors: Vec<String>,
}

#[derive(Deserialize)]
pub struct PostFormData {
    pub message: String,
}

/// Checks a submitted message against the post size rules and returns the
/// trimmed text.
pub fn validate_message(message: &str) -> Result<String, String> {
    let clean = message.trim();
    if clean.is_empty() {
        return Err("The message field is required.".to_owned());
    }
    if clean.chars().count() > MESSAGE_MAX {
        return Err(format!(
            "Ensure the message has at most {} characters.",
            MESSAGE_MAX
        ));
    }
    Ok(clean.to_owned())
}

/// Posts of a topic, newest first, with author names adjoined.
pub fn posts_in_topic(topic_id: i32) -> Select<posts::Entity> {
    posts::Entity::find()
        .filter(posts::Column::TopicId.eq(topic_id))
        .left_join(users::Entity)
        .column_as(users::Column::Name, "username")
        .order_by_desc(posts::Column::CreatedAt)
}

/// The author filter is part of the lookup itself, so another user cannot
/// distinguish a foreign post from a missing one.
pub fn post_for_author_query(post_id: i32, topic_id: i32, user_id: i32) -> Select<posts::Entity> {
    posts::Entity::find_by_id(post_id)
        .filter(posts::Column::TopicId.eq(topic_id))
        .filter(posts::Column::CreatedById.eq(user_id))
        .left_join(users::Entity)
        .column_as(users::Column::Name, "username")
}

pub async fn get_post_for_author(
    db: &DatabaseConnection,
    post_id: i32,
    topic_id: i32,
    user_id: i32,
) -> Result<Option<PostForTemplate>, DbErr> {
    post_for_author_query(post_id, topic_id, user_id)
        .into_model::<PostForTemplate>()
        .one(db)
        .await
}

#[get("/boards/{board_id}/topics/{topic_id}/posts/{post_id}/edit/")]
pub async fn edit_post(
    client: ClientCtx,
    path: web::Path<(i32, i32, i32)>,
    req: HttpRequest,
) -> Result<HttpResponse, Error> {
    let user_id = match client.get_id() {
        Some(id) => id,
        None => return Ok(redirect_to_login(req.path())),
    };

    let (board_id, topic_id, post_id) = path.into_inner();
    let post = get_post_for_author(get_db_pool(), post_id, topic_id, user_id)
        .await
        .map_err(error::ErrorInternalServerError)?
        .ok_or_else(|| error::ErrorNotFound("Post not found."))?;

    Ok(EditPostTemplate {
        client,
        board_id,
        topic_id,
        message: post.message.to_owned(),
        post,
        errors: Vec::new(),
    }
    .to_response())
}

#[post("/boards/{board_id}/topics/{topic_id}/posts/{post_id}/edit/")]
pub async fn update_post(
    client: ClientCtx,
    path: web::Path<(i32, i32, i32)>,
    form: web::Form<PostFormData>,
    req: HttpRequest,
) -> Result<HttpResponse, Error> {
    let user_id = match client.get_id() {
        Some(id) => id,
        None => return Ok(redirect_to_login(req.path())),
    };

    let (board_id, topic_id, post_id) = path.into_inner();
    let db = get_db_pool();
    let post = get_post_for_author(db, post_id, topic_id, user_id)
        .await
        .map_err(error::ErrorInternalServerError)?
        .ok_or_else(|| error::ErrorNotFound("Post not found."))?;

    let message = match validate_message(&form.message) {
        Ok(message) => message,
        Err(e) => {
            return Ok(EditPostTemplate {
                client,
                board_id,
                topic_id,
                post,
                message: form.message.to_owned(),
                errors: vec![e],
            }
            .to_response())
        }
    };

    // The creator identity is immutable; an edit only stamps the editor.
    posts::Entity::update_many()
        .col_expr(posts::Column::Message, Expr::value(message))
        .col_expr(posts::Column::UpdatedAt, Expr::value(Utc::now().naive_utc()))
        .col_expr(posts::Column::UpdatedById, Expr::value(user_id))
        .filter(posts::Column::Id.eq(post.id))
        .exec(db)
        .await
        .map_err(error::ErrorInternalServerError)?;

    Ok(HttpResponse::Found()
        .append_header((
            "Location",
            format!("/boards/{}/topics/{}/", board_id, topic_id),
        ))
        .finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, QueryTrait};

    #[test]
    fn post_listing_is_newest_first() {
        let sql = posts_in_topic(3).build(DatabaseBackend::Postgres).to_string();
        assert!(sql.contains("\"topic_id\" = 3"));
        assert!(sql.contains("ORDER BY \"posts\".\"created_at\" DESC"));
        assert!(sql.contains("AS \"username\""));
    }

    #[test]
    fn author_lookup_includes_ownership_predicate() {
        let sql = post_for_author_query(5, 3, 9)
            .build(DatabaseBackend::Postgres)
            .to_string();
        assert!(sql.contains("\"id\" = 5"));
        assert!(sql.contains("\"topic_id\" = 3"));
        assert!(sql.contains("\"created_by_id\" = 9"));
    }

    #[test]
    fn message_is_required() {
        assert!(validate_message("   ").is_err());
        assert!(validate_message("").is_err());
    }

    #[test]
    fn message_has_an_upper_bound() {
        assert!(validate_message(&"x".repeat(MESSAGE_MAX)).is_ok());
        assert!(validate_message(&"x".repeat(MESSAGE_MAX + 1)).is_err());
    }

    #[test]
    fn message_is_trimmed() {
        assert_eq!(validate_message("  You suck.  ").unwrap(), "You suck.");
    }
}

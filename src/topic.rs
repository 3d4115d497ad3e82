use crate::board::PageQuery;
use crate::get_db_pool;
use crate::login::redirect_to_login;
use crate::middleware::ClientCtx;
use crate::orm::{posts, topics};
use crate::pagination::Pager;
use crate::post::{posts_in_topic, validate_message, PostForTemplate, PostFormData};
use actix_web::{error, get, post, web, Error, HttpRequest, HttpResponse};
use askama_actix::{Template, TemplateToResponse};
use chrono::Utc;
use sea_orm::{entity::*, query::*, sea_query::Expr, DatabaseConnection, DbErr};

pub const POSTS_PER_PAGE: usize = 3;

#[derive(Template)]
#[template(path = "topic_posts.html")]
pub struct TopicTemplate {
    pub client: ClientCtx,
    pub board_id: i32,
    pub topic: topics::Model,
    pub posts: Vec<PostForTemplate>,
    pub pager: Pager,
}

#[derive(Template)]
#[template(path = "reply_topic.html")]
pub struct ReplyTemplate {
    pub client: ClientCtx,
    pub board_id: i32,
    pub topic: topics::Model,
    pub message: String,
    pub errors: Vec<String>,
}

/// Topics resolve only through their owning board; a topic id under the
/// wrong board is indistinguishable from a missing one.
pub async fn get_topic_in_board(
    db: &DatabaseConnection,
    board_id: i32,
    topic_id: i32,
) -> Result<Option<topics::Model>, DbErr> {
    topics::Entity::find_by_id(topic_id)
        .filter(topics::Column::BoardId.eq(board_id))
        .one(db)
        .await
}

/// Single-statement bump so concurrent readers cannot lose increments.
pub fn views_increment(topic_id: i32) -> UpdateMany<topics::Entity> {
    topics::Entity::update_many()
        .col_expr(topics::Column::Views, Expr::cust("views + 1"))
        .filter(topics::Column::Id.eq(topic_id))
}

#[get("/boards/{board_id}/topics/{topic_id}/")]
pub async fn view_topic(
    client: ClientCtx,
    path: web::Path<(i32, i32)>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, Error> {
    let (board_id, topic_id) = path.into_inner();
    let db = get_db_pool();

    let mut topic = get_topic_in_board(db, board_id, topic_id)
        .await
        .map_err(error::ErrorInternalServerError)?
        .ok_or_else(|| error::ErrorNotFound("Topic not found."))?;

    // Every render of the listing counts as a view, repeat visits and
    // deeper pages included.
    views_increment(topic.id)
        .exec(db)
        .await
        .map_err(error::ErrorInternalServerError)?;
    topic.views += 1;

    let total = posts::Entity::find()
        .filter(posts::Column::TopicId.eq(topic.id))
        .count(db)
        .await
        .map_err(error::ErrorInternalServerError)?;
    let pager = Pager::new(query.page.unwrap_or(1), total, POSTS_PER_PAGE)
        .ok_or_else(|| error::ErrorNotFound("Invalid page."))?;

    let posts = posts_in_topic(topic.id)
        .limit(POSTS_PER_PAGE as u64)
        .offset(pager.offset(POSTS_PER_PAGE))
        .into_model::<PostForTemplate>()
        .all(db)
        .await
        .map_err(error::ErrorInternalServerError)?;

    Ok(TopicTemplate {
        client,
        board_id,
        topic,
        posts,
        pager,
    }
    .to_response())
}

#[get("/boards/{board_id}/topics/{topic_id}/reply/")]
pub async fn view_reply_form(
    client: ClientCtx,
    path: web::Path<(i32, i32)>,
    req: HttpRequest,
) -> Result<HttpResponse, Error> {
    if !client.is_user() {
        return Ok(redirect_to_login(req.path()));
    }

    let (board_id, topic_id) = path.into_inner();
    let topic = get_topic_in_board(get_db_pool(), board_id, topic_id)
        .await
        .map_err(error::ErrorInternalServerError)?
        .ok_or_else(|| error::ErrorNotFound("Topic not found."))?;

    Ok(ReplyTemplate {
        client,
        board_id,
        topic,
        message: String::new(),
        errors: Vec::new(),
    }
    .to_response())
}

#[post("/boards/{board_id}/topics/{topic_id}/reply/")]
pub async fn create_reply(
    client: ClientCtx,
    path: web::Path<(i32, i32)>,
    form: web::Form<PostFormData>,
    req: HttpRequest,
) -> Result<HttpResponse, Error> {
    let user_id = match client.get_id() {
        Some(id) => id,
        None => return Ok(redirect_to_login(req.path())),
    };

    let (board_id, topic_id) = path.into_inner();
    let db = get_db_pool();
    let topic = get_topic_in_board(db, board_id, topic_id)
        .await
        .map_err(error::ErrorInternalServerError)?
        .ok_or_else(|| error::ErrorNotFound("Topic not found."))?;

    let message = match validate_message(&form.message) {
        Ok(message) => message,
        Err(e) => {
            return Ok(ReplyTemplate {
                client,
                board_id,
                topic,
                message: form.message.to_owned(),
                errors: vec![e],
            }
            .to_response())
        }
    };

    posts::Entity::insert(posts::ActiveModel {
        message: Set(message),
        created_at: Set(Utc::now().naive_utc()),
        updated_at: Set(None),
        topic_id: Set(topic.id),
        created_by_id: Set(user_id),
        updated_by_id: Set(None),
        ..Default::default()
    })
    .exec(db)
    .await
    .map_err(error::ErrorInternalServerError)?;

    Ok(HttpResponse::Found()
        .append_header((
            "Location",
            format!("/boards/{}/topics/{}/", board_id, topic.id),
        ))
        .finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, QueryTrait};

    #[test]
    fn topic_lookup_is_scoped_to_board() {
        let sql = topics::Entity::find_by_id(2)
            .filter(topics::Column::BoardId.eq(1))
            .build(DatabaseBackend::Postgres)
            .to_string();
        assert!(sql.contains("\"id\" = 2"));
        assert!(sql.contains("\"board_id\" = 1"));
    }

    #[test]
    fn views_bump_is_a_single_update() {
        let sql = views_increment(5).build(DatabaseBackend::Postgres).to_string();
        assert!(sql.contains("views + 1"));
        assert!(sql.contains("\"id\" = 5"));
    }
}

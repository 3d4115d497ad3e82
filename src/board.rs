use crate::get_db_pool;
use crate::login::redirect_to_login;
use crate::middleware::ClientCtx;
use crate::orm::{boards, posts, topics};
use crate::pagination::Pager;
use crate::post::validate_message;
use actix_web::{error, get, post, web, Error, HttpRequest, HttpResponse};
use askama_actix::{Template, TemplateToResponse};
use chrono::Utc;
use sea_orm::{entity::*, query::*, sea_query::Expr, DatabaseConnection, DbErr, FromQueryResult};
use serde::Deserialize;

pub const TOPICS_PER_PAGE: usize = 10;
pub const SUBJECT_MAX: usize = 255;

/// A topic row joined with its reply count for the board listing.
#[derive(Debug, FromQueryResult)]
pub struct TopicForTemplate {
    pub id: i32,
    pub subject: String,
    pub last_updated: chrono::NaiveDateTime,
    pub views: i32,
    pub reply_count: i64,
}

#[derive(Template)]
#[template(path = "topics.html")]
pub struct BoardTemplate {
    pub client: ClientCtx,
    pub board: boards::Model,
    pub topics: Vec<TopicForTemplate>,
    pub pager: Pager,
}

#[derive(Template)]
#[template(path = "new_topic.html")]
pub struct NewTopicTemplate {
    pub client: ClientCtx,
    pub board: boards::Model,
    pub subject: String,
    pub message: String,
    pub errors: Vec<String>,
}

#[derive(Deserialize)]
pub struct NewTopicFormData {
    pub subject: String,
    pub message: String,
}

#[derive(Deserialize)]
pub struct PageQuery {
    pub page: Option<usize>,
}

#[derive(Debug)]
pub struct NewTopicData {
    pub subject: String,
    pub message: String,
}

pub fn validate_topic_form(form: &NewTopicFormData) -> Result<NewTopicData, Vec<String>> {
    let mut errors = Vec::new();

    let subject = form.subject.trim();
    if subject.is_empty() {
        errors.push("The subject field is required.".to_owned());
    } else if subject.chars().count() > SUBJECT_MAX {
        errors.push(format!(
            "Ensure the subject has at most {} characters.",
            SUBJECT_MAX
        ));
    }

    let message = match validate_message(&form.message) {
        Ok(message) => message,
        Err(e) => {
            errors.push(e);
            String::new()
        }
    };

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(NewTopicData {
        subject: subject.to_owned(),
        message,
    })
}

pub async fn get_board(db: &DatabaseConnection, id: i32) -> Result<Option<boards::Model>, DbErr> {
    boards::Entity::find_by_id(id).one(db).await
}

/// Topics of a board, most recently updated first, each carrying
/// `reply_count` (the opening post is content, not a reply).
pub fn topics_with_replies(board_id: i32) -> Select<topics::Entity> {
    topics::Entity::find()
        .filter(topics::Column::BoardId.eq(board_id))
        .left_join(posts::Entity)
        .column_as(Expr::cust("COUNT(\"posts\".\"id\") - 1"), "reply_count")
        .group_by(topics::Column::Id)
        .order_by_desc(topics::Column::LastUpdated)
}

#[get("/boards/{board_id}/")]
pub async fn view_board(
    client: ClientCtx,
    path: web::Path<i32>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, Error> {
    let db = get_db_pool();
    let board = get_board(db, path.into_inner())
        .await
        .map_err(error::ErrorInternalServerError)?
        .ok_or_else(|| error::ErrorNotFound("Board not found."))?;

    let total = topics::Entity::find()
        .filter(topics::Column::BoardId.eq(board.id))
        .count(db)
        .await
        .map_err(error::ErrorInternalServerError)?;
    let pager = Pager::new(query.page.unwrap_or(1), total, TOPICS_PER_PAGE)
        .ok_or_else(|| error::ErrorNotFound("Invalid page."))?;

    let topics = topics_with_replies(board.id)
        .limit(TOPICS_PER_PAGE as u64)
        .offset(pager.offset(TOPICS_PER_PAGE))
        .into_model::<TopicForTemplate>()
        .all(db)
        .await
        .map_err(error::ErrorInternalServerError)?;

    Ok(BoardTemplate {
        client,
        board,
        topics,
        pager,
    }
    .to_response())
}

#[get("/boards/{board_id}/new/")]
pub async fn view_new_topic(
    client: ClientCtx,
    path: web::Path<i32>,
    req: HttpRequest,
) -> Result<HttpResponse, Error> {
    if !client.is_user() {
        return Ok(redirect_to_login(req.path()));
    }

    let board = get_board(get_db_pool(), path.into_inner())
        .await
        .map_err(error::ErrorInternalServerError)?
        .ok_or_else(|| error::ErrorNotFound("Board not found."))?;

    Ok(NewTopicTemplate {
        client,
        board,
        subject: String::new(),
        message: String::new(),
        errors: Vec::new(),
    }
    .to_response())
}

#[post("/boards/{board_id}/new/")]
pub async fn create_topic(
    client: ClientCtx,
    path: web::Path<i32>,
    form: web::Form<NewTopicFormData>,
    req: HttpRequest,
) -> Result<HttpResponse, Error> {
    let user_id = match client.get_id() {
        Some(id) => id,
        None => return Ok(redirect_to_login(req.path())),
    };

    let db = get_db_pool();
    let board = get_board(db, path.into_inner())
        .await
        .map_err(error::ErrorInternalServerError)?
        .ok_or_else(|| error::ErrorNotFound("Board not found."))?;

    // Run form data through validator.
    let data = match validate_topic_form(&form) {
        Ok(data) => data,
        Err(errors) => {
            return Ok(NewTopicTemplate {
                client,
                board,
                subject: form.subject.to_owned(),
                message: form.message.to_owned(),
                errors,
            }
            .to_response())
        }
    };

    let now = Utc::now().naive_utc();

    // The topic and its opening post go in together or not at all.
    let txn = db.begin().await.map_err(error::ErrorInternalServerError)?;

    let topic_res = topics::Entity::insert(topics::ActiveModel {
        subject: Set(data.subject),
        last_updated: Set(now),
        views: Set(0),
        board_id: Set(board.id),
        starting_user_id: Set(user_id),
        ..Default::default()
    })
    .exec(&txn)
    .await
    .map_err(error::ErrorInternalServerError)?;

    posts::Entity::insert(posts::ActiveModel {
        message: Set(data.message),
        created_at: Set(now),
        updated_at: Set(None),
        topic_id: Set(topic_res.last_insert_id),
        created_by_id: Set(user_id),
        updated_by_id: Set(None),
        ..Default::default()
    })
    .exec(&txn)
    .await
    .map_err(error::ErrorInternalServerError)?;

    txn.commit().await.map_err(error::ErrorInternalServerError)?;

    Ok(HttpResponse::Found()
        .append_header((
            "Location",
            format!("/boards/{}/topics/{}/", board.id, topic_res.last_insert_id),
        ))
        .finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, QueryTrait};

    #[test]
    fn topic_listing_scopes_board_and_annotates_replies() {
        let sql = topics_with_replies(7)
            .build(DatabaseBackend::Postgres)
            .to_string();
        assert!(sql.contains("\"board_id\" = 7"));
        assert!(sql.contains("AS \"reply_count\""));
        assert!(sql.contains("GROUP BY \"topics\".\"id\""));
        assert!(sql.contains("ORDER BY \"topics\".\"last_updated\" DESC"));
    }

    #[test]
    fn topic_form_requires_subject_and_message() {
        let errors = validate_topic_form(&NewTopicFormData {
            subject: "  ".to_owned(),
            message: "".to_owned(),
        })
        .unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn topic_form_rejects_oversized_subject() {
        let errors = validate_topic_form(&NewTopicFormData {
            subject: "x".repeat(SUBJECT_MAX + 1),
            message: "hello".to_owned(),
        })
        .unwrap_err();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn topic_form_trims_input() {
        let data = validate_topic_form(&NewTopicFormData {
            subject: "  Shitstorm  ".to_owned(),
            message: "  You suck.  ".to_owned(),
        })
        .unwrap();
        assert_eq!(data.subject, "Shitstorm");
        assert_eq!(data.message, "You suck.");
    }
}

use crate::get_db_pool;
use crate::login::redirect_to_login;
use crate::middleware::ClientCtx;
use crate::orm::users;
use crate::session::remove_sessions_for_user;
use crate::user::delete_user;
use actix_session::Session;
use actix_web::{error, get, post, web, Error, HttpRequest, HttpResponse};
use askama_actix::{Template, TemplateToResponse};
use sea_orm::{entity::*, query::*, sea_query::Expr};
use serde::Deserialize;

#[derive(Template)]
#[template(path = "account.html")]
pub struct AccountTemplate {
    pub client: ClientCtx,
    pub email: String,
    pub errors: Vec<String>,
}

#[derive(Deserialize)]
pub struct FormData {
    pub email: String,
}

#[get("/settings/account/")]
pub async fn view_account(client: ClientCtx, req: HttpRequest) -> Result<HttpResponse, Error> {
    let user_id = match client.get_id() {
        Some(id) => id,
        None => return Ok(redirect_to_login(req.path())),
    };

    let user = users::Entity::find_by_id(user_id)
        .one(get_db_pool())
        .await
        .map_err(error::ErrorInternalServerError)?
        .ok_or_else(|| error::ErrorNotFound("User not found."))?;

    Ok(AccountTemplate {
        client,
        email: user.email,
        errors: Vec::new(),
    }
    .to_response())
}

#[post("/settings/account/")]
pub async fn update_account(
    client: ClientCtx,
    form: web::Form<FormData>,
    req: HttpRequest,
) -> Result<HttpResponse, Error> {
    let user_id = match client.get_id() {
        Some(id) => id,
        None => return Ok(redirect_to_login(req.path())),
    };

    let email = form.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Ok(AccountTemplate {
            client,
            email: form.email.to_owned(),
            errors: vec!["Enter a valid email address.".to_owned()],
        }
        .to_response());
    }

    users::Entity::update_many()
        .col_expr(users::Column::Email, Expr::value(email))
        .filter(users::Column::Id.eq(user_id))
        .exec(get_db_pool())
        .await
        .map_err(error::ErrorInternalServerError)?;

    Ok(HttpResponse::Found()
        .append_header(("Location", "/settings/account/"))
        .finish())
}

/// Removing an account keeps its topics and posts; they fall to the
/// deleted-user sentinel.
#[post("/settings/account/delete/")]
pub async fn delete_account(
    client: ClientCtx,
    cookies: Session,
    req: HttpRequest,
) -> Result<HttpResponse, Error> {
    let user_id = match client.get_id() {
        Some(id) => id,
        None => return Ok(redirect_to_login(req.path())),
    };

    let db = get_db_pool();
    remove_sessions_for_user(db, user_id)
        .await
        .map_err(error::ErrorInternalServerError)?;
    delete_user(db, user_id)
        .await
        .map_err(error::ErrorInternalServerError)?;
    cookies.purge();

    Ok(HttpResponse::Found()
        .append_header(("Location", "/"))
        .finish())
}

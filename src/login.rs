use crate::get_db_pool;
use crate::middleware::ClientCtx;
use crate::orm::users;
use crate::session::new_session;
use crate::user::verify_password;
use actix_session::Session;
use actix_web::{error, get, post, web, Error, HttpResponse};
use askama_actix::{Template, TemplateToResponse};
use sea_orm::{entity::*, query::*};
use serde::Deserialize;

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub client: ClientCtx,
    pub username: String,
    pub next: String,
    pub errors: Vec<String>,
}

#[derive(Deserialize)]
pub struct FormData {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub next: String,
}

#[derive(Deserialize)]
pub struct NextQuery {
    #[serde(default)]
    pub next: String,
}

/// 302 to the login form, round-tripping the protected path.
pub fn redirect_to_login(next: &str) -> HttpResponse {
    HttpResponse::Found()
        .append_header(("Location", format!("/login/?next={}", next)))
        .finish()
}

#[get("/login/")]
pub async fn view_login(
    client: ClientCtx,
    query: web::Query<NextQuery>,
) -> Result<HttpResponse, Error> {
    Ok(LoginTemplate {
        client,
        username: String::new(),
        next: query.next.to_owned(),
        errors: Vec::new(),
    }
    .to_response())
}

#[post("/login/")]
pub async fn post_login(
    client: ClientCtx,
    cookies: Session,
    form: web::Form<FormData>,
) -> Result<HttpResponse, Error> {
    let db = get_db_pool();
    let user = users::Entity::find()
        .filter(users::Column::Name.eq(form.username.as_str()))
        .one(db)
        .await
        .map_err(error::ErrorInternalServerError)?;

    // The sentinel account falls through here too: its password column is
    // not a PHC string, so verification can never succeed.
    let user = match user {
        Some(user) if verify_password(&user.password, &form.password) => user,
        _ => {
            return Ok(LoginTemplate {
                client,
                username: form.username.to_owned(),
                next: form.next.to_owned(),
                errors: vec![
                    "Your username and password didn't match. Please try again.".to_owned(),
                ],
            }
            .to_response())
        }
    };

    let uuid = new_session(db, user.id)
        .await
        .map_err(error::ErrorInternalServerError)?;
    cookies
        .insert("token", uuid.to_string())
        .map_err(error::ErrorInternalServerError)?;

    // Only site-local continuations are honored.
    let location = if form.next.starts_with('/') {
        form.next.to_owned()
    } else {
        "/".to_owned()
    };
    Ok(HttpResponse::Found()
        .append_header(("Location", location))
        .finish())
}

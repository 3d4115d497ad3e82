use crate::get_db_pool;
use crate::login::redirect_to_login;
use crate::middleware::ClientCtx;
use crate::orm::{password_resets, users};
use crate::session::remove_sessions_for_user;
use crate::user::{hash_password, password_errors, verify_password};
use actix_web::{error, get, post, web, Error, HttpRequest, HttpResponse};
use askama_actix::{Template, TemplateToResponse};
use chrono::{Duration, Utc};
use sea_orm::{entity::*, query::*, sea_query::Expr, DatabaseConnection, DbErr};
use serde::Deserialize;
use uuid::Uuid;

/// Hours a reset token stays redeemable.
const RESET_TOKEN_HOURS: i64 = 24;

#[derive(Template)]
#[template(path = "password_change.html")]
pub struct PasswordChangeTemplate {
    pub client: ClientCtx,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "password_change_done.html")]
pub struct PasswordChangeDoneTemplate {
    pub client: ClientCtx,
}

#[derive(Template)]
#[template(path = "password_reset.html")]
pub struct PasswordResetTemplate {
    pub client: ClientCtx,
    pub email: String,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "password_reset_done.html")]
pub struct PasswordResetDoneTemplate {
    pub client: ClientCtx,
}

#[derive(Template)]
#[template(path = "password_reset_confirm.html")]
pub struct PasswordResetConfirmTemplate {
    pub client: ClientCtx,
    pub token: String,
    pub valid: bool,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "password_reset_complete.html")]
pub struct PasswordResetCompleteTemplate {
    pub client: ClientCtx,
}

#[derive(Deserialize)]
pub struct ChangeFormData {
    pub old_password: String,
    pub new_password1: String,
    pub new_password2: String,
}

#[derive(Deserialize)]
pub struct ResetFormData {
    pub email: String,
}

#[derive(Deserialize)]
pub struct ConfirmFormData {
    pub new_password1: String,
    pub new_password2: String,
}

#[get("/settings/password/")]
pub async fn view_password_change(
    client: ClientCtx,
    req: HttpRequest,
) -> Result<HttpResponse, Error> {
    if !client.is_user() {
        return Ok(redirect_to_login(req.path()));
    }
    Ok(PasswordChangeTemplate {
        client,
        errors: Vec::new(),
    }
    .to_response())
}

#[post("/settings/password/")]
pub async fn update_password(
    client: ClientCtx,
    form: web::Form<ChangeFormData>,
    req: HttpRequest,
) -> Result<HttpResponse, Error> {
    let user_id = match client.get_id() {
        Some(id) => id,
        None => return Ok(redirect_to_login(req.path())),
    };

    let db = get_db_pool();
    let user = users::Entity::find_by_id(user_id)
        .one(db)
        .await
        .map_err(error::ErrorInternalServerError)?
        .ok_or_else(|| error::ErrorNotFound("User not found."))?;

    let mut errors = Vec::new();
    if !verify_password(&user.password, &form.old_password) {
        errors.push("Your old password was entered incorrectly. Please enter it again.".to_owned());
    }
    errors.extend(password_errors(&form.new_password1, &form.new_password2));
    if !errors.is_empty() {
        return Ok(PasswordChangeTemplate { client, errors }.to_response());
    }

    set_user_password(db, user.id, &form.new_password1).await?;

    Ok(HttpResponse::Found()
        .append_header(("Location", "/settings/password/done/"))
        .finish())
}

#[get("/settings/password/done/")]
pub async fn view_password_change_done(
    client: ClientCtx,
    req: HttpRequest,
) -> Result<HttpResponse, Error> {
    if !client.is_user() {
        return Ok(redirect_to_login(req.path()));
    }
    Ok(PasswordChangeDoneTemplate { client }.to_response())
}

#[get("/reset/")]
pub async fn view_password_reset(client: ClientCtx) -> Result<HttpResponse, Error> {
    Ok(PasswordResetTemplate {
        client,
        email: String::new(),
        errors: Vec::new(),
    }
    .to_response())
}

#[post("/reset/")]
pub async fn post_password_reset(
    client: ClientCtx,
    form: web::Form<ResetFormData>,
) -> Result<HttpResponse, Error> {
    let email = form.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Ok(PasswordResetTemplate {
            client,
            email: form.email.to_owned(),
            errors: vec!["Enter a valid email address.".to_owned()],
        }
        .to_response());
    }

    let db = get_db_pool();
    let user = users::Entity::find()
        .filter(users::Column::Email.eq(email))
        .one(db)
        .await
        .map_err(error::ErrorInternalServerError)?;

    // Whether the address is known stays unrevealed; the redirect is the
    // same either way.
    if let Some(user) = user {
        let token = Uuid::new_v4();
        let now = Utc::now().naive_utc();
        password_resets::Entity::insert(password_resets::ActiveModel {
            id: Set(token.to_string()),
            user_id: Set(user.id),
            created_at: Set(now),
            expires_at: Set(now + Duration::hours(RESET_TOKEN_HOURS)),
        })
        .exec(db)
        .await
        .map_err(error::ErrorInternalServerError)?;

        // The mail transport is disabled (see Cargo.toml); surface the
        // link through the log instead.
        log::info!("password reset link for {}: /reset/{}/", user.name, token);
    }

    Ok(HttpResponse::Found()
        .append_header(("Location", "/reset/done/"))
        .finish())
}

#[get("/reset/done/")]
pub async fn view_password_reset_done(client: ClientCtx) -> Result<HttpResponse, Error> {
    Ok(PasswordResetDoneTemplate { client }.to_response())
}

#[get("/reset/complete/")]
pub async fn view_password_reset_complete(client: ClientCtx) -> Result<HttpResponse, Error> {
    Ok(PasswordResetCompleteTemplate { client }.to_response())
}

#[get("/reset/{token}/")]
pub async fn view_password_reset_confirm(
    client: ClientCtx,
    path: web::Path<String>,
) -> Result<HttpResponse, Error> {
    let token = path.into_inner();
    let reset = get_valid_reset(get_db_pool(), &token)
        .await
        .map_err(error::ErrorInternalServerError)?;

    Ok(PasswordResetConfirmTemplate {
        client,
        valid: reset.is_some(),
        token,
        errors: Vec::new(),
    }
    .to_response())
}

#[post("/reset/{token}/")]
pub async fn post_password_reset_confirm(
    client: ClientCtx,
    path: web::Path<String>,
    form: web::Form<ConfirmFormData>,
) -> Result<HttpResponse, Error> {
    let token = path.into_inner();
    let db = get_db_pool();

    let reset = match get_valid_reset(db, &token)
        .await
        .map_err(error::ErrorInternalServerError)?
    {
        Some(reset) => reset,
        None => {
            return Ok(PasswordResetConfirmTemplate {
                client,
                valid: false,
                token,
                errors: Vec::new(),
            }
            .to_response())
        }
    };

    let errors = password_errors(&form.new_password1, &form.new_password2);
    if !errors.is_empty() {
        return Ok(PasswordResetConfirmTemplate {
            client,
            valid: true,
            token,
            errors,
        }
        .to_response());
    }

    set_user_password(db, reset.user_id, &form.new_password1).await?;

    // The token is single-use, and existing sessions do not survive a
    // reset.
    password_resets::Entity::delete_many()
        .filter(password_resets::Column::Id.eq(reset.id))
        .exec(db)
        .await
        .map_err(error::ErrorInternalServerError)?;
    remove_sessions_for_user(db, reset.user_id)
        .await
        .map_err(error::ErrorInternalServerError)?;

    Ok(HttpResponse::Found()
        .append_header(("Location", "/reset/complete/"))
        .finish())
}

/// Finds a reset row that has not passed its expiry.
async fn get_valid_reset(
    db: &DatabaseConnection,
    token: &str,
) -> Result<Option<password_resets::Model>, DbErr> {
    let reset = password_resets::Entity::find_by_id(token.to_owned())
        .one(db)
        .await?;
    Ok(reset.filter(|r| r.expires_at > Utc::now().naive_utc()))
}

async fn set_user_password(
    db: &DatabaseConnection,
    user_id: i32,
    password: &str,
) -> Result<(), Error> {
    let password_hash = hash_password(password).map_err(error::ErrorInternalServerError)?;
    users::Entity::update_many()
        .col_expr(users::Column::Password, Expr::value(password_hash))
        .filter(users::Column::Id.eq(user_id))
        .exec(db)
        .await
        .map_err(error::ErrorInternalServerError)?;
    Ok(())
}

use crate::get_db_pool;
use crate::middleware::ClientCtx;
use crate::orm::users;
use crate::session::new_session;
use crate::user::{hash_password, password_errors, DELETED_USER_NAME};
use actix_session::Session;
use actix_web::{error, get, post, web, Error, HttpResponse};
use askama_actix::{Template, TemplateToResponse};
use chrono::Utc;
use sea_orm::{entity::*, query::*, DatabaseConnection, DbErr, InsertResult};
use serde::Deserialize;

pub const USERNAME_MAX: usize = 150;

#[derive(Template)]
#[template(path = "signup.html")]
pub struct SignupTemplate {
    pub client: ClientCtx,
    pub username: String,
    pub email: String,
    pub errors: Vec<String>,
}

#[derive(Deserialize)]
pub struct FormData {
    pub username: String,
    pub email: String,
    pub password1: String,
    pub password2: String,
}

#[derive(Debug)]
pub struct NewUserData {
    pub name: String,
    pub email: String,
    pub password: String,
}

pub fn validate_signup_form(form: &FormData) -> Result<NewUserData, Vec<String>> {
    let mut errors = Vec::new();

    let name = form.username.trim();
    if name.is_empty() {
        errors.push("The username field is required.".to_owned());
    } else if name.chars().count() > USERNAME_MAX {
        errors.push(format!(
            "Ensure the username has at most {} characters.",
            USERNAME_MAX
        ));
    } else if name == DELETED_USER_NAME {
        errors.push("This username is reserved.".to_owned());
    }

    let email = form.email.trim();
    if email.is_empty() || !email.contains('@') {
        errors.push("Enter a valid email address.".to_owned());
    }

    errors.extend(password_errors(&form.password1, &form.password2));

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(NewUserData {
        name: name.to_owned(),
        email: email.to_owned(),
        password: form.password1.to_owned(),
    })
}

async fn insert_new_user(
    db: &DatabaseConnection,
    name: &str,
    email: &str,
    pass: &str,
) -> Result<InsertResult<users::ActiveModel>, DbErr> {
    let user = users::ActiveModel {
        created_at: Set(Utc::now().naive_utc()),
        name: Set(name.to_owned()),
        email: Set(email.to_owned()),
        password: Set(pass.to_owned()),
        ..Default::default() // all other attributes are `Unset`
    };
    users::Entity::insert(user).exec(db).await
}

#[get("/signup/")]
pub async fn create_user_get(client: ClientCtx) -> Result<HttpResponse, Error> {
    Ok(SignupTemplate {
        client,
        username: String::new(),
        email: String::new(),
        errors: Vec::new(),
    }
    .to_response())
}

#[post("/signup/")]
pub async fn create_user_post(
    client: ClientCtx,
    cookies: Session,
    form: web::Form<FormData>,
) -> Result<HttpResponse, Error> {
    let data = match validate_signup_form(&form) {
        Ok(data) => data,
        Err(errors) => {
            return Ok(SignupTemplate {
                client,
                username: form.username.to_owned(),
                email: form.email.to_owned(),
                errors,
            }
            .to_response())
        }
    };

    let db = get_db_pool();
    let taken = users::Entity::find()
        .filter(users::Column::Name.eq(data.name.as_str()))
        .one(db)
        .await
        .map_err(error::ErrorInternalServerError)?;
    if taken.is_some() {
        return Ok(SignupTemplate {
            client,
            username: form.username.to_owned(),
            email: form.email.to_owned(),
            errors: vec!["A user with that username already exists.".to_owned()],
        }
        .to_response());
    }

    let password_hash = hash_password(&data.password).map_err(error::ErrorInternalServerError)?;
    let res = insert_new_user(db, &data.name, &data.email, &password_hash)
        .await
        .map_err(error::ErrorInternalServerError)?;

    // Sign the new account in right away.
    let uuid = new_session(db, res.last_insert_id)
        .await
        .map_err(error::ErrorInternalServerError)?;
    cookies
        .insert("token", uuid.to_string())
        .map_err(error::ErrorInternalServerError)?;

    Ok(HttpResponse::Found()
        .append_header(("Location", "/"))
        .finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(username: &str, email: &str, p1: &str, p2: &str) -> FormData {
        FormData {
            username: username.to_owned(),
            email: email.to_owned(),
            password1: p1.to_owned(),
            password2: p2.to_owned(),
        }
    }

    #[test]
    fn signup_accepts_a_complete_form() {
        let data =
            validate_signup_form(&form("test_user", "user@test.com", "test_password", "test_password"))
                .unwrap();
        assert_eq!(data.name, "test_user");
        assert_eq!(data.email, "user@test.com");
    }

    #[test]
    fn signup_rejects_an_empty_form() {
        let errors = validate_signup_form(&form("", "", "", "")).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn signup_rejects_mismatched_passwords() {
        let errors =
            validate_signup_form(&form("test_user", "user@test.com", "test_password", "other_password"))
                .unwrap_err();
        assert_eq!(errors, vec!["The two password fields didn't match.".to_owned()]);
    }

    #[test]
    fn signup_rejects_the_reserved_name() {
        let errors =
            validate_signup_form(&form(DELETED_USER_NAME, "user@test.com", "test_password", "test_password"))
                .unwrap_err();
        assert_eq!(errors.len(), 1);
    }
}

use crate::get_db_pool;
use crate::middleware::ClientCtx;
use crate::orm::boards;
use actix_web::{error, get, Error, HttpResponse};
use askama_actix::{Template, TemplateToResponse};
use sea_orm::{entity::*, query::*};

#[derive(Template)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub client: ClientCtx,
    pub boards: Vec<boards::Model>,
}

#[get("/")]
pub async fn view_index(client: ClientCtx) -> Result<HttpResponse, Error> {
    let boards = boards::Entity::find()
        .order_by_asc(boards::Column::Name)
        .all(get_db_pool())
        .await
        .map_err(error::ErrorInternalServerError)?;

    Ok(HomeTemplate { client, boards }.to_response())
}

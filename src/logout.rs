use crate::get_db_pool;
use crate::session::remove_session;
use actix_web::{get, Error, HttpResponse};
use uuid::Uuid;

#[get("/logout/")]
pub async fn view_logout(cookies: actix_session::Session) -> Result<HttpResponse, Error> {
    match cookies.get::<String>("token") {
        Ok(Some(token)) => match Uuid::parse_str(&token) {
            Ok(uuid) => {
                if let Err(e) = remove_session(get_db_pool(), uuid).await {
                    log::error!("view_logout: remove_session() {}", e);
                }
            }
            Err(e) => {
                log::error!("view_logout: parse_str() {}", e);
            }
        },
        Ok(None) => {}
        Err(e) => {
            log::error!("view_logout: cookies.get() {}", e);
        }
    }

    cookies.purge();
    Ok(HttpResponse::Found()
        .append_header(("Location", "/"))
        .finish())
}

pub mod error;

/// Configures the web app
///
/// @see https://docs.rs/actix-web/4.0.1/actix_web/struct.App.html#method.configure
pub fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(crate::index::view_index)
        .service(crate::create_user::create_user_get)
        .service(crate::create_user::create_user_post)
        .service(crate::login::view_login)
        .service(crate::login::post_login)
        .service(crate::logout::view_logout)
        .service(crate::account::view_account)
        .service(crate::account::update_account)
        .service(crate::account::delete_account)
        .service(crate::password::view_password_change)
        .service(crate::password::update_password)
        .service(crate::password::view_password_change_done)
        .service(crate::password::view_password_reset)
        .service(crate::password::post_password_reset)
        // Literal /reset/ segments must land before the token route.
        .service(crate::password::view_password_reset_done)
        .service(crate::password::view_password_reset_complete)
        .service(crate::password::view_password_reset_confirm)
        .service(crate::password::post_password_reset_confirm)
        .service(crate::board::view_board)
        .service(crate::board::view_new_topic)
        .service(crate::board::create_topic)
        .service(crate::topic::view_topic)
        .service(crate::topic::view_reply_form)
        .service(crate::topic::create_reply)
        .service(crate::post::edit_post)
        .service(crate::post::update_post);
}

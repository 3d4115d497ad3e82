#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::{test, App};

    #[actix_rt::test]
    async fn test_login_get() {
        let app = test::init_service(App::new().service(palaver::login::view_login)).await;
        let req = test::TestRequest::default().uri("/login/").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }

    #[actix_rt::test]
    async fn test_signup_get() {
        let app =
            test::init_service(App::new().service(palaver::create_user::create_user_get)).await;
        let req = test::TestRequest::default().uri("/signup/").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }

    #[actix_rt::test]
    async fn test_password_reset_get() {
        let app =
            test::init_service(App::new().service(palaver::password::view_password_reset)).await;
        let req = test::TestRequest::default().uri("/reset/").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }

    #[actix_rt::test]
    async fn test_new_topic_requires_login() {
        let app = test::init_service(App::new().service(palaver::board::view_new_topic)).await;
        let req = test::TestRequest::default().uri("/boards/1/new/").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        let location = resp.headers().get("Location").unwrap().to_str().unwrap();
        assert_eq!(location, "/login/?next=/boards/1/new/");
    }

    #[actix_rt::test]
    async fn test_reply_requires_login() {
        let app = test::init_service(App::new().service(palaver::topic::view_reply_form)).await;
        let req = test::TestRequest::default()
            .uri("/boards/1/topics/2/reply/")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        let location = resp.headers().get("Location").unwrap().to_str().unwrap();
        assert_eq!(location, "/login/?next=/boards/1/topics/2/reply/");
    }

    #[actix_rt::test]
    async fn test_edit_post_requires_login() {
        let app = test::init_service(App::new().service(palaver::post::edit_post)).await;
        let req = test::TestRequest::default()
            .uri("/boards/1/topics/2/posts/3/edit/")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        let location = resp.headers().get("Location").unwrap().to_str().unwrap();
        assert_eq!(location, "/login/?next=/boards/1/topics/2/posts/3/edit/");
    }

    #[actix_rt::test]
    async fn test_password_change_requires_login() {
        let app =
            test::init_service(App::new().service(palaver::password::view_password_change)).await;
        let req = test::TestRequest::default()
            .uri("/settings/password/")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        let location = resp.headers().get("Location").unwrap().to_str().unwrap();
        assert_eq!(location, "/login/?next=/settings/password/");
    }
}

pub mod error;
mod events;
mod extract;
mod handlers;
mod middleware;
pub mod rate_limit;
mod state;

pub use error::ApiError;
pub use middleware::RequestContext;
pub use rate_limit::RateLimiter;
pub use state::{HttpOptions, HttpState};

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use sqlx::Error as SqlxError;

use crate::application::error::ErrorReport;

use handlers::{
    answers, articles, challenges, comments, communities, notifications, polls, questions, tags,
    users,
};
use middleware::{log_responses, rate_limit, resolve_principal, set_request_context};

fn db_health_response(result: Result<(), SqlxError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

async fn db_health(State(state): State<HttpState>) -> Response {
    db_health_response(state.db.health_check().await)
}

pub fn build_router(state: HttpState) -> Router {
    let auth_state = state.clone();
    let rate_state = state.clone();

    Router::new()
        .route("/user/register", post(users::register))
        .route("/user/login", post(users::login))
        .route("/user/logout", post(users::logout))
        .route("/user/me", get(users::me).patch(users::update_me))
        .route("/user", get(users::list_users))
        .route("/user/{username}", get(users::get_user))
        .route(
            "/question",
            get(questions::list_questions).post(questions::create_question),
        )
        .route(
            "/question/{id}",
            get(questions::get_question)
                .patch(questions::update_question)
                .delete(questions::delete_question),
        )
        .route("/question/{id}/vote", post(questions::vote_question))
        .route("/question/{id}/accept", post(questions::accept_answer))
        .route(
            "/question/{id}/comments",
            get(comments::list_question_comments).post(comments::add_question_comment),
        )
        .route(
            "/answer",
            get(answers::list_answers).post(answers::create_answer),
        )
        .route("/answer/{id}", delete(answers::delete_answer))
        .route("/answer/{id}/vote", post(answers::vote_answer))
        .route(
            "/answer/{id}/comments",
            get(comments::list_answer_comments).post(comments::add_answer_comment),
        )
        .route("/comment/{id}", delete(comments::delete_comment))
        .route("/comment/{id}/vote", post(comments::vote_comment))
        .route("/tag", get(tags::list_tags))
        .route("/tag/{name}", get(tags::get_tag))
        .route(
            "/community",
            get(communities::list_communities).post(communities::create_community),
        )
        .route("/community/{slug}", get(communities::get_community))
        .route("/community/{slug}/members", get(communities::list_members))
        .route("/community/{slug}/join", post(communities::join_community))
        .route("/community/{slug}/leave", post(communities::leave_community))
        .route("/poll", get(polls::list_polls).post(polls::create_poll))
        .route("/poll/{id}", get(polls::get_poll))
        .route("/poll/{id}/vote", post(polls::vote_poll))
        .route("/poll/{id}/close", post(polls::close_poll))
        .route(
            "/article",
            get(articles::list_articles).post(articles::create_article),
        )
        .route(
            "/article/{id}",
            get(articles::get_article)
                .patch(articles::update_article)
                .delete(articles::delete_article),
        )
        .route("/article/{id}/vote", post(articles::vote_article))
        .route(
            "/article/{id}/comments",
            get(comments::list_article_comments).post(comments::add_article_comment),
        )
        .route("/notification", get(notifications::list_notifications))
        .route(
            "/notification/unread-count",
            get(notifications::unread_count),
        )
        .route("/notification/{id}/read", post(notifications::mark_read))
        .route("/notification/read-all", post(notifications::mark_all_read))
        .route("/challenge", get(challenges::list_challenges))
        .route("/challenge/progress", get(challenges::my_progress))
        .route("/events", get(events::live_events))
        .route("/health/db", get(db_health))
        .with_state(state)
        .layer(axum_middleware::from_fn_with_state(rate_state, rate_limit))
        .layer(axum_middleware::from_fn_with_state(
            auth_state,
            resolve_principal,
        ))
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

//! Movie endpoints
//!
//! Public:
//! - GET /movies - All movies, newest first
//! - GET /movies/{id} - Detail page
//!
//! Logged in:
//! - GET/POST /movies/add - Add form and submission
//! - GET /movies/my/movies - The caller's movies
//!
//! Logged in and owner:
//! - GET /movies/{id}/edit - Edit form
//! - POST|PUT /movies/{id} - Update
//! - POST /movies/{id}/delete, DELETE /movies/{id} - Delete

use axum::{
    extract::{Path, State},
    response::Response,
    Form,
};
use tera::Context as TeraContext;

use crate::api::context::{redirect_with, render, CurrentUser, RequestContext};
use crate::api::error::{BounceExt, Rejection};
use crate::api::extract::{parse_movie_id, OwnedMovie};
use crate::api::AppState;
use crate::models::{MovieForm, MovieWithOwner, Notices};
use crate::views::movie_form_context;

type FormPairs = Form<Vec<(String, String)>>;

fn list_context(movies: &[MovieWithOwner], my_movies: bool) -> TeraContext {
    let mut context = TeraContext::new();
    context.insert("movies", movies);
    context.insert("my_movies", &my_movies);
    context
}

/// GET /movies
pub async fn list(State(state): State<AppState>, ctx: RequestContext) -> Result<Response, Rejection> {
    let movies = state.movie_service.list_all().await?;
    render(&state, &ctx, "movies/list.html", "All Movies", list_context(&movies, false))
}

/// GET /movies/my/movies
pub async fn my_movies(
    State(state): State<AppState>,
    ctx: RequestContext,
    user: CurrentUser,
) -> Result<Response, Rejection> {
    let movies = state.movie_service.list_by_owner(user.id).await?;
    render(&state, &ctx, "movies/list.html", "My Movies", list_context(&movies, true))
}

/// GET /movies/add
pub async fn add_page(State(state): State<AppState>, ctx: RequestContext) -> Result<Response, Rejection> {
    render(
        &state,
        &ctx,
        "movies/add.html",
        "Add Movie",
        movie_form_context("/movies/add", "Add Movie", None),
    )
}

/// POST /movies/add
pub async fn add(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(pairs): FormPairs,
) -> Result<Response, Rejection> {
    let form = MovieForm::from_pairs(pairs);
    state
        .movie_service
        .create(user.id, &form)
        .await
        .bounce_to("/movies/add")?;

    Ok(redirect_with("/movies", Notices::success("Movie added successfully!")))
}

/// GET /movies/{id}
pub async fn view(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(raw_id): Path<String>,
) -> Result<Response, Rejection> {
    let id = parse_movie_id(&raw_id)?;
    let movie = state.movie_service.get_with_owner(id).await?;
    let is_owner = ctx.user_id().is_some_and(|uid| movie.movie.is_owned_by(uid));

    let mut context = TeraContext::new();
    context.insert("movie", &movie);
    context.insert("is_owner", &is_owner);
    render(&state, &ctx, "movies/view.html", &movie.movie.name, context)
}

/// GET /movies/{id}/edit
pub async fn edit_page(
    State(state): State<AppState>,
    ctx: RequestContext,
    OwnedMovie(movie): OwnedMovie,
) -> Result<Response, Rejection> {
    let action = format!("/movies/{}", movie.id);
    render(
        &state,
        &ctx,
        "movies/edit.html",
        "Edit Movie",
        movie_form_context(&action, "Update Movie", Some(&movie)),
    )
}

/// POST|PUT /movies/{id}
pub async fn update(
    State(state): State<AppState>,
    OwnedMovie(movie): OwnedMovie,
    Form(pairs): FormPairs,
) -> Result<Response, Rejection> {
    let form = MovieForm::from_pairs(pairs);
    let updated = state
        .movie_service
        .update(&movie, &form)
        .await
        .bounce_to(format!("/movies/{}/edit", movie.id))?;

    Ok(redirect_with(
        &format!("/movies/{}", updated.id),
        Notices::success("Movie updated successfully!"),
    ))
}

/// POST /movies/{id}/delete, DELETE /movies/{id}
pub async fn delete(
    State(state): State<AppState>,
    OwnedMovie(movie): OwnedMovie,
) -> Result<Response, Rejection> {
    state.movie_service.delete(&movie).await?;
    Ok(redirect_with("/movies", Notices::success("Movie deleted successfully!")))
}

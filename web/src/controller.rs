use actix_multipart::Multipart;
use actix_web::{delete, get, post, web, HttpResponse};
use serde_json::json;
use tokio_util::io::ReaderStream;

use crate::{
    app_data::AppData,
    app_error::Responce,
    form::UserForm,
    image::{retrieve, ImageBody},
    services::*,
};

pub fn route(cfg: &mut web::ServiceConfig) {
    cfg.service(health)
        .service(create_user)
        .service(get_users)
        .service(get_user_image)
        .service(delete_user);
}

#[get("/api/test")]
async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "message": "API is working" }))
}

#[post("/api/users")]
async fn create_user(payload: Multipart, st: web::Data<AppData>) -> Responce {
    let form = UserForm::read(payload, &st.storage).await?;
    let user = UserService::create(form, &st).await?;
    Ok(HttpResponse::Created().json(user))
}

#[get("/api/users")]
async fn get_users(st: web::Data<AppData>) -> Responce {
    let users = UserService::find_many(&st).await?;
    Ok(HttpResponse::Ok().json(users))
}

#[get("/api/users/image/{id}")]
async fn get_user_image(id: web::Path<String>, st: web::Data<AppData>) -> Responce {
    let image = retrieve(st.store.as_ref(), &id).await?;
    let mut resp = HttpResponse::Ok();
    resp.content_type(image.content_type);
    Ok(match image.body {
        ImageBody::File(file) => resp.streaming(ReaderStream::new(file)),
        ImageBody::Bytes(bytes) => resp.body(bytes),
    })
}

#[delete("/api/users/{id}")]
async fn delete_user(id: web::Path<String>, st: web::Data<AppData>) -> Responce {
    UserService::delete(&id, &st).await?;
    Ok(HttpResponse::NoContent().finish())
}

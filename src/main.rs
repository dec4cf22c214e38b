use actix::Actor;
use actix_web::{
    self, App, HttpServer,
    middleware::{Logger, from_fn},
    web,
};
use std::sync::{Arc, LazyLock};

use crate::modules::{
    conversation::{repository_pg::ConversationPgRepository, service::ConversationService},
    message::{
        repository_pg::{MessagePgRepository, ReactionPgRepository, ReadReceiptPgRepository},
        service::MessageService,
    },
    realtime::{handler::realtime_handler, server::RealtimeServer},
    storage::service::AttachmentStorage,
};

mod api;
mod configs;
mod constants;
mod middlewares;
mod modules;
#[cfg(test)]
mod test;
mod utils;

pub static ENV: LazyLock<constants::Env> = LazyLock::new(|| {
    dotenvy::dotenv().ok();
    env_logger::init();
    log::info!("Environment variables loaded from .env file");
    constants::Env::default()
});

#[actix_web::get("/")]
async fn health_check() -> &'static str {
    "Server is running"
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let db_pool =
        configs::connect_database().await.map_err(|_| std::io::Error::other("Database connection error"))?;

    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .map_err(|_| std::io::Error::other("Database migration error"))?;

    let conversation_repo = Arc::new(ConversationPgRepository::new(db_pool.clone()));
    let message_repo = Arc::new(MessagePgRepository::new(db_pool.clone()));
    let reaction_repo = Arc::new(ReactionPgRepository::new(db_pool.clone()));
    let receipt_repo = Arc::new(ReadReceiptPgRepository::new(db_pool.clone()));
    let storage = Arc::new(AttachmentStorage::from_env());

    let realtime_server = RealtimeServer::new().start();

    let conversation_service = ConversationService::with_dependencies(conversation_repo.clone());
    let message_service = MessageService::with_dependencies(
        message_repo,
        conversation_repo,
        reaction_repo,
        receipt_repo,
        storage,
        Some(realtime_server.clone()),
    );

    println!("Starting server at http://{}:{}", ENV.ip.as_str(), ENV.port);
    HttpServer::new(move || {
        let cors = actix_cors::Cors::default()
            .allowed_origin(ENV.frontend_url.as_str())
            .allow_any_method()
            .allow_any_header()
            .supports_credentials();

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(web::Data::new(conversation_service.clone()))
            .app_data(web::Data::new(message_service.clone()))
            .app_data(web::Data::new(realtime_server.clone()))
            .app_data(web::Data::new(db_pool.clone()))
            .service(health_check)
            .route("/ws", web::get().to(realtime_handler))
            .service(
                web::scope("/api")
                    .wrap(from_fn(middlewares::authentication))
                    .configure(modules::conversation::route::configure)
                    .configure(modules::message::route::configure),
            )
    })
    .bind((ENV.ip.as_str(), ENV.port))?
    .workers(2)
    .run()
    .await
}

use actix_web::{get, post, web, HttpRequest};
use uuid::Uuid;

use crate::{
    api::{error, success},
    middlewares::get_claims,
    modules::conversation::{
        model::{ConversationDetail, CreateConversationRequest, MarkConversationReadRequest},
        repository_pg::ConversationPgRepository,
        service::ConversationService,
    },
    utils::ValidatedJson,
};

pub type ConversationSvc = ConversationService<ConversationPgRepository>;

#[get("/")]
pub async fn get_conversations(
    conversation_svc: web::Data<ConversationSvc>,
    req: HttpRequest,
) -> Result<success::Success<Vec<ConversationDetail>>, error::Error> {
    let user_id = get_claims(&req)?.sub;

    let conversations = conversation_svc.list_for_user(user_id).await?;

    Ok(success::Success::ok(Some(conversations)).message("Successfully retrieved conversations"))
}

#[post("/")]
pub async fn create_conversation(
    conversation_svc: web::Data<ConversationSvc>,
    body: ValidatedJson<CreateConversationRequest>,
    req: HttpRequest,
) -> Result<success::Success<ConversationDetail>, error::Error> {
    let user_id = get_claims(&req)?.sub;

    let body = body.0;

    let conversation = conversation_svc
        .create(body.title, body.participant_ids, body.is_group, user_id)
        .await?;

    Ok(success::Success::created(conversation).message("Successfully created conversation"))
}

/// Zero rows is not an error here: the body carries `data: null`.
#[get("/{conversation_id}")]
pub async fn get_conversation(
    conversation_svc: web::Data<ConversationSvc>,
    conversation_id: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<success::Success<ConversationDetail>, error::Error> {
    let user_id = get_claims(&req)?.sub;

    let conversation = conversation_svc.fetch_one(*conversation_id, user_id).await?;

    Ok(success::Success::ok(conversation))
}

#[post("/{conversation_id}/read")]
pub async fn mark_conversation_read(
    conversation_svc: web::Data<ConversationSvc>,
    conversation_id: web::Path<Uuid>,
    body: ValidatedJson<MarkConversationReadRequest>,
    req: HttpRequest,
) -> Result<success::Success<()>, error::Error> {
    let user_id = get_claims(&req)?.sub;

    conversation_svc.mark_read(*conversation_id, user_id, body.0.message_id).await?;

    Ok(success::Success::no_content())
}

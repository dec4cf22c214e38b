use actix_multipart::Multipart;
use actix_web::{delete, get, post, web, HttpRequest};
use futures_util::TryStreamExt;
use uuid::Uuid;

use crate::{
    api::{error, success},
    middlewares::get_claims,
    modules::{
        conversation::repository_pg::ConversationPgRepository,
        message::{
            model::{MessagePageQuery, MessageWithRelations, ReactionRequest},
            repository_pg::{MessagePgRepository, ReactionPgRepository, ReadReceiptPgRepository},
            schema::{ReactionEntity, ReadReceiptEntity},
            service::MessageService,
        },
        storage::model::UploadedFile,
    },
    utils::{ValidatedJson, ValidatedQuery},
};

pub type MessageSvc = MessageService<
    MessagePgRepository,
    ConversationPgRepository,
    ReactionPgRepository,
    ReadReceiptPgRepository,
>;

#[get("/{conversation_id}/messages")]
pub async fn get_messages(
    message_service: web::Data<MessageSvc>,
    conversation_id: web::Path<Uuid>,
    query: ValidatedQuery<MessagePageQuery>,
) -> Result<success::Success<Vec<MessageWithRelations>>, error::Error> {
    let messages =
        message_service.fetch_page(*conversation_id, query.0.limit, query.0.offset).await?;

    Ok(success::Success::ok(Some(messages)).message("Successfully retrieved messages"))
}

/// Multipart send: a `content` text field plus zero or more file parts.
#[post("/{conversation_id}/messages")]
pub async fn send_message(
    message_service: web::Data<MessageSvc>,
    conversation_id: web::Path<Uuid>,
    mut payload: Multipart,
    req: HttpRequest,
) -> Result<success::Success<MessageWithRelations>, error::Error> {
    let user_id = get_claims(&req)?.sub;

    let mut content = String::new();
    let mut files: Vec<UploadedFile> = Vec::new();

    while let Some(mut field) =
        payload.try_next().await.map_err(|_| error::Error::InternalServer)?
    {
        let (field_name, file_name) = {
            let Some(disposition) = field.content_disposition() else { continue };
            (
                disposition.get_name().map(str::to_string),
                disposition.get_filename().map(str::to_string),
            )
        };
        let mime_type = field.content_type().map(|m| m.to_string());

        let mut bytes = Vec::new();
        while let Some(chunk) =
            field.try_next().await.map_err(|_| error::Error::InternalServer)?
        {
            bytes.extend_from_slice(&chunk);
        }

        match (field_name.as_deref(), file_name) {
            (Some("content"), None) => {
                content = String::from_utf8(bytes)
                    .map_err(|_| error::Error::bad_request("Message content must be UTF-8"))?;
            }
            (_, Some(file_name)) => {
                files.push(UploadedFile { file_name, mime_type, bytes });
            }
            _ => {}
        }
    }

    let message = message_service.send(*conversation_id, user_id, content, files).await?;

    Ok(success::Success::created(Some(message)).message("Message sent"))
}

#[post("/{message_id}/read")]
pub async fn mark_message_read(
    message_service: web::Data<MessageSvc>,
    message_id: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<success::Success<ReadReceiptEntity>, error::Error> {
    let user_id = get_claims(&req)?.sub;

    let receipt = message_service.mark_read(*message_id, user_id).await?;

    Ok(success::Success::ok(Some(receipt)))
}

#[delete("/{message_id}")]
pub async fn delete_message(
    message_service: web::Data<MessageSvc>,
    message_id: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<success::Success<()>, error::Error> {
    let user_id = get_claims(&req)?.sub;

    message_service.delete(*message_id, user_id).await?;

    Ok(success::Success::no_content())
}

#[post("/{message_id}/reactions")]
pub async fn add_reaction(
    message_service: web::Data<MessageSvc>,
    message_id: web::Path<Uuid>,
    body: ValidatedJson<ReactionRequest>,
    req: HttpRequest,
) -> Result<success::Success<ReactionEntity>, error::Error> {
    let user_id = get_claims(&req)?.sub;

    let reaction = message_service.add_reaction(*message_id, user_id, &body.0.emoji).await?;

    Ok(success::Success::created(Some(reaction)))
}

#[delete("/{message_id}/reactions/{emoji}")]
pub async fn remove_reaction(
    message_service: web::Data<MessageSvc>,
    path: web::Path<(Uuid, String)>,
    req: HttpRequest,
) -> Result<success::Success<()>, error::Error> {
    let user_id = get_claims(&req)?.sub;
    let (message_id, emoji) = path.into_inner();

    message_service.remove_reaction(message_id, user_id, &emoji).await?;

    Ok(success::Success::no_content())
}

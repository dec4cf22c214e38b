use actix_web::web::{scope, ServiceConfig};

use crate::modules::conversation::handle::*;
use crate::modules::message::handle::{get_messages, send_message};

pub fn configure(cfg: &mut ServiceConfig) {
    cfg.service(
        scope("/conversations")
            .service(get_conversations)
            .service(create_conversation)
            .service(get_conversation)
            .service(mark_conversation_read)
            .service(get_messages)
            .service(send_message),
    );
}

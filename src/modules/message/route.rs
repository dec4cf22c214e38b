use actix_web::web::{scope, ServiceConfig};

use crate::modules::message::handle::*;

pub fn configure(cfg: &mut ServiceConfig) {
    cfg.service(
        scope("/messages")
            .service(mark_message_read)
            .service(add_reaction)
            .service(remove_reaction)
            .service(delete_message),
    );
}

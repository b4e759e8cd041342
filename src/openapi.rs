use crate::models::{Message, MessageInput, PublicMessage};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::create_message,
        crate::routes::list_messages,
        crate::routes::list_public_messages,
        crate::routes::health,
    ),
    components(schemas(Message, MessageInput, PublicMessage)),
    tags(
        (name = "messages", description = "Guestbook submissions and listings"),
    )
)]
pub struct ApiDoc;

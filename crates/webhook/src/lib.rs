mod error;
mod sender;
mod store;
mod template;

pub use error::WebhookError;
pub use sender::{HttpWebhookPost, WebhookPost};
pub use store::TemplateStore;
pub use template::WebhookTemplate;

pub type Result<T> = std::result::Result<T, WebhookError>;

mod dom;
mod error;
mod item;
mod store;
mod template;

pub use dom::XmlNode;
pub use error::ExtractError;
pub use item::FeedItem;
pub use store::TemplateStore;
pub use template::{ExtractStep, ExtractTemplate};

pub type Result<T> = std::result::Result<T, ExtractError>;

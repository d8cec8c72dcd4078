pub mod source;
pub mod telegram;

pub use source::ApiJobSource;
pub use telegram::TelegramChannel;

//! The built-in transforms.

mod article;
mod page;
mod person;

pub use self::article::ArticleTransform;
pub use self::page::PageTransform;
pub use self::person::PersonTransform;

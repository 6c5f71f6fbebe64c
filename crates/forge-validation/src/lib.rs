pub mod cleanup;
pub mod code;
pub mod dispatch;
pub mod doc;
pub mod html;
pub mod mermaid;

pub use cleanup::{cleanup, coerce_erd_from_class_diagram};
pub use dispatch::validate_content;

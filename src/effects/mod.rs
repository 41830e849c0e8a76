// Effects domain: pipeline ownership, background images and result mapping.

pub mod background;
pub mod error;
pub mod pipeline;
pub mod status;

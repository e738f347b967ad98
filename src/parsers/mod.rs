pub mod certificate;
pub mod metadata;

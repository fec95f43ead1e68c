pub mod apply;
pub mod plan;
pub mod scan;
pub mod show;
pub mod validate;
pub mod write;

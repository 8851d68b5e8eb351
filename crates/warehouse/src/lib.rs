pub mod initializer;
pub mod schema;

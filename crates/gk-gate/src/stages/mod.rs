//! Built-in gate stages.

pub mod paths;
pub mod schema;
pub mod script;

pub use paths::PathStage;
pub use schema::SchemaStage;
pub use script::ScriptStage;

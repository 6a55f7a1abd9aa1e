pub mod echo;
pub mod sports;
pub mod weather;
mod registry;

pub use echo::EchoTool;
pub use registry::{
    json_schema_boolean, json_schema_object, json_schema_string, tool_schema, Tool, ToolRegistry,
};
pub use sports::ScoreboardTool;
pub use weather::WeatherTool;

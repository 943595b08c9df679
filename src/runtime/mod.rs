//! The dispatch runtime: routing, task execution, the function registry,
//! and the AI function-calling dispatcher.

pub mod bindings;
pub mod dispatcher;
pub mod executor;
pub mod function_registry;
pub mod providers;
pub mod router;

pub use bindings::{register_capability_functions, register_mcp_server_tools};
pub use dispatcher::{Dispatcher, LlmProvider, LlmReply, ToolCall};
pub use executor::{shape_result, Executor};
pub use function_registry::{FunctionHandler, FunctionRegistry, FunctionSchema};
pub use providers::OpenAiChatProvider;
pub use router::{RouteDecision, Router};

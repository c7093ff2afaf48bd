//! Convenience re-exports for the common case.
//!
//! ```ignore
//! use parley_rs::prelude::*;
//!
//! let client = AnthropicClient::from_env()?;
//! let tools = ToolRegistry::new().with_weather_tools()?;
//! let result = Relay::new(&client, &tools, RelayConfig::default())
//!     .run("Any weather alerts for Chicago?")
//!     .await?;
//! ```

pub use crate::{
    AnthropicClient, Block, DEFAULT_MODEL, EXTENDED_OUTPUT_BETA, Message, MessagesRequest,
    MessagesResponse, ModelTransport, Role, ThinkingConfig, ToolDefinition, TransportFuture, Usage,
    json_schema_for, quick_message,
};

pub use crate::api::cost::{CostTracker, ModelPricing, pricing_for_model};
pub use crate::api::retry::RetryConfig;
pub use crate::api::stream::StreamEvent;

pub use crate::relay::{
    CompositeEventHandler, EventHandler, FnEventHandler, LoggingHandler, NoopHandler, Relay,
    RelayConfig, RelayEvent, RelayResult,
};

pub use crate::tools::core::{FnTool, Tool, ToolFuture, ToolRegistry};
pub use crate::tools::editor::{CreateFile, InsertLine, StrReplace, ViewFile};
pub use crate::tools::shell::{CompleteTask, ExecuteBash, ExecutionContext, RestartSession};
pub use crate::tools::weather::{AlertsTool, ForecastTool, WeatherClient, WeatherReport};

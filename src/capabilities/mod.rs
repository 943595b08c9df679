//! # Capability registry and plugin adapter chain
//!
//! A capability is a live plugin instance, discovered and registered once
//! at startup. Registration wraps the plugin's `execute_capability` in a
//! fixed handler chain (auth-context injector -> middleware chain ->
//! state-management wrapper -> the plugin itself); only capability ids
//! named in the configuration's `plugins` list are routable, though every
//! registered plugin stays visible for introspection and MCP exposure.

pub mod capability;
pub mod registry;

pub use capability::{CapabilityInfo, CapabilityTrait, ContentMode};
pub use registry::{
    CapabilitiesPlugin, CapabilityHandler, CapabilityRegistry, HandlerContext, Middleware, Plugin,
    StatusPlugin,
};

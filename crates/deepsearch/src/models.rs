//! These models represent the objects passed around by the agent
//!
//! There are several different related formats we need to interact with:
//! - ai sdk useChat messages and their parts, sent from the interface to the agent
//! - ai sdk data stream parts, sent from the agent to the interface
//! - openai messages/tools, sent from the agent to the LLM
//!
//! These overlap to varying degrees. We always immediately convert those data models
//! into the internal structs using to/from helpers. Because of the need for compatibility,
//! the internal models are not an exact match to any of these formats.
pub mod message;
pub mod role;
pub mod tool;
pub mod ui;

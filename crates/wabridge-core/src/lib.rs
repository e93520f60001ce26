pub mod client;
pub mod commands;
pub mod errors;
pub mod events;
pub mod ids;
pub mod mock;

pub use client::{EventSink, MessagingClient};
pub use commands::{decode_command, DecodeError, InboundCommand};
pub use errors::ClientError;
pub use events::{ClientEvent, IncomingMessage, OutboundEvent};
pub use ids::ChatId;
pub use mock::{DestroyBehavior, MockClient};

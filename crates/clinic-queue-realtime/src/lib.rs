//! Real-time fan-out of clinic queue events.
//!
//! Connections join channels (`global`, `clinic:<id>`, `public-screen`);
//! committed turn events are pushed to the channels that care about them.
//!
//! - [`channel`]: channel identity
//! - [`auth`]: optional bearer credentials at connect time
//! - [`router`]: channel membership per connection
//! - [`dispatcher`]: which event goes to which channel
//! - [`hub`]: the task owning the router, fed by a message queue
//! - [`messages`]: JSON wire format

pub mod auth;
pub mod channel;
pub mod dispatcher;
pub mod error;
pub mod hub;
pub mod messages;
pub mod router;

pub use auth::{CredentialVerifier, StaticTokenVerifier, Viewer};
pub use channel::Channel;
pub use dispatcher::{BroadcastDispatcher, DeliveryReport};
pub use error::{RealtimeError, RealtimeResult};
pub use hub::{ClientConnection, Hub, HubHandle, HubStats};
pub use messages::{ClientCommand, ServerMessage};
pub use router::{ConnectionId, SubscriptionRouter};

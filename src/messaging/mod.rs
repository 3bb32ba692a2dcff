// Messaging - command bus, broadcast primitives and cross-thread channels

pub mod broadcast;
pub mod channels;
pub mod command;

pub use broadcast::{Broadcast, Slot, Subscription};
pub use command::{Command, CommandBus, MAX_VELOCITY};

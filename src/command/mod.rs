pub mod bus;
pub mod types;

pub use bus::{CommandBus, CommandReceiver, CommandSender, Received};
pub use types::{Command, CommandSource};

use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};

use super::types::{Command, CommandSource};

const BUS_CAPACITY: usize = 256;

/// Command bus from the presentation layer to the engine thread
pub struct CommandBus {
    tx: Sender<(Command, CommandSource)>,
    rx: Receiver<(Command, CommandSource)>,
}

impl CommandBus {
    pub fn new() -> Self {
        let (tx, rx) = bounded(BUS_CAPACITY);
        Self { tx, rx }
    }

    /// Get a sender that can be cloned and shared
    pub fn sender(&self) -> CommandSender {
        CommandSender {
            tx: self.tx.clone(),
        }
    }

    /// Get the receiving end (for the engine thread)
    pub fn receiver(&self) -> CommandReceiver {
        CommandReceiver {
            rx: self.rx.clone(),
        }
    }
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable sender for dispatching commands
#[derive(Clone)]
pub struct CommandSender {
    tx: Sender<(Command, CommandSource)>,
}

impl CommandSender {
    /// Send a command (non-blocking, drops if buffer full)
    pub fn send(&self, cmd: Command, source: CommandSource) -> bool {
        match self.tx.try_send((cmd, source)) {
            Ok(()) => true,
            Err(TrySendError::Full((cmd, _))) => {
                log::warn!("Command buffer full, dropping: {}", cmd.description());
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// What a blocking receive produced
pub enum Received {
    Command(Command, CommandSource),
    TimedOut,
    /// Every sender is gone
    Closed,
}

/// Receiver for consuming commands
#[derive(Clone)]
pub struct CommandReceiver {
    rx: Receiver<(Command, CommandSource)>,
}

impl CommandReceiver {
    /// Try to receive a command (non-blocking)
    pub fn try_recv(&self) -> Option<(Command, CommandSource)> {
        self.rx.try_recv().ok()
    }

    /// Wait up to `timeout` for the next command
    pub fn recv_timeout(&self, timeout: Duration) -> Received {
        match self.rx.recv_timeout(timeout) {
            Ok((cmd, source)) => Received::Command(cmd, source),
            Err(RecvTimeoutError::Timeout) => Received::TimedOut,
            Err(RecvTimeoutError::Disconnected) => Received::Closed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivers_in_order_with_source() {
        let bus = CommandBus::new();
        let sender = bus.sender();
        let receiver = bus.receiver();

        assert!(sender.send(Command::Start(170), CommandSource::Tui));
        assert!(sender.send(Command::Stop, CommandSource::Headless));

        assert_eq!(
            receiver.try_recv(),
            Some((Command::Start(170), CommandSource::Tui))
        );
        assert_eq!(
            receiver.try_recv(),
            Some((Command::Stop, CommandSource::Headless))
        );
        assert_eq!(receiver.try_recv(), None);
    }

    #[test]
    fn full_buffer_drops_command() {
        let bus = CommandBus::new();
        let sender = bus.sender();
        for _ in 0..BUS_CAPACITY {
            assert!(sender.send(Command::Toggle, CommandSource::Tui));
        }
        assert!(!sender.send(Command::Stop, CommandSource::Tui));
    }

    #[test]
    fn recv_timeout_reports_timeout() {
        let bus = CommandBus::new();
        let receiver = bus.receiver();
        assert!(matches!(
            receiver.recv_timeout(Duration::from_millis(1)),
            Received::TimedOut
        ));
    }
}

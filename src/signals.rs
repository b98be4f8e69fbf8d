//! Signals that end a held scope
//!
//! `sysd-scope create --hold` keeps the sentinel alive until one of
//! SIGTERM, SIGINT or SIGHUP arrives.

use tokio::signal::unix::{signal, Signal, SignalKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldSignal {
    /// SIGTERM
    Term,
    /// SIGINT, Ctrl+C
    Int,
    /// SIGHUP, controlling terminal went away
    Hup,
}

impl HoldSignal {
    pub fn name(self) -> &'static str {
        match self {
            Self::Term => "SIGTERM",
            Self::Int => "SIGINT",
            Self::Hup => "SIGHUP",
        }
    }
}

/// Must be created inside a tokio runtime
pub struct SignalHandler {
    sigterm: Signal,
    sigint: Signal,
    sighup: Signal,
}

impl SignalHandler {
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {
            sigterm: signal(SignalKind::terminate())?,
            sigint: signal(SignalKind::interrupt())?,
            sighup: signal(SignalKind::hangup())?,
        })
    }

    /// Wait for the next signal
    pub async fn wait(&mut self) -> HoldSignal {
        tokio::select! {
            _ = self.sigterm.recv() => HoldSignal::Term,
            _ = self.sigint.recv() => HoldSignal::Int,
            _ = self.sighup.recv() => HoldSignal::Hup,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::signal::{raise, Signal as NixSignal};

    #[test]
    fn test_wait_returns_raised_signal() {
        let received = tokio_test::block_on(async {
            let mut handler = SignalHandler::new().unwrap();
            raise(NixSignal::SIGHUP).unwrap();
            handler.wait().await
        });
        assert_eq!(received, HoldSignal::Hup);
    }

    #[test]
    fn test_names() {
        assert_eq!(HoldSignal::Term.name(), "SIGTERM");
        assert_eq!(HoldSignal::Int.name(), "SIGINT");
        assert_eq!(HoldSignal::Hup.name(), "SIGHUP");
    }
}

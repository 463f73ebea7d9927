//! Operator interrupt propagation
//!
//! Every point where a run can block (a WAIT, the power-cycle pause, a
//! running tool) races against [`Interrupt::triggered`] so Ctrl+C takes
//! effect immediately.

use std::future::pending;
use std::time::Duration;

use tokio::sync::watch;

use crate::common::{Error, Result};

/// Fires an [`Interrupt`]
#[derive(Debug)]
pub struct InterruptTrigger {
    tx: watch::Sender<bool>,
}

impl InterruptTrigger {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

/// Observes an operator interrupt
#[derive(Debug, Clone)]
pub struct Interrupt {
    rx: Option<watch::Receiver<bool>>,
}

impl Interrupt {
    /// Create a connected trigger and handle
    pub fn channel() -> (InterruptTrigger, Interrupt) {
        let (tx, rx) = watch::channel(false);
        (InterruptTrigger { tx }, Interrupt { rx: Some(rx) })
    }

    /// A handle that never fires
    ///
    /// Used for the emergency power-off, which must not be cancelled by the
    /// interrupt that caused it.
    pub fn never() -> Self {
        Self { rx: None }
    }

    pub fn is_triggered(&self) -> bool {
        self.rx.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
    }

    /// Resolve once the interrupt has fired
    pub async fn triggered(&self) {
        let Some(rx) = &self.rx else {
            return pending().await;
        };
        let mut rx = rx.clone();
        // A dropped trigger that never fired means no interrupt can arrive
        if rx.wait_for(|fired| *fired).await.is_err() {
            pending::<()>().await;
        }
    }

    /// Sleep unless interrupted first
    pub async fn sleep(&self, duration: Duration) -> Result<()> {
        tokio::select! {
            _ = tokio::time::sleep(duration) => Ok(()),
            _ = self.triggered() => Err(Error::Interrupted),
        }
    }
}

/// Fire the returned handle on SIGINT or SIGTERM
///
/// The handlers are registered before this returns, so a signal that
/// arrives before the listener task first runs is still caught rather than
/// killing the process. Must be called from within a runtime.
pub fn listen_for_signals() -> Interrupt {
    let (trigger, interrupt) = Interrupt::channel();
    let signals = Signals::install();
    tokio::spawn(async move {
        signals.recv().await;
        trigger.trigger();
    });
    interrupt
}

/// Registered operator signal streams
#[cfg(unix)]
struct Signals {
    streams: std::io::Result<(tokio::signal::unix::Signal, tokio::signal::unix::Signal)>,
}

#[cfg(unix)]
impl Signals {
    fn install() -> Self {
        use tokio::signal::unix::{signal, SignalKind};

        let streams = signal(SignalKind::interrupt())
            .and_then(|sigint| signal(SignalKind::terminate()).map(|sigterm| (sigint, sigterm)));
        if let Err(e) = &streams {
            tracing::warn!("Could not install signal handlers: {}", e);
        }
        Self { streams }
    }

    async fn recv(self) {
        let Ok((mut sigint, mut sigterm)) = self.streams else {
            return pending().await;
        };
        tokio::select! {
            _ = sigint.recv() => tracing::warn!("Received SIGINT (Ctrl+C)"),
            _ = sigterm.recv() => tracing::warn!("Received SIGTERM"),
        }
    }
}

#[cfg(windows)]
struct Signals {
    ctrl_c: std::io::Result<tokio::signal::windows::CtrlC>,
}

#[cfg(windows)]
impl Signals {
    fn install() -> Self {
        let ctrl_c = tokio::signal::windows::ctrl_c();
        if let Err(e) = &ctrl_c {
            tracing::warn!("Could not install Ctrl+C handler: {}", e);
        }
        Self { ctrl_c }
    }

    async fn recv(self) {
        let Ok(mut ctrl_c) = self.ctrl_c else {
            return pending().await;
        };
        ctrl_c.recv().await;
        tracing::warn!("Received Ctrl+C");
    }
}

#[cfg(not(any(unix, windows)))]
struct Signals;

#[cfg(not(any(unix, windows)))]
impl Signals {
    fn install() -> Self {
        Self
    }

    async fn recv(self) {
        if tokio::signal::ctrl_c().await.is_err() {
            pending::<()>().await;
        }
        tracing::warn!("Received Ctrl+C");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sleep_completes_without_interrupt() {
        let (_trigger, interrupt) = Interrupt::channel();
        interrupt.sleep(Duration::from_millis(5)).await.unwrap();
        assert!(!interrupt.is_triggered());
    }

    #[tokio::test]
    async fn test_sleep_is_cut_short() {
        let (trigger, interrupt) = Interrupt::channel();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.trigger();
        });

        let started = std::time::Instant::now();
        let result = interrupt.sleep(Duration::from_secs(30)).await;
        assert!(matches!(result, Err(Error::Interrupted)));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(interrupt.is_triggered());
    }

    #[tokio::test]
    async fn test_already_triggered_resolves_immediately() {
        let (trigger, interrupt) = Interrupt::channel();
        trigger.trigger();
        drop(trigger);
        let result = interrupt.sleep(Duration::from_secs(30)).await;
        assert!(matches!(result, Err(Error::Interrupted)));
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "current_thread")]
    async fn test_signal_before_first_yield_is_caught() {
        let interrupt = listen_for_signals();

        // Delivered before the listener task has had a chance to run
        let status = std::process::Command::new("kill")
            .arg("-TERM")
            .arg(std::process::id().to_string())
            .status()
            .unwrap();
        assert!(status.success());

        tokio::time::timeout(Duration::from_secs(5), interrupt.triggered())
            .await
            .expect("SIGTERM did not fire the interrupt");
        assert!(interrupt.is_triggered());
    }

    #[tokio::test]
    async fn test_never_does_not_fire() {
        let interrupt = Interrupt::never();
        assert!(!interrupt.is_triggered());
        interrupt.sleep(Duration::from_millis(1)).await.unwrap();
    }
}

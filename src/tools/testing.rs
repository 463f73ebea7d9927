//! In-process tool runner for exercising the sequencer without hardware
//!
//! [`RecordingRunner`] records every invocation and answers from a list of
//! scripted replies, matched by argument.

use std::sync::Mutex;

use async_trait::async_trait;

use super::{Interrupt, InterruptTrigger, Invocation, ToolOutput, ToolRunner};
use crate::common::{Error, Result};

/// Scripted behaviour for a matched invocation
#[derive(Debug, Clone)]
pub enum Reply {
    /// Exit 0 with this stdout
    Stdout(String),
    /// Exit nonzero with this stderr
    Fail(String),
    /// The executable cannot be started
    SpawnError(String),
    /// Behave like the operator pressed Ctrl+C while this tool ran
    Interrupt,
}

#[derive(Debug)]
struct Rule {
    needle: String,
    reply: Reply,
    once: bool,
}

/// Records invocations and replies from scripted rules
///
/// Rules are checked in insertion order; the first whose needle equals one
/// of the invocation's arguments applies. Unmatched invocations succeed with
/// empty output.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<Invocation>>,
    trigger: Option<InterruptTrigger>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire this trigger on [`Reply::Interrupt`]
    pub fn with_trigger(mut self, trigger: InterruptTrigger) -> Self {
        self.trigger = Some(trigger);
        self
    }

    /// Reply to every invocation containing `needle`
    pub fn on(self, needle: &str, reply: Reply) -> Self {
        self.push_rule(needle, reply, false);
        self
    }

    /// Reply to the next invocation containing `needle` only
    pub fn once(self, needle: &str, reply: Reply) -> Self {
        self.push_rule(needle, reply, true);
        self
    }

    fn push_rule(&self, needle: &str, reply: Reply, once: bool) {
        if let Ok(mut rules) = self.rules.lock() {
            rules.push(Rule {
                needle: needle.to_string(),
                reply,
                once,
            });
        }
    }

    /// Every invocation seen so far, in order
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Invocations containing `needle` as an argument
    pub fn calls_with(&self, needle: &str) -> Vec<Invocation> {
        self.calls()
            .into_iter()
            .filter(|inv| inv.has_arg(needle))
            .collect()
    }

    fn reply_for(&self, invocation: &Invocation) -> Option<Reply> {
        let mut rules = self.rules.lock().ok()?;
        let index = rules.iter().position(|r| invocation.has_arg(&r.needle))?;
        if rules[index].once {
            Some(rules.remove(index).reply)
        } else {
            Some(rules[index].reply.clone())
        }
    }
}

#[async_trait]
impl ToolRunner for RecordingRunner {
    async fn run(&self, invocation: &Invocation, interrupt: &Interrupt) -> Result<ToolOutput> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(invocation.clone());
        }

        match self.reply_for(invocation) {
            None => Ok(ToolOutput::default()),
            Some(Reply::Stdout(out)) => Ok(ToolOutput::from_stdout(out)),
            Some(Reply::Fail(stderr)) => Err(Error::tool_failed(&invocation.description, &stderr)),
            Some(Reply::SpawnError(e)) => Err(Error::tool_spawn(&invocation.description, e)),
            Some(Reply::Interrupt) => {
                if let Some(trigger) = &self.trigger {
                    trigger.trigger();
                }
                interrupt.triggered().await;
                Err(Error::Interrupted)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rules_and_recording() {
        let runner = RecordingRunner::new()
            .once("mean", Reply::Stdout("1.5".into()))
            .on("off", Reply::Fail("bus error".into()));

        let read = Invocation::new("python", "read").arg("mean");
        let off = Invocation::new("python", "off").arg("off");
        let never = Interrupt::never();

        assert_eq!(runner.run(&read, &never).await.unwrap().stdout, "1.5");
        // consumed; falls through to the default reply
        assert_eq!(runner.run(&read, &never).await.unwrap().stdout, "");
        assert!(runner.run(&off, &never).await.is_err());
        assert!(runner.run(&off, &never).await.is_err());

        assert_eq!(runner.calls().len(), 4);
        assert_eq!(runner.calls_with("off").len(), 2);
    }

    #[tokio::test]
    async fn test_interrupt_reply_fires_trigger() {
        let (trigger, interrupt) = Interrupt::channel();
        let runner = RecordingRunner::new()
            .with_trigger(trigger)
            .on("mean", Reply::Interrupt);

        let read = Invocation::new("python", "read").arg("mean");
        let err = runner.run(&read, &interrupt).await.unwrap_err();
        assert!(matches!(err, Error::Interrupted));
        assert!(interrupt.is_triggered());
    }
}

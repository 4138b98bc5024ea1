//! Provisioning hand-off and callback traits
//!
//! These traits keep the crate free of any particular cloud SDK, progress
//! display or prompt library. The provisioning engine receives opaque
//! resource descriptors and hands back concrete output values.

use crate::types::{ResourceDescriptor, StackOutcome, Value};
use anyhow::Result;
use std::collections::BTreeMap;

/// Everything the provisioning engine gets for one stack
#[derive(Debug)]
pub struct ProvisionRequest<'a> {
    pub stack_id: &'a str,
    /// Inputs with producer outputs already substituted
    pub inputs: &'a BTreeMap<String, Value>,
    pub resources: &'a [ResourceDescriptor],
    /// Outputs as synthesized, usually deferred tokens
    pub outputs: &'a BTreeMap<String, Value>,
}

/// External engine that turns resource descriptors into real infrastructure
///
/// Implementations return the concrete value of every declared output.
/// Those values are fed forward into the stacks that consume them.
pub trait Provisioner: Send + Sync {
    fn provision(&self, request: &ProvisionRequest<'_>) -> Result<BTreeMap<String, Value>>;
}

/// Progress callback for rollouts
///
/// Implement this trait to receive progress updates during a rollout.
pub trait ProgressCallback: Send {
    /// Called when starting a wave of independent stacks
    fn on_wave_start(&mut self, wave: usize, count: usize);

    /// Called when starting to provision a single stack
    fn on_stack_start(&mut self, stack_id: &str);

    /// Called when a stack has an outcome
    fn on_stack_complete(&mut self, stack_id: &str, outcome: &StackOutcome);

    /// Called when a wave completes
    fn on_wave_complete(&mut self);
}

/// Confirmation callback for user interaction
pub trait ConfirmCallback: Send {
    /// Ask the user to confirm an action
    ///
    /// Returns `true` if the user confirmed.
    fn confirm(&mut self, prompt: &str) -> Result<bool>;
}

impl<C: ConfirmCallback + ?Sized> ConfirmCallback for Box<C> {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        (**self).confirm(prompt)
    }
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_wave_start(&mut self, _wave: usize, _count: usize) {}
    fn on_stack_start(&mut self, _stack_id: &str) {}
    fn on_stack_complete(&mut self, _stack_id: &str, _outcome: &StackOutcome) {}
    fn on_wave_complete(&mut self) {}
}

/// Auto-confirm callback (always returns true)
pub struct AutoConfirm;

impl ConfirmCallback for AutoConfirm {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Auto-decline callback (always returns false)
pub struct AutoDecline;

impl ConfirmCallback for AutoDecline {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(false)
    }
}

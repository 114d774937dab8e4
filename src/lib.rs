/*!

Durable lifecycle orchestration for managed EKS clusters.

This library sequences the slow, fallible cloud operations behind three
lifecycle procedures - cluster creation, cluster deletion, and rolling node
group replacement - into deterministic step sequences that a durable
execution substrate can interrupt and resume without duplicating side
effects. The substrate itself lives elsewhere; this crate consumes its
contract through [`step::RunContext`] (run/step identity, time budgets,
liveness signals) and hands every external operation to the
[`steps::StepRegistry`] façade.

The pieces that make interrupted runs safe:

- [`wait`] paces polling of long-running operations below the step's
  liveness budget, so the substrate never presumes a healthy wait dead.
- [`step`] derives an idempotency token from run and step identity, so a
  redispatched create or delete is a no-op on the provider side.
- [`outputs`] extracts the typed fields later steps consume from a stack's
  key/value outputs.

!*/

pub mod cluster;
pub mod error;
pub mod outputs;
pub mod step;
pub mod steps;
pub mod templates;
pub mod wait;
pub mod workflows;

pub use error::{Error, Result};

//! Virtual machine root state and context

mod context;

pub use context::{Vm, VmState};

// SPDX-License-Identifier: MIT
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod cycle;
pub mod delivery;
pub mod governor;

pub use cycle::{
    team_is_running, AgentStreamEvent, CycleSupervisor, SupervisorConfig, SupervisorError,
    SupervisorHandle, SupervisorObservers, SupervisorState,
};
pub use delivery::EventDelivery;
pub use governor::TurnGovernor;

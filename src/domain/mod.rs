//! Domain layer: entities, value objects, and the ports the application
//! layer talks to.

pub mod clock;
pub mod cycle;
pub mod employee;
pub mod events;
pub mod ledger;
pub mod money;
pub mod ports;

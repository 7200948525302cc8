//! Ports - interfaces the player side depends on
//!
//! Concrete transports live in `infrastructure`; everything above them talks to
//! the traits defined here.

pub mod outbound;

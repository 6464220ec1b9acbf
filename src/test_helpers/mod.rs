//! Tools to run MACs against each other without hardware
//!
//! [`sim::Simulation`] owns the timeline and the nodes, [`aether::Aether`] is the medium between
//! their radios and [`recorder::Recorder`] stands in for the higher layer of every node.

pub mod aether;
pub mod recorder;
pub mod sim;

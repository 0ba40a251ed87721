//! # Kestrel planning library
//!
//! The decision core of the Kestrel SSL robot control stack: a pure,
//! per-cycle computation from world snapshot plus per-robot intents to one
//! collision-aware, time-parameterized trajectory per robot slot. Everything
//! upstream (vision, referee, gameplay) and downstream (radio, drawing)
//! talks to this crate through [`data_store::DataStore`] and the
//! [`plan_mgr::PlanMgr::proc`] entry point.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod data_store;
pub mod draw;
pub mod geom;
pub mod goal;
pub mod plan_mgr;
pub mod traj;
pub mod world;

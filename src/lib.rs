//! Autonomous Renju agent: a heuristic move engine with swap and offer10
//! opening decisions, driven by a long-polling arena client.

pub mod ai;
pub mod arena;
pub mod credentials;
pub mod daemon;
pub mod engine;
pub mod error;
pub mod eval;
pub mod game_loop;
pub mod opening;
pub mod ranking;
pub mod rules;
pub mod threats;
pub mod types;

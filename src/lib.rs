//! # evader
//!
//! 2次元平面上で、航空機が地上のミサイルシステムから発射される無誘導ミサイルを
//! 数値最適化によって回避するシミュレーション。

pub mod evasion;
pub mod input;
pub mod logging;
pub mod models;
pub mod render;
pub mod scenario;
pub mod simulation;
pub mod world;

//! Search table engine management / 搜索表引擎管理
//!
//! - detector: plugin / table engine state, read fresh on every call
//! - migration: enhanced <-> baseline switches with recreate fallback
//! - lifecycle: startup self-heal, install and uninstall

pub mod detector;
pub mod lifecycle;
pub mod migration;
pub mod schema;

pub use detector::{EngineDetector, EngineState, IndexInfo, TableStatus};
pub use lifecycle::{bootstrap_self_heal, install, uninstall, HealAction, InstallMode};
pub use migration::{MigrationOutcome, Migrator};

//! Startup self-heal, install and uninstall hooks / 生命周期钩子

use serde::Serialize;

use super::migration::{MigrationOutcome, Migrator};
use crate::error::Result;

/// What the startup check did / 启动自检结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealAction {
    /// Plugin state and table engine already agree / 状态一致
    None,
    RevertedToBaseline(MigrationOutcome),
    SwitchedToEnhanced(MigrationOutcome),
    /// A switch was attempted and failed; search keeps running in fallback mode / 修复失败
    Failed(String),
}

/// Result of the install hook / 安装结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallMode {
    Enhanced(MigrationOutcome),
    /// Plugin absent, the baseline engine and fallback rewriting are used / 降级模式
    Fallback,
    /// Plugin present but the switch failed / 切换失败
    EnhanceFailed(String),
}

/// Align the table engine with the plugin state / 让表引擎与插件状态一致
///
/// Never fails: every error is logged and reported as [`HealAction::Failed`].
pub async fn bootstrap_self_heal(migrator: &Migrator) -> HealAction {
    let detector = migrator.detector();
    let table = &detector.config().search_table;
    let plugin_active = detector.check_plugin_active().await;
    let engine = match detector.try_table_engine(table).await {
        Ok(engine) => engine,
        Err(e) => {
            tracing::error!("Failed to check engine of {}: {}", table, e);
            return HealAction::Failed(e.to_string());
        }
    };
    let enhanced = detector.is_enhanced_engine(&engine);

    if !plugin_active && enhanced {
        tracing::warn!(
            "{} uses {} but the plugin is not active, reverting to {}",
            table,
            engine,
            detector.config().baseline_engine
        );
        return match migrator.switch_to_baseline().await {
            Ok(outcome) => HealAction::RevertedToBaseline(outcome),
            Err(e) => {
                tracing::error!("Reverting {} failed: {}", table, e);
                HealAction::Failed(e.to_string())
            }
        };
    }

    if plugin_active && !enhanced {
        tracing::info!(
            "{} plugin is active, switching {} to it",
            detector.config().enhanced_engine,
            table
        );
        return match migrator.switch_to_enhanced().await {
            Ok(outcome) => HealAction::SwitchedToEnhanced(outcome),
            Err(e) => {
                tracing::error!("Switching {} failed: {}", table, e);
                HealAction::Failed(e.to_string())
            }
        };
    }

    HealAction::None
}

/// Install hook: use the enhanced engine when the plugin is active / 安装
pub async fn install(migrator: &Migrator) -> InstallMode {
    let detector = migrator.detector();
    if !detector.check_plugin_active().await {
        tracing::warn!(
            "{} plugin is not active. Installing in fallback mode ({}).",
            detector.config().enhanced_engine,
            detector.config().baseline_engine
        );
        return InstallMode::Fallback;
    }
    match migrator.switch_to_enhanced().await {
        Ok(outcome) => InstallMode::Enhanced(outcome),
        Err(e) => {
            tracing::error!("Error while enabling {} on install: {}", detector.config().enhanced_engine, e);
            InstallMode::EnhanceFailed(e.to_string())
        }
    }
}

/// Uninstall hook: back to the baseline engine in place / 卸载
pub async fn uninstall(migrator: &Migrator) -> Result<()> {
    migrator.revert_in_place().await?;
    tracing::info!(
        "{} restored to {}",
        migrator.detector().config().search_table,
        migrator.detector().config().baseline_engine
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::store::mock::MockConnection;
    use std::sync::Arc;

    fn migrator(conn: &Arc<MockConnection>) -> Migrator {
        Migrator::new(conn.clone(), EngineConfig::default())
    }

    #[tokio::test]
    async fn test_heal_reverts_when_plugin_missing() {
        let conn = Arc::new(MockConnection::enhanced());
        conn.update(|s| s.plugin_status = None);
        let action = bootstrap_self_heal(&migrator(&conn)).await;
        assert_eq!(action, HealAction::RevertedToBaseline(MigrationOutcome::Altered));
        assert_eq!(conn.snapshot().engine, "InnoDB");
    }

    #[tokio::test]
    async fn test_heal_switches_when_plugin_active() {
        let conn = Arc::new(MockConnection::plugin_active());
        let action = bootstrap_self_heal(&migrator(&conn)).await;
        assert_eq!(action, HealAction::SwitchedToEnhanced(MigrationOutcome::Altered));
        assert_eq!(conn.snapshot().engine, "Mroonga");
    }

    #[tokio::test]
    async fn test_heal_noop_when_consistent() {
        let conn = Arc::new(MockConnection::baseline());
        assert_eq!(bootstrap_self_heal(&migrator(&conn)).await, HealAction::None);
        assert!(conn.ddl_statements().is_empty());

        let conn = Arc::new(MockConnection::enhanced());
        assert_eq!(bootstrap_self_heal(&migrator(&conn)).await, HealAction::None);
    }

    #[tokio::test]
    async fn test_heal_swallows_failure() {
        let conn = Arc::new(MockConnection::plugin_active());
        conn.update(|s| {
            s.alter_engine_fails = true;
            s.create_table_fails = true;
        });
        assert!(matches!(
            bootstrap_self_heal(&migrator(&conn)).await,
            HealAction::Failed(_)
        ));
    }

    #[tokio::test]
    async fn test_install_fallback_without_plugin() {
        let conn = Arc::new(MockConnection::baseline());
        assert_eq!(install(&migrator(&conn)).await, InstallMode::Fallback);
        assert!(conn.ddl_statements().is_empty());
    }

    #[tokio::test]
    async fn test_install_switches_with_plugin() {
        let conn = Arc::new(MockConnection::plugin_active());
        assert_eq!(
            install(&migrator(&conn)).await,
            InstallMode::Enhanced(MigrationOutcome::Altered)
        );
    }

    #[tokio::test]
    async fn test_uninstall_restores_baseline() {
        let conn = Arc::new(MockConnection::enhanced());
        uninstall(&migrator(&conn)).await.unwrap();
        let s = conn.snapshot();
        assert_eq!(s.engine, "InnoDB");
        assert_eq!(s.comment, "");
        assert_eq!(s.owner_fks.len(), 1);
    }

    #[tokio::test]
    async fn test_uninstall_propagates_errors() {
        let conn = Arc::new(MockConnection::enhanced());
        conn.update(|s| s.alter_engine_fails = true);
        assert!(uninstall(&migrator(&conn)).await.is_err());
    }
}

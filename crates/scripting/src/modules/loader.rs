//! Loads `modules.xml` and the scripts it references into a [`Modules`] registry

use super::registry::{Modules, NodeOutcome};
use crate::error::Result;
use crate::interface::ScriptInterface;
use otsrv_config::{parse_document, ConfigNode, XmlNode};
use std::fs;
use std::path::{Path, PathBuf};

/// Declaration file inside the modules directory
pub const MODULES_FILE: &str = "modules.xml";

/// Script subdirectory inside the modules directory
pub const SCRIPTS_DIR: &str = "scripts";

/// Counts reported after a load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    /// `module` nodes found in the document
    pub declared: usize,

    /// Modules with a script bound
    pub bound: usize,

    /// Declarations or scripts that were refused
    pub rejected: usize,
}

/// Reads module declarations from disk
///
/// ```text
/// <modules>
///     <module type="recvbyte" byte="0xA0" delay="500" script="ping.lua"/>
/// </modules>
/// ```
///
/// Declarations are registered first, then each `script` attribute is read
/// from `scripts/` and bound to its declaration.
#[derive(Debug, Clone)]
pub struct ModuleLoader {
    modules_dir: PathBuf,
}

impl ModuleLoader {
    pub fn new(modules_dir: impl Into<PathBuf>) -> Self {
        Self {
            modules_dir: modules_dir.into(),
        }
    }

    pub fn modules_dir(&self) -> &Path {
        &self.modules_dir
    }

    pub fn modules_file(&self) -> PathBuf {
        self.modules_dir.join(MODULES_FILE)
    }

    pub fn scripts_dir(&self) -> PathBuf {
        self.modules_dir.join(SCRIPTS_DIR)
    }

    /// Read the declaration file and load every module it names
    pub fn load<S: ScriptInterface>(&self, modules: &mut Modules<S>) -> Result<LoadSummary> {
        let path = self.modules_file();
        tracing::info!("Loading modules from {}", path.display());

        let content = fs::read_to_string(&path)?;
        let document = parse_document(&content)?;
        Ok(self.load_document(modules, &document))
    }

    /// Unbind everything, then load again from disk
    ///
    /// If the load fails the registry is left cleared.
    pub fn reload<S: ScriptInterface>(&self, modules: &mut Modules<S>) -> Result<LoadSummary> {
        tracing::info!("Reloading modules");
        modules.clear();
        self.load(modules)
    }

    /// Register and bind the modules declared under `document`
    pub fn load_document<S: ScriptInterface>(
        &self,
        modules: &mut Modules<S>,
        document: &XmlNode,
    ) -> LoadSummary {
        let mut summary = LoadSummary::default();

        for node in document.children() {
            match modules.configure_from(node) {
                NodeOutcome::NotModule => {
                    tracing::warn!("Unknown node '{}' in {}", node.name(), MODULES_FILE);
                }
                NodeOutcome::Registered => summary.declared += 1,
                NodeOutcome::Rejected => {
                    summary.declared += 1;
                    summary.rejected += 1;
                }
            }
        }

        let scripts_dir = self.scripts_dir();

        for node in document.children() {
            if modules.create_module(node.name()).is_none() {
                continue;
            }
            let Some(script) = node.attribute("script") else {
                continue;
            };

            let path = scripts_dir.join(script);
            let source = match fs::read_to_string(&path) {
                Ok(source) => source,
                Err(err) => {
                    tracing::error!("Cannot read {}: {}", path.display(), err);
                    summary.rejected += 1;
                    continue;
                }
            };

            match modules.register_script(node, script, &source) {
                Ok(true) => summary.bound += 1,
                Ok(false) => {
                    tracing::warn!("Duplicate module for script {}", script);
                    summary.rejected += 1;
                }
                Err(err) => {
                    tracing::error!("Failed to load module script {}: {}", script, err);
                    summary.rejected += 1;
                }
            }
        }

        tracing::info!(
            "Loaded {} modules ({} bound, {} rejected)",
            summary.declared,
            summary.bound,
            summary.rejected
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use otsrv_core::{ManualClock, PlayerID};
    use otsrv_game::{Player, PlayerManager};
    use otsrv_protocol::NetworkMessage;
    use std::sync::Arc;
    use tempfile::TempDir;

    const PING: &str = r#"
        function onRecvbyte(player, msg, recvbyte)
            msg:reset()
            msg:addByte(0xA1)
            msg:sendToPlayer(player)
        end
    "#;

    fn write_modules(dir: &Path, document: &str, scripts: &[(&str, &str)]) {
        fs::write(dir.join(MODULES_FILE), document).unwrap();
        fs::create_dir_all(dir.join(SCRIPTS_DIR)).unwrap();
        for (name, source) in scripts {
            fs::write(dir.join(SCRIPTS_DIR).join(name), source).unwrap();
        }
    }

    fn registry() -> (Modules, Arc<PlayerManager>) {
        let players = Arc::new(PlayerManager::new());
        players.add_player(Arc::new(Player::new(PlayerID::new(1), "Alice")));
        let modules = Modules::new(players.clone(), Arc::new(ManualClock::new(0)));
        (modules, players)
    }

    #[test]
    fn test_load_binds_scripts() {
        let dir = TempDir::new().unwrap();
        write_modules(
            dir.path(),
            r#"<?xml version="1.0"?>
            <modules>
                <!-- ping -->
                <module type="recvbyte" byte="0xA0" delay="500" script="ping.lua"/>
                <module type="recvbyte" byte="0xA2"/>
            </modules>"#,
            &[("ping.lua", PING)],
        );

        let (mut modules, players) = registry();
        let summary = ModuleLoader::new(dir.path()).load(&mut modules).unwrap();

        assert_eq!(
            summary,
            LoadSummary {
                declared: 2,
                bound: 1,
                rejected: 0
            }
        );
        assert_eq!(modules.lookup(0xA0, true).unwrap().delay(), 500);
        assert!(modules.lookup(0xA2, true).is_none());
        assert!(modules.lookup(0xA2, false).is_some());

        let mut msg = NetworkMessage::from_bytes(&[0xA0]);
        modules.dispatch(PlayerID::new(1), &mut msg, 0xA0);
        let frames = players.get_player(PlayerID::new(1)).unwrap().take_outbox();
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], &[0xA1]);
    }

    #[test]
    fn test_bad_entries_are_counted() {
        let dir = TempDir::new().unwrap();
        write_modules(
            dir.path(),
            r#"<modules>
                <module byte="1" script="ping.lua"/>
                <module type="recvbyte" byte="2" script="missing.lua"/>
                <module type="recvbyte" byte="3" script="broken.lua"/>
                <event type="recvbyte" byte="4"/>
            </modules>"#,
            &[("ping.lua", PING), ("broken.lua", "function onRecvbyte(")],
        );

        let (mut modules, _players) = registry();
        let summary = ModuleLoader::new(dir.path()).load(&mut modules).unwrap();

        assert_eq!(summary.declared, 3);
        assert_eq!(summary.bound, 0);
        // Untyped declaration is refused in both passes
        assert_eq!(summary.rejected, 4);
        assert_eq!(modules.len(), 2);
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let (mut modules, _players) = registry();
        assert!(ModuleLoader::new(dir.path()).load(&mut modules).is_err());
    }

    #[test]
    fn test_malformed_document() {
        let dir = TempDir::new().unwrap();
        write_modules(dir.path(), "<modules><module></modules>", &[]);

        let (mut modules, _players) = registry();
        assert!(ModuleLoader::new(dir.path()).load(&mut modules).is_err());
    }

    #[test]
    fn test_reload_picks_up_new_scripts() {
        let dir = TempDir::new().unwrap();
        let document = r#"<modules><module type="recvbyte" byte="5" script="five.lua"/></modules>"#;
        write_modules(
            dir.path(),
            document,
            &[("five.lua", "function onRecvbyte(player) player_seen = 1 end")],
        );

        let loader = ModuleLoader::new(dir.path());
        let (mut modules, _players) = registry();
        loader.load(&mut modules).unwrap();

        write_modules(dir.path(), document, &[("five.lua", PING)]);
        let summary = loader.reload(&mut modules).unwrap();

        assert_eq!(summary.bound, 1);
        assert_eq!(modules.len(), 1);
        assert!(modules.lookup(5, true).unwrap().is_bound_to(modules.script_interface().id()));
    }

    #[test]
    fn test_failed_reload_leaves_registry_cleared() {
        let dir = TempDir::new().unwrap();
        write_modules(
            dir.path(),
            r#"<modules><module type="recvbyte" byte="5" script="five.lua"/></modules>"#,
            &[("five.lua", PING)],
        );

        let loader = ModuleLoader::new(dir.path());
        let (mut modules, _players) = registry();
        loader.load(&mut modules).unwrap();

        fs::remove_file(loader.modules_file()).unwrap();
        assert!(loader.reload(&mut modules).is_err());
        assert!(modules.lookup(5, true).is_none());
        assert_eq!(modules.len(), 1);
    }
}

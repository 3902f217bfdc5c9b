//! Startup plugin loading
//!
//! Enumerates published plugins and attaches one subcommand per plugin to
//! the [`CommandTree`]. Each plugin is first offered to the
//! [`ModuleLoader`]; anything that is not a loadable module runs as a
//! subprocess. A module that opens but breaks the declaration contract
//! aborts loading, as does a failed enumeration.

use tracing::{debug, info};

use crate::error::Result;

use super::module::{LoadOutcome, ModuleLoader, PluginContext};
use super::process::{resolve_program, ProcessAdapter};
use super::registry::{AttachedCommand, CommandTree, ResolvedCommand};
use super::store::PluginStore;
use super::types::PublishedPlugin;

/// Attach every published plugin to `tree`.
///
/// Returns the number of plugins attached. When plugins are disabled in
/// `ctx.settings`, the store is not consulted and nothing is attached.
pub fn load_plugins<S, L>(
    tree: &mut CommandTree,
    store: &S,
    loader: &L,
    ctx: &PluginContext,
) -> Result<usize>
where
    S: PluginStore + ?Sized,
    L: ModuleLoader + ?Sized,
{
    if ctx.settings.disable_plugins {
        info!("Plugin loading disabled");
        return Ok(0);
    }

    let plugins = store.list()?;
    for plugin in &plugins {
        let command = resolve_plugin(plugin, loader, ctx)?;
        tree.attach(AttachedCommand::new(plugin, command));
    }

    info!(count = plugins.len(), "Loaded plugins");
    Ok(plugins.len())
}

/// Decide how `plugin` runs: as a module if its artifact loads as one,
/// otherwise as a subprocess.
pub fn resolve_plugin<L>(
    plugin: &PublishedPlugin,
    loader: &L,
    ctx: &PluginContext,
) -> Result<ResolvedCommand>
where
    L: ModuleLoader + ?Sized,
{
    let program = resolve_program(&plugin.command().base, &plugin.path);

    match loader.load_module(&program, ctx)? {
        LoadOutcome::Loaded(command) => {
            debug!(plugin = %plugin.name(), "Using module plugin");
            Ok(ResolvedCommand::Module(command))
        }
        LoadOutcome::NotAModule => {
            debug!(plugin = %plugin.name(), program = %program.display(), "Using subprocess plugin");
            Ok(ResolvedCommand::Process(ProcessAdapter::wrap(plugin, ctx)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Home, Settings, Stream, Streams};
    use crate::error::LedgerError;
    use crate::plugins::module::{MockModuleLoader, PluginCommand};
    use crate::plugins::store::MockPluginStore;
    use crate::plugins::types::PluginMetadata;
    use async_trait::async_trait;
    use clap::Command;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    struct Noop;

    #[async_trait]
    impl PluginCommand for Noop {
        async fn run(&self, _args: Vec<String>) -> Result<()> {
            Ok(())
        }
    }

    fn ctx(disable_plugins: bool) -> PluginContext {
        let mut settings = Settings::new(Home::new("/tmp/ledgerctl-test"));
        settings.disable_plugins = disable_plugins;
        PluginContext::new(settings, Arc::new(Streams::inherit()))
    }

    fn published(name: &str, command: &str) -> PublishedPlugin {
        PublishedPlugin {
            metadata: serde_yaml::from_str::<PluginMetadata>(&format!(
                "name: {}\ncommand: {}",
                name, command
            ))
            .unwrap(),
            path: PathBuf::from(format!("/src/{}", name)),
            entry: PathBuf::from(format!("/plugins/{}", name)),
        }
    }

    fn tree() -> CommandTree {
        CommandTree::new(Command::new("ledgerctl").subcommand(Command::new("version")))
    }

    #[test]
    fn test_disabled_attaches_nothing() {
        let mut store = MockPluginStore::new();
        store.expect_list().never();
        let mut loader = MockModuleLoader::new();
        loader.expect_load_module().never();

        let mut tree = tree();
        let count = load_plugins(&mut tree, &store, &loader, &ctx(true)).unwrap();
        assert_eq!(count, 0);
        assert!(tree.is_empty());
    }

    #[test]
    fn test_list_error_propagates() {
        let mut store = MockPluginStore::new();
        store.expect_list().returning(|| {
            Err(LedgerError::Metadata {
                path: PathBuf::from("/plugins/bad/plugin.yaml"),
                reason: "broken".into(),
            })
        });
        let loader = MockModuleLoader::new();

        let mut tree = tree();
        let err = load_plugins(&mut tree, &store, &loader, &ctx(false)).unwrap_err();
        assert!(matches!(err, LedgerError::Metadata { .. }));
        assert!(tree.is_empty());
    }

    #[test]
    fn test_module_and_process_plugins() {
        let mut store = MockPluginStore::new();
        store
            .expect_list()
            .returning(|| Ok(vec![published("native", "./native.so"), published("script", "./run.sh")]));

        let mut loader = MockModuleLoader::new();
        loader
            .expect_load_module()
            .withf(|path: &Path, _| path == Path::new("/src/native/native.so"))
            .times(1)
            .returning(|_, _| Ok(LoadOutcome::Loaded(Box::new(Noop))));
        loader
            .expect_load_module()
            .withf(|path: &Path, _| path == Path::new("/src/script/run.sh"))
            .times(1)
            .returning(|_, _| Ok(LoadOutcome::NotAModule));

        let mut tree = tree();
        let count = load_plugins(&mut tree, &store, &loader, &ctx(false)).unwrap();

        assert_eq!(count, 2);
        assert_eq!(tree.plugin_names(), vec!["native", "script"]);
        assert!(tree.plugin("native").unwrap().command.is_module());
        assert!(!tree.plugin("script").unwrap().command.is_module());
    }

    #[test]
    fn test_contract_error_aborts() {
        let mut store = MockPluginStore::new();
        store.expect_list().returning(|| {
            Ok(vec![
                published("first", "first"),
                published("broken", "./broken.so"),
                published("never", "never"),
            ])
        });

        let mut loader = MockModuleLoader::new();
        loader
            .expect_load_module()
            .withf(|path: &Path, _| path == Path::new("first"))
            .returning(|_, _| Ok(LoadOutcome::NotAModule));
        loader
            .expect_load_module()
            .withf(|path: &Path, _| path.ends_with("broken.so"))
            .returning(|path, _| {
                Err(LedgerError::ModuleContract {
                    path: path.to_path_buf(),
                    reason: "could not find symbol LEDGERCTL_PLUGIN".into(),
                })
            });
        loader
            .expect_load_module()
            .withf(|path: &Path, _| path == Path::new("never"))
            .never();

        let mut tree = tree();
        let err = load_plugins(&mut tree, &store, &loader, &ctx(false)).unwrap_err();
        assert!(matches!(err, LedgerError::ModuleContract { .. }));
    }

    #[test]
    fn test_duplicate_names_last_wins() {
        let mut store = MockPluginStore::new();
        store
            .expect_list()
            .returning(|| Ok(vec![published("dup", "./one.sh"), published("dup", "./two.sh")]));
        let mut loader = MockModuleLoader::new();
        loader
            .expect_load_module()
            .returning(|_, _| Ok(LoadOutcome::NotAModule));

        let mut tree = tree();
        assert_eq!(load_plugins(&mut tree, &store, &loader, &ctx(false)).unwrap(), 2);
        assert_eq!(tree.len(), 1);
        match &tree.plugin("dup").unwrap().command {
            ResolvedCommand::Process(process) => {
                assert_eq!(process.program(), PathBuf::from("/src/dup/two.sh"))
            }
            other => panic!("expected a subprocess plugin, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_installed_script_runs_with_arguments() {
        use crate::plugins::installer::Installer;
        use crate::plugins::module::DylibLoader;
        use crate::plugins::store::SymlinkStore;
        use std::fs;
        use std::io::{Read, Seek};
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("echo-src");
        fs::create_dir_all(&src).unwrap();
        fs::write(
            src.join("plugin.yaml"),
            "name: echo\ndescription: echo arguments\ncommand: ./echo.sh --flag\n",
        )
        .unwrap();
        let script = src.join("echo.sh");
        fs::write(&script, "#!/bin/sh\nfor a in \"$@\"; do echo \"$a\"; done\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let home = Home::new(tmp.path().join("home"));
        let installer = Installer::new(SymlinkStore::new(home.plugins()));
        installer.install(&src).unwrap();

        let mut out = tempfile::tempfile().unwrap();
        let ctx = PluginContext::new(
            Settings::new(home),
            Arc::new(Streams {
                stdin: Stream::Null,
                stdout: Stream::File(out.try_clone().unwrap()),
                stderr: Stream::Null,
            }),
        );

        let mut tree = tree();
        let count = load_plugins(&mut tree, installer.store(), &DylibLoader, &ctx).unwrap();
        assert_eq!(count, 1);

        let matches = tree
            .build()
            .try_get_matches_from(["ledgerctl", "echo", "extra"])
            .unwrap();
        tree.dispatch(&matches).await.unwrap().unwrap();

        out.rewind().unwrap();
        let mut printed = String::new();
        out.read_to_string(&mut printed).unwrap();
        assert_eq!(printed, "--flag\nextra\n");
    }
}

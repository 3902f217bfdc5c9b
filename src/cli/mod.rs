//! Command-line interface
//!
//! Built-in commands are declared with clap's derive API. Installed
//! plugins are grafted onto the same command tree at startup, before the
//! arguments are parsed, so `ledgerctl <plugin> ...` parses and dispatches
//! like any built-in.

mod plugin;

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser, Subcommand};
use tracing::debug;

use ledgerctl::config::{Overrides, Settings, Streams};
use ledgerctl::plugins::{self, CommandTree, PluginContext, SymlinkStore};
use ledgerctl::LedgerError;

pub(crate) use plugin::PluginAction;

/// Name printed by `ledgerctl version`.
pub(crate) const PROGRAM_NAME: &str = "ledgerctl";

#[derive(Parser)]
#[command(name = "ledgerctl")]
#[command(about = "Command-line client for ledger networks", long_about = None)]
pub(crate) struct Cli {
    /// Home directory for ledgerctl state [default: ~/.ledgerctl]
    #[arg(long, value_name = "DIR")]
    pub home: Option<PathBuf>,

    /// Do not load installed plugins
    #[arg(long)]
    pub disable_plugins: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Manage plugins
    Plugin {
        #[command(subcommand)]
        action: PluginAction,
    },
    /// Print ledgerctl version information
    Version,
}

/// Run one invocation of the CLI and return the process exit code.
///
/// `args` includes the program name. All output, errors included, goes to
/// `streams`.
pub(crate) async fn run(args: Vec<String>, streams: Arc<Streams>) -> i32 {
    let overrides = Overrides::scan(args.get(1..).unwrap_or_default());

    let settings = match Settings::load(&overrides) {
        Ok(settings) => settings,
        Err(e) => {
            error_line(
                &streams,
                &format!("An error occurred while loading configurations: {}", e),
            );
            return 1;
        }
    };
    let ctx = PluginContext::new(settings, Arc::clone(&streams));

    let tree = match build_tree(&ctx) {
        Ok(tree) => tree,
        Err(e) => {
            error_line(
                &streams,
                &format!("An error occurred while loading plugins: {}", e),
            );
            return 1;
        }
    };

    let matches = match tree.build().try_get_matches_from(&args) {
        Ok(matches) => matches,
        // Help and version output arrive here too.
        Err(e) => {
            let rendered = e.render().to_string();
            let target = if e.use_stderr() {
                streams.err()
            } else {
                streams.out()
            };
            if let Ok(mut target) = target {
                let _ = write!(target, "{}", rendered);
            }
            return e.exit_code();
        }
    };

    match execute(&tree, &ctx, &matches).await {
        Ok(()) => 0,
        Err(err) => report(&streams, &err),
    }
}

/// The built-in command tree with every published plugin attached.
fn build_tree(ctx: &PluginContext) -> ledgerctl::Result<CommandTree> {
    let mut tree = CommandTree::new(Cli::command());
    let store = SymlinkStore::new(ctx.settings.home.plugins());
    let loader = plugins::default_loader();

    let attached = plugins::load_plugins(&mut tree, &store, loader.as_ref(), ctx)?;
    debug!(attached, "Command tree ready");
    Ok(tree)
}

async fn execute(tree: &CommandTree, ctx: &PluginContext, matches: &ArgMatches) -> Result<()> {
    if let Some(result) = tree.dispatch(matches).await {
        return result.map_err(anyhow::Error::from);
    }

    let cli = Cli::from_arg_matches(matches)?;
    debug!(home = ?cli.home, disable_plugins = cli.disable_plugins, "Running built-in command");
    let mut out = ctx
        .streams
        .out()
        .context("Failed to open output stream")?;

    match cli.command {
        Some(Commands::Plugin { action }) => plugin::cmd_plugin(action, &ctx.settings, &mut *out),
        Some(Commands::Version) => cmd_version(&mut *out),
        None => {
            write!(out, "{}", tree.build().render_help())?;
            Ok(())
        }
    }
}

pub(crate) fn cmd_version(out: &mut dyn Write) -> Result<()> {
    write!(out, "{}", version_info())?;
    Ok(())
}

fn version_info() -> String {
    format!(
        "{}:\n Version: {}\n OS/Arch: {}/{}\n",
        PROGRAM_NAME,
        ledgerctl::VERSION,
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

/// Print `err` and pick the exit code for it.
fn report(streams: &Streams, err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<LedgerError>() {
        // The plugin has already spoken through its own streams.
        Some(e @ LedgerError::SubprocessExit { .. }) => e.exit_code(),
        Some(e) => {
            error_line(streams, &format!("Error: {:#}", err));
            e.exit_code()
        }
        None => {
            error_line(streams, &format!("Error: {:#}", err));
            1
        }
    }
}

fn error_line(streams: &Streams, message: &str) {
    match streams.err() {
        Ok(mut err) => {
            let _ = writeln!(err, "{}", message);
        }
        Err(_) => eprintln!("{}", message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerctl::config::Stream;
    use std::fs;
    use std::io::{Read, Seek};
    use std::path::Path;
    use tempfile::TempDir;

    struct Captured {
        streams: Arc<Streams>,
        out: fs::File,
        err: fs::File,
    }

    impl Captured {
        fn new() -> Self {
            let out = tempfile::tempfile().unwrap();
            let err = tempfile::tempfile().unwrap();
            let streams = Arc::new(Streams {
                stdin: Stream::Null,
                stdout: Stream::File(out.try_clone().unwrap()),
                stderr: Stream::File(err.try_clone().unwrap()),
            });
            Self { streams, out, err }
        }

        fn read(file: &mut fs::File) -> String {
            file.rewind().unwrap();
            let mut content = String::new();
            file.read_to_string(&mut content).unwrap();
            content
        }

        fn stdout(&mut self) -> String {
            Self::read(&mut self.out)
        }

        fn stderr(&mut self) -> String {
            Self::read(&mut self.err)
        }
    }

    fn args(home: &Path, rest: &[&str]) -> Vec<String> {
        let mut args = vec![
            "ledgerctl".to_string(),
            "--home".to_string(),
            home.display().to_string(),
        ];
        args.extend(rest.iter().map(|s| s.to_string()));
        args
    }

    #[cfg(unix)]
    fn write_script_plugin(root: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let src = root.join(format!("{}-src", name));
        fs::create_dir_all(&src).unwrap();
        fs::write(
            src.join("plugin.yaml"),
            format!(
                "name: {}\nusage: {} [args...]\ndescription: {} plugin\ncommand: ./run.sh --from-metadata\n",
                name, name, name
            ),
        )
        .unwrap();
        let script = src.join("run.sh");
        fs::write(&script, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        src
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_version_info() {
        let info = version_info();
        assert!(info.starts_with("ledgerctl:\n"));
        assert!(info.contains(&format!(" Version: {}\n", ledgerctl::VERSION)));
        assert!(info.contains(std::env::consts::OS));
    }

    #[tokio::test]
    async fn test_version_command() {
        let tmp = TempDir::new().unwrap();
        let mut cap = Captured::new();

        let code = run(args(tmp.path(), &["version"]), Arc::clone(&cap.streams)).await;

        assert_eq!(code, 0);
        assert_eq!(cap.stdout(), version_info());
    }

    #[tokio::test]
    async fn test_unknown_command_is_usage_error() {
        let tmp = TempDir::new().unwrap();
        let mut cap = Captured::new();

        let code = run(args(tmp.path(), &["frobnicate"]), Arc::clone(&cap.streams)).await;

        assert_eq!(code, 2);
        assert!(cap.stderr().contains("frobnicate"));
    }

    #[tokio::test]
    async fn test_plugin_list_empty() {
        let tmp = TempDir::new().unwrap();
        let mut cap = Captured::new();

        let code = run(args(tmp.path(), &["plugin", "list"]), Arc::clone(&cap.streams)).await;

        assert_eq!(code, 0);
        assert_eq!(cap.stdout(), "no plugins currently exist\n");
    }

    #[tokio::test]
    async fn test_uninstall_unknown_reports_error() {
        let tmp = TempDir::new().unwrap();
        let mut cap = Captured::new();

        let code = run(
            args(tmp.path(), &["plugin", "uninstall", "foo"]),
            Arc::clone(&cap.streams),
        )
        .await;

        assert_eq!(code, 1);
        assert_eq!(cap.stderr(), "Error: plugin 'foo' was not found\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_install_then_run_plugin() {
        let tmp = TempDir::new().unwrap();
        let home = tmp.path().join("home");
        let src = write_script_plugin(tmp.path(), "echo", r#"for a in "$@"; do echo "$a"; done"#);
        let src_arg = src.display().to_string();

        let mut cap = Captured::new();
        let code = run(
            args(&home, &["plugin", "install", &src_arg]),
            Arc::clone(&cap.streams),
        )
        .await;
        assert_eq!(code, 0);
        assert_eq!(cap.stdout(), "successfully installed the plugin\n");

        let mut cap = Captured::new();
        let code = run(
            args(&home, &["echo", "--verbose", "extra"]),
            Arc::clone(&cap.streams),
        )
        .await;
        assert_eq!(code, 0);
        assert_eq!(cap.stdout(), "--from-metadata\n--verbose\nextra\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_plugin_exit_code_propagates() {
        let tmp = TempDir::new().unwrap();
        let home = tmp.path().join("home");
        let src = write_script_plugin(tmp.path(), "fail", "echo oops >&2; exit 4");
        ledgerctl::plugins::Installer::new(SymlinkStore::new(home.join("plugins")))
            .install(&src)
            .unwrap();

        let mut cap = Captured::new();
        let code = run(args(&home, &["fail"]), Arc::clone(&cap.streams)).await;

        assert_eq!(code, 4);
        assert_eq!(cap.stderr(), "oops\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_disable_plugins_flag() {
        let tmp = TempDir::new().unwrap();
        let home = tmp.path().join("home");
        let src = write_script_plugin(tmp.path(), "echo", "echo ran");
        ledgerctl::plugins::Installer::new(SymlinkStore::new(home.join("plugins")))
            .install(&src)
            .unwrap();

        let mut rest = vec!["--disable-plugins", "echo"];
        let mut cap = Captured::new();
        let code = run(args(&home, &rest), Arc::clone(&cap.streams)).await;
        assert_eq!(code, 2);
        assert!(cap.stdout().is_empty());

        // Built-ins still work and still see the plugin as installed.
        rest = vec!["--disable-plugins", "plugin", "list"];
        let mut cap = Captured::new();
        assert_eq!(run(args(&home, &rest), Arc::clone(&cap.streams)).await, 0);
        assert_eq!(cap.stdout(), "echo\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_plugin_shadows_builtin_version() {
        let tmp = TempDir::new().unwrap();
        let home = tmp.path().join("home");
        let src = write_script_plugin(tmp.path(), "version", "echo from-plugin");
        ledgerctl::plugins::Installer::new(SymlinkStore::new(home.join("plugins")))
            .install(&src)
            .unwrap();

        let mut cap = Captured::new();
        let code = run(args(&home, &["version"]), Arc::clone(&cap.streams)).await;

        assert_eq!(code, 0);
        assert_eq!(cap.stdout(), "from-plugin\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_broken_plugin_aborts_startup() {
        let tmp = TempDir::new().unwrap();
        let home = tmp.path().join("home");
        fs::create_dir_all(home.join("plugins").join("stray")).unwrap();

        let mut cap = Captured::new();
        let code = run(args(&home, &["version"]), Arc::clone(&cap.streams)).await;

        assert_eq!(code, 1);
        assert!(cap.stdout().is_empty());
        assert!(cap
            .stderr()
            .starts_with("An error occurred while loading plugins: "));
    }

    #[tokio::test]
    async fn test_bad_config_file_aborts_startup() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("config.json"), "{ not json").unwrap();

        let mut cap = Captured::new();
        let code = run(args(tmp.path(), &["version"]), Arc::clone(&cap.streams)).await;

        assert_eq!(code, 1);
        assert!(cap
            .stderr()
            .starts_with("An error occurred while loading configurations: "));
    }
}

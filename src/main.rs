mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sysd_scope::{BusKind, Config, JobMode, ScopeRequest, DEFAULT_SLICE};

#[derive(Parser)]
#[command(name = "sysd-scope")]
#[command(about = "Create systemd scopes and inspect cgroup delegation")]
struct Args {
    /// Talk to the user's service manager instead of the system one
    #[arg(long, global = true, env = "SYSD_SCOPE_USER")]
    user: bool,

    /// Where the cgroup hierarchy is mounted
    #[arg(
        long,
        global = true,
        env = "SYSD_SCOPE_CGROUP_ROOT",
        default_value = "/sys/fs/cgroup"
    )]
    cgroup_root: PathBuf,

    /// procfs mount used for PID lookups
    #[arg(long, global = true, env = "SYSD_SCOPE_PROC_ROOT", default_value = "/proc")]
    proc_root: PathBuf,

    /// Seconds to wait for cgroup changes (0 waits forever)
    #[arg(long, global = true, env = "SYSD_SCOPE_TIMEOUT", default_value_t = 30)]
    timeout: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a scope holding a sentinel process and print its PID
    Create {
        /// Scope name (e.g., "build-42.scope")
        scope: String,

        /// Parent slice
        #[arg(long, default_value = DEFAULT_SLICE)]
        slice: String,

        /// Delegate the scope's cgroup subtree
        #[arg(long)]
        delegate: bool,

        /// Job mode (fail, replace, isolate, ignore-dependencies, ignore-requirements)
        #[arg(long, default_value = "fail")]
        mode: JobMode,

        /// Keep the scope until SIGINT, SIGTERM or SIGHUP
        #[arg(long)]
        hold: bool,

        /// Wait for the cgroup and print its path and delegation state
        #[arg(long)]
        wait: bool,
    },

    /// Check whether a cgroup directory is delegated
    Check {
        /// cgroup directory (e.g., /sys/fs/cgroup/user.slice/build-42.scope)
        path: PathBuf,
    },

    /// Check whether the cgroup of a process is delegated
    CheckPid {
        pid: i32,
    },

    /// Print the cgroup directory of a process
    Cgroup {
        pid: i32,
    },

    /// Show the cgroup hierarchy layout and root
    Root,

    /// Stop a scope by killing its sentinel
    Stop {
        /// Sentinel PID printed by create
        pid: i32,

        /// Wait until systemd has removed the scope
        #[arg(long)]
        wait: bool,
    },
}

impl Args {
    fn config(&self) -> Config {
        Config {
            bus: if self.user { BusKind::User } else { BusKind::System },
            cgroup_root: self.cgroup_root.clone(),
            proc_root: self.proc_root.clone(),
            ..Config::default()
        }
        .with_timeout_secs(self.timeout)
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let config = args.config();

    let result = match args.command {
        Command::Create {
            scope,
            slice,
            delegate,
            mode,
            hold,
            wait,
        } => {
            let request = ScopeRequest::new(scope, slice).delegated(delegate).mode(mode);
            commands::create(&config, &request, hold, wait)
        }
        Command::Check { path } => commands::check(&config, &path),
        Command::CheckPid { pid } => commands::check_pid(&config, pid),
        Command::Cgroup { pid } => commands::cgroup(&config, pid),
        Command::Root => commands::root(&config),
        Command::Stop { pid, wait } => commands::stop(&config, pid, wait),
    };

    if let Err(e) = result {
        eprintln!("sysd-scope: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_args_verify() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn test_create_defaults() {
        let args = Args::try_parse_from(["sysd-scope", "create", "a.scope"]).unwrap();
        match args.command {
            Command::Create {
                slice,
                delegate,
                mode,
                hold,
                wait,
                ..
            } => {
                assert_eq!(slice, "user.slice");
                assert!(!delegate);
                assert_eq!(mode, JobMode::Fail);
                assert!(!hold && !wait);
            }
            _ => panic!("expected create"),
        }
    }

    #[test]
    fn test_create_mode_parse() {
        let args = Args::try_parse_from([
            "sysd-scope",
            "create",
            "a.scope",
            "--mode",
            "ignore-dependencies",
            "--delegate",
        ])
        .unwrap();
        assert!(matches!(
            args.command,
            Command::Create {
                mode: JobMode::IgnoreDependencies,
                delegate: true,
                ..
            }
        ));

        let bogus = Args::try_parse_from(["sysd-scope", "create", "a.scope", "--mode", "bogus"]);
        assert!(bogus.is_err());
    }

    #[test]
    fn test_global_flags_build_config() {
        let args = Args::try_parse_from([
            "sysd-scope",
            "root",
            "--user",
            "--cgroup-root",
            "/tmp/cg",
            "--timeout",
            "0",
        ])
        .unwrap();
        let config = args.config();
        assert_eq!(config.bus, BusKind::User);
        assert_eq!(config.cgroup_root, PathBuf::from("/tmp/cg"));
        assert_eq!(config.retry.timeout, None);

        let args = Args::try_parse_from(["sysd-scope", "--timeout", "5", "cgroup", "1"]).unwrap();
        assert_eq!(args.config().retry.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_stop_refuses_non_sentinel() {
        let proc_root =
            PathBuf::from(format!("/tmp/sysd-scope-cli-proc-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&proc_root);
        std::fs::create_dir_all(proc_root.join("4242")).unwrap();
        std::fs::write(proc_root.join("4242/comm"), "sshd\n").unwrap();

        let config = Config {
            proc_root: proc_root.clone(),
            ..Config::default()
        };
        let err = commands::stop(&config, 4242, true).unwrap_err();
        assert_eq!(err.to_string(), "PID 4242 is \"sshd\", not a sentinel");
        std::fs::remove_dir_all(&proc_root).unwrap();
    }
}

mod cgroup;
mod check;
mod create;
mod root;
mod stop;

pub use cgroup::cgroup;
pub use check::{check, check_pid};
pub use create::create;
pub use root::root;
pub use stop::stop;

use nix::unistd::Pid;
use sysd_scope::{Config, ScopeManager};

/// Manager for commands that only read the cgroup tree
fn query_manager(config: &Config) -> ScopeManager<()> {
    ScopeManager::with_config((), config)
}

fn parse_pid(pid: i32) -> Result<Pid, Box<dyn std::error::Error>> {
    if pid <= 0 {
        return Err(format!("invalid PID {}", pid).into());
    }
    Ok(Pid::from_raw(pid))
}

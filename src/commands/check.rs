//! Report whether a cgroup is delegated

use std::path::Path;

use sysd_scope::Config;

pub fn check(config: &Config, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let status = super::query_manager(config).is_delegated(path)?;
    println!("{}", status);
    Ok(())
}

pub fn check_pid(config: &Config, pid: i32) -> Result<(), Box<dyn std::error::Error>> {
    let pid = super::parse_pid(pid)?;
    let status = super::query_manager(config).is_delegated_by_pid(pid)?;
    println!("{}", status);
    Ok(())
}

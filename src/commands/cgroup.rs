//! Print the cgroup directory of a process

use sysd_scope::Config;

pub fn cgroup(config: &Config, pid: i32) -> Result<(), Box<dyn std::error::Error>> {
    let pid = super::parse_pid(pid)?;
    let path = super::query_manager(config).path_for_pid(pid)?;
    println!("{}", path.display());
    Ok(())
}

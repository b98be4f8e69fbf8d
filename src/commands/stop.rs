//! Stop a scope by killing its sentinel

use sysd_scope::Config;

pub fn stop(config: &Config, pid: i32, wait: bool) -> Result<(), Box<dyn std::error::Error>> {
    let pid = super::parse_pid(pid)?;
    let manager = super::query_manager(config);
    manager.check_sentinel(pid)?;

    // Look the scope up before its last member goes away
    let path = if wait {
        Some(manager.path_for_pid(pid)?)
    } else {
        None
    };

    manager.stop_sentinel(pid)?;

    if let Some(path) = path {
        manager.wait_until_removed(&path)?;
        println!("● {} - removed", path.display());
    }
    Ok(())
}

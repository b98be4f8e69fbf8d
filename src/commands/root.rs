//! Show where systemd's cgroup hierarchy is mounted

use sysd_scope::{Config, Layout};

pub fn root(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let root = super::query_manager(config).resolve_root()?;
    let layout = match root.layout {
        Layout::Unified => "unified",
        Layout::Hybrid => "hybrid",
        Layout::Legacy => "legacy",
    };
    println!("{:<8} {}", layout, root.path.display());
    Ok(())
}

//! Create a transient scope

use sysd_scope::signals::SignalHandler;
use sysd_scope::{Config, ScopeManager, ScopeRequest, SystemdBus};

pub fn create(
    config: &Config,
    request: &ScopeRequest,
    hold: bool,
    wait: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    // Handlers go in before the sentinel exists so an early SIGTERM
    // cannot leave it behind
    let held = if hold {
        let rt = tokio::runtime::Runtime::new()?;
        let handler = {
            let _guard = rt.enter();
            SignalHandler::new()?
        };
        Some((rt, handler))
    } else {
        None
    };

    let bus = SystemdBus::connect(config.bus)?;
    let manager = ScopeManager::with_config(bus, config);
    let sentinel = manager.create(request)?;
    println!("{}", sentinel.pid());

    let path = if wait {
        let path = manager.wait_until_attached(&sentinel)?;
        let status = manager.is_delegated(&path)?;
        println!("{} {}", path.display(), status);
        Some(path)
    } else {
        None
    };

    let Some((rt, mut handler)) = held else {
        sentinel.detach();
        return Ok(());
    };

    let signal = rt.block_on(handler.wait());
    log::info!("Received {}, stopping {}", signal.name(), request.scope_name);
    sentinel.terminate()?;

    if let Some(path) = path {
        manager.wait_until_removed(&path)?;
    }
    Ok(())
}

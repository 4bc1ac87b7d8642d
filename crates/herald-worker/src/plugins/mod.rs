//! Bundled command modules.
//!
//! Each module contributes one descriptor; `load_all` assembles the registry
//! that the dispatcher and the menu operate on. The registry is built once at
//! startup and injected, never reached as a global.

pub mod menu;
pub mod ping;
pub mod power;
pub mod status;

use herald_core::{registry::Registry, Result};

pub fn load_all() -> Result<Registry> {
    let mut registry = Registry::new();
    menu::register(&mut registry)?;
    ping::register(&mut registry)?;
    power::register(&mut registry)?;
    status::register(&mut registry)?;
    Ok(registry)
}

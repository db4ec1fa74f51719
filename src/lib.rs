#[path = "../core/link.rs"]
pub mod link;

#[path = "../core/options.rs"]
pub mod options;

#[path = "../core/proxy.rs"]
pub mod proxy;

#[path = "../core/schemes.rs"]
pub mod schemes;

#[path = "../core/dispatch.rs"]
pub mod dispatch;

#[path = "../core/template.rs"]
pub mod template;

#[path = "../core/clash.rs"]
pub mod clash;

#[path = "../core/convert.rs"]
pub mod convert;

/// Routes `log` records from this crate to stderr at the given verbosity.
pub fn initialize_logging(log_level: log::LevelFilter) -> Result<(), log::SetLoggerError> {
    stderrlog::new()
        .module(module_path!())
        .show_module_names(true)
        .verbosity(log_level)
        .init()
}

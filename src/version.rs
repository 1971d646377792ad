/// Release version, taken from `VPNFLEET_VERSION` at build time when set.
pub const VERSION: &str = match option_env!("VPNFLEET_VERSION") {
    Some(version) => version,
    None => env!("CARGO_PKG_VERSION"),
};

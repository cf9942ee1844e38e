//! Portrait background replacement CLI tool
//!
//! Command-line interface over the portrait-bgswap library.

#[cfg(feature = "cli")]
use portrait_bgswap::cli;

#[cfg(feature = "cli")]
fn main() -> anyhow::Result<()> {
    cli::main()
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Please rebuild with --features cli");
    std::process::exit(1);
}

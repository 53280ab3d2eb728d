use clap::Parser;

/// Tickvault - scheduled market and macro data acquisition
///
/// One invocation performs one acquisition cycle: connect to the brokerage
/// gateway, fetch every configured source concurrently, persist the results,
/// and disconnect. Configuration comes entirely from `TICKVAULT_*`
/// environment variables; there are no interactive flags.
///
/// Exit status is 0 on completion even when individual sources fail, and
/// nonzero only when the gateway connection cannot be established within its
/// budget (1), the configuration is invalid (2), or the store cannot be
/// opened (4).
#[derive(Debug, Parser)]
#[command(
    name = "tickvault",
    version,
    about = "Scheduled market and macro data acquisition"
)]
pub struct Cli {}

pub mod run;
pub mod snapshot;

use clap::ValueEnum;
use mongo_compare_indexes::Side;

/// How a command finished when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Clean,
    /// Differences were found and the caller asked to fail on them.
    DifferencesFound,
}

impl Outcome {
    pub fn exit_code(self) -> i32 {
        match self {
            Outcome::Clean => 0,
            Outcome::DifferencesFound => 2,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum SideArg {
    #[default]
    Source,
    Target,
}

impl From<SideArg> for Side {
    fn from(side: SideArg) -> Self {
        match side {
            SideArg::Source => Side::Source,
            SideArg::Target => Side::Target,
        }
    }
}

/// Resolves when the user interrupts the process with Ctrl-C.
pub async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        log::warn!("unable to listen for Ctrl-C, the run cannot be interrupted cleanly");
        std::future::pending::<()>().await;
    }
}

/// How much an analyzer narrates while it runs.
///
/// Passed explicitly to every analyzer call. Frame-level bus traffic is
/// always logged at `trace` by the driver and is filtered by the logger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Verbosity {
    /// Machine-to-machine mode: the analyzer logs nothing itself.
    Quiet,
    /// Progress and final results at `info`.
    #[default]
    Normal,
    /// Adds retries, intermediate readings and phasors at `debug`.
    Verbose,
}

impl Verbosity {
    /// `true` for [`Normal`](Self::Normal) and above.
    pub fn reports(self) -> bool {
        self >= Verbosity::Normal
    }

    /// `true` for [`Verbose`](Self::Verbose).
    pub fn details(self) -> bool {
        self >= Verbosity::Verbose
    }
}

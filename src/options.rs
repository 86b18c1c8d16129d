use bitflags::bitflags;

bitflags! {
    /// Behavioural flags attached to a present request.
    ///
    /// Flags fall into two groups: routing/activation modifiers (`EXCLUSIVE`,
    /// `POPUP`, `MODAL`, `CHILD`) and structural post-present actions
    /// (`DISMISS_CURRENT`, `DISMISS_ALL`, `SINGLETON`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PresentOptions: u32 {
        /// Block command propagation to entries below, handled or not.
        const EXCLUSIVE = 1 << 0;

        /// Lightweight overlay; never combined with `EXCLUSIVE`.
        const POPUP = 1 << 1;

        /// Blocks interaction with entries below while presented.
        const MODAL = 1 << 2;

        /// Entry is owned by the parent passed to the present call.
        const CHILD = 1 << 3;

        /// Dismiss the passed parent entry once this entry is presented.
        const DISMISS_CURRENT = 1 << 4;

        /// Dismiss every other root-level entry once this entry is presented.
        const DISMISS_ALL = 1 << 5;

        /// Dismiss any other live entry of the same controller kind.
        const SINGLETON = 1 << 6;
    }
}

impl PresentOptions {
    /// Check for mutually exclusive combinations.
    pub fn is_valid(self) -> bool {
        !self.contains(PresentOptions::EXCLUSIVE | PresentOptions::POPUP)
    }
}

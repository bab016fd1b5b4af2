use bitflags::bitflags;

bitflags! {
    /// Runestone flags, carried under [`crate::Tag::Flags`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Flags: u128 {
        const ETCHING = 1 << 0;
        const TERMS = 1 << 1;
        const TURBO = 1 << 2;
        const CENOTAPH = 1 << 127;
    }
}

impl Flags {
    /// Clears `flag` and returns whether it was set.
    pub fn take(&mut self, flag: Flags) -> bool {
        let set = self.contains(flag);
        self.remove(flag);
        set
    }
}

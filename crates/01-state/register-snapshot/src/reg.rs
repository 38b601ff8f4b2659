use std::fmt;

/// 16-bit register pairs carried by a [`crate::RegisterSnapshot`].
///
/// The declaration order is the canonical report order and the order of the
/// packed raw-memory block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Reg16 {
    /// Accumulator and flags.
    Af,
    /// General purpose pair `B`/`C`.
    Bc,
    /// General purpose pair `D`/`E`.
    De,
    /// General purpose pair `H`/`L`.
    Hl,
    /// Stack pointer.
    Sp,
    /// Program counter.
    Pc,
}

impl Reg16 {
    /// Every register pair in canonical order.
    pub const ALL: [Reg16; 6] = [
        Reg16::Af,
        Reg16::Bc,
        Reg16::De,
        Reg16::Hl,
        Reg16::Sp,
        Reg16::Pc,
    ];

    /// Position of the pair inside [`Reg16::ALL`].
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Upper-case mnemonic as printed by debugger consoles.
    pub const fn name(self) -> &'static str {
        match self {
            Reg16::Af => "AF",
            Reg16::Bc => "BC",
            Reg16::De => "DE",
            Reg16::Hl => "HL",
            Reg16::Sp => "SP",
            Reg16::Pc => "PC",
        }
    }

    /// Parses a pair mnemonic, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        Reg16::ALL
            .into_iter()
            .find(|reg| reg.name().eq_ignore_ascii_case(name))
    }

    /// Resolves an 8-bit half mnemonic (`A`, `F`, `B`, ...) to its pair and
    /// whether it is the high byte.
    pub fn from_half_name(name: &str) -> Option<(Self, bool)> {
        let half = match name.to_ascii_uppercase().as_str() {
            "A" => (Reg16::Af, true),
            "F" => (Reg16::Af, false),
            "B" => (Reg16::Bc, true),
            "C" => (Reg16::Bc, false),
            "D" => (Reg16::De, true),
            "E" => (Reg16::De, false),
            "H" => (Reg16::Hl, true),
            "L" => (Reg16::Hl, false),
            _ => return None,
        };
        Some(half)
    }
}

impl fmt::Display for Reg16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_lookup() {
        for reg in Reg16::ALL {
            assert_eq!(Reg16::from_name(reg.name()), Some(reg));
            assert_eq!(Reg16::from_name(&reg.name().to_lowercase()), Some(reg));
        }
        assert_eq!(Reg16::from_name("IX"), None);
    }

    #[test]
    fn halves_map_onto_pairs() {
        assert_eq!(Reg16::from_half_name("A"), Some((Reg16::Af, true)));
        assert_eq!(Reg16::from_half_name("f"), Some((Reg16::Af, false)));
        assert_eq!(Reg16::from_half_name("L"), Some((Reg16::Hl, false)));
        assert_eq!(Reg16::from_half_name("S"), None);
    }

    #[test]
    fn index_matches_canonical_order() {
        for (idx, reg) in Reg16::ALL.into_iter().enumerate() {
            assert_eq!(reg.index(), idx);
        }
    }
}

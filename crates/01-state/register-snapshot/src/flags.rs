use std::fmt;

/// Condition flags decoded from the low byte of `AF`.
///
/// Flags are never stored next to a snapshot; they are recomputed from `AF`
/// every time so they cannot drift from the register they live in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Flags {
    /// `Z`, bit 7.
    pub zero: bool,
    /// `N`, bit 6.
    pub subtract: bool,
    /// `H`, bit 5.
    pub half_carry: bool,
    /// `C`, bit 4.
    pub carry: bool,
}

impl Flags {
    /// Decodes the flag bits from an `AF` value.
    #[inline]
    pub const fn from_af(af: u16) -> Self {
        let f = (af & 0x00FF) as u8;
        Self {
            zero: f & 0x80 != 0,
            subtract: f & 0x40 != 0,
            half_carry: f & 0x20 != 0,
            carry: f & 0x10 != 0,
        }
    }

    /// Returns the flags packed back into bits 7..4.
    #[inline]
    pub const fn bits(self) -> u8 {
        (self.zero as u8) << 7
            | (self.subtract as u8) << 6
            | (self.half_carry as u8) << 5
            | (self.carry as u8) << 4
    }
}

/// Renders the set flags as letters (`ZNHC` order); `-` when none are set.
impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letters = [
            (self.zero, 'Z'),
            (self.subtract, 'N'),
            (self.half_carry, 'H'),
            (self.carry, 'C'),
        ];
        let mut any = false;
        for (set, letter) in letters {
            if set {
                write!(f, "{letter}")?;
                any = true;
            }
        }
        if !any {
            f.write_str("-")?;
        }
        Ok(())
    }
}

//! Deterministic stand-in for an emulated CPU.

use register_snapshot::RegisterSnapshot;

/// Register file right after the DMG boot ROM hands over.
pub const POST_BOOT: RegisterSnapshot =
    RegisterSnapshot::from_array([0x01B0, 0x0013, 0x00D8, 0x014D, 0xFFFE, 0x0100]);

/// Produces a register trajectory: `boot_steps` instructions of boot code at
/// `0x00..=0xff`, then a seeded walk starting from [`POST_BOOT`] at `entry`.
///
/// The walk after `entry` depends only on the seed, so two machines with the
/// same seed and different boot lengths agree from the entry point on.
#[derive(Clone, Debug)]
pub struct Machine {
    regs: RegisterSnapshot,
    rng: XorShift,
    boot_remaining: u32,
    entry: u16,
    executed: u64,
}

impl Machine {
    /// Creates a machine at reset.
    pub fn new(seed: u64, boot_steps: u32, entry: u16) -> Self {
        let regs = if boot_steps == 0 {
            POST_BOOT.with(register_snapshot::Reg16::Pc, entry)
        } else {
            RegisterSnapshot::default()
        };
        Self {
            regs,
            rng: XorShift::new(seed),
            boot_remaining: boot_steps,
            entry,
            executed: 0,
        }
    }

    /// Current register file.
    pub fn registers(&self) -> RegisterSnapshot {
        self.regs
    }

    /// Instructions executed since the entry point; `None` while booting.
    pub fn executed(&self) -> Option<u64> {
        (self.boot_remaining == 0).then_some(self.executed)
    }

    /// Executes one instruction.
    pub fn step(&mut self) {
        if self.boot_remaining > 0 {
            self.boot_remaining -= 1;
            self.regs = if self.boot_remaining == 0 {
                POST_BOOT.with(register_snapshot::Reg16::Pc, self.entry)
            } else {
                let mut regs = self.regs;
                regs.pc = (regs.pc + 1) & 0x00FF;
                regs.hl = regs.hl.wrapping_add(1);
                regs
            };
            return;
        }

        let r = self.rng.next();
        let regs = &mut self.regs;
        regs.pc = regs.pc.wrapping_add(1 + (r % 3) as u16);
        let a = (r >> 8) as u8;
        let f = (r >> 16) as u8 & 0xF0;
        regs.af = u16::from_be_bytes([a, f]);
        regs.bc = regs.bc.wrapping_add((r >> 24) as u16 & 0x000F);
        regs.de ^= (r >> 28) as u16 & 0x0101;
        regs.hl = regs.hl.wrapping_add((r >> 32) as u16 & 0x0003);
        match (r >> 40) & 0x7 {
            0 => regs.sp = regs.sp.wrapping_sub(2),
            1 => regs.sp = regs.sp.wrapping_add(2),
            _ => {}
        }
        self.executed += 1;
    }
}

/// xorshift64*; plenty for a reproducible register walk.
#[derive(Clone, Debug)]
struct XorShift(u64);

impl XorShift {
    fn new(seed: u64) -> Self {
        Self(if seed == 0 { 0x9E37_79B9_7F4A_7C15 } else { seed })
    }

    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.0 = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }
}

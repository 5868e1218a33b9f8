use bitflags::bitflags;
use core::ptr::NonNull;

pub(crate) const TBXCTL: usize = 0x00;
pub(crate) const TBXR: usize = 0x10;
pub(crate) const TBXEX0: usize = 0x20;
pub(crate) const TBXIV: usize = 0x2E;

/// Size of a Timer_B7 register block in 16-bit words
pub const BLOCK_WORDS: usize = 0x18;

bitflags! {
    /// TBxCTL fields
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Tbctl: u16 {
        const TBIFG = 1 << 0;
        const TBIE = 1 << 1;
        const TBCLR = 1 << 2;
        const MC = 0b11 << 4;
        const ID = 0b11 << 6;
        const TBSSEL = 0b11 << 8;
        const CNTL = 0b11 << 11;
        const TBCLGRP = 0b11 << 13;
    }
}

bitflags! {
    /// TBxCCTLn fields
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Tbcctl: u16 {
        const CCIFG = 1 << 0;
        const COV = 1 << 1;
        const OUT = 1 << 2;
        const CCI = 1 << 3;
        const CCIE = 1 << 4;
        const OUTMOD = 0b111 << 5;
        const CAP = 1 << 8;
        const CLLD = 0b11 << 9;
        const SCS = 1 << 11;
        const CCIS = 0b11 << 12;
        const CM = 0b11 << 14;
    }
}

const TBIDEX: u16 = 0b111;

#[derive(Clone, Copy)]
pub enum Tbssel {
    Tbxclk,
    Aclk,
    Smclk,
    Inclk,
}

#[derive(Clone, Copy)]
enum Mc {
    Up = 1,
    Continuous = 2,
    UpDown = 3,
}

/// Timer clock divider
#[derive(Clone, Copy)]
pub enum TimerDiv {
    /// No division
    _1,
    /// Divide by 2
    _2,
    /// Divide by 4
    _4,
    /// Divide by 8
    _8,
}

/// Timer expansion clock divider, applied on top of the normal clock divider
#[derive(Clone, Copy)]
pub enum TimerExDiv {
    /// No division
    _1,
    /// Divide by 2
    _2,
    /// Divide by 3
    _3,
    /// Divide by 4
    _4,
    /// Divide by 5
    _5,
    /// Divide by 6
    _6,
    /// Divide by 7
    _7,
    /// Divide by 8
    _8,
}

/// Counter length. The counter wraps at the selected width in continuous mode.
#[derive(Clone, Copy)]
pub enum Cntl {
    /// 16-bit counter, wraps at 0xFFFF
    _16Bit,
    /// 12-bit counter, wraps at 0x0FFF
    _12Bit,
    /// 10-bit counter, wraps at 0x03FF
    _10Bit,
    /// 8-bit counter, wraps at 0x00FF
    _8Bit,
}

/// Grouping of compare latches that load simultaneously
#[derive(Clone, Copy)]
pub enum Tbclgrp {
    /// Every compare latch loads independently
    Individual,
    /// TBxCL1+TBxCL2, TBxCL3+TBxCL4, TBxCL5+TBxCL6 load together
    Pairs,
    /// TBxCL1 to TBxCL3 and TBxCL4 to TBxCL6 load together
    Triplets,
    /// All compare latches load together
    All,
}

/// Event that loads a compare register into its compare latch
#[derive(Clone, Copy)]
pub enum Clld {
    /// Load immediately when TBxCCRn is written
    OnWrite,
    /// Load when the counter reaches 0
    OnZero,
    /// Load when the counter reaches 0 in up or continuous mode, or 0 or TBxCL0 in up/down mode
    OnZeroOrPeriod,
    /// Load when the counter reaches the current compare latch value
    OnCompare,
}

/// Compare output mode
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outmod {
    /// Output follows the OUT bit
    Out,
    /// Set on compare
    Set,
    /// Toggle on compare, reset on CCR0
    ToggleReset,
    /// Set on compare, reset on CCR0
    SetReset,
    /// Toggle on compare
    Toggle,
    /// Reset on compare
    Reset,
    /// Toggle on compare, set on CCR0
    ToggleSet,
    /// Reset on compare, set on CCR0
    ResetSet,
}

#[derive(Clone, Copy)]
pub enum Cm {
    RisingEdge = 1,
    FallingEdge = 2,
    BothEdges = 3,
}

#[derive(Clone, Copy)]
pub enum Ccis {
    InputA,
    InputB,
    Gnd,
    Vcc,
}

/// Timer_B7 register block. Owning one of these grants access to every register of the timer
/// instance it points to.
pub struct TimerB7 {
    base: NonNull<u16>,
}

// Register block is plain MMIO, not tied to any thread
unsafe impl Send for TimerB7 {}

impl TimerB7 {
    /// Base address of TB0 on MSP430F5xx/6xx devices
    pub const TB0_BASE: usize = 0x03C0;

    /// Take the TB0 register block.
    ///
    /// # Safety
    ///
    /// The caller must ensure no other handle to TB0 exists.
    pub unsafe fn tb0() -> Self {
        Self::from_ptr(Self::TB0_BASE as *mut u16)
    }

    /// Create a register block handle from its base address.
    ///
    /// # Safety
    ///
    /// `base` must be non-null and point to a Timer_B7 register block, or to [`BLOCK_WORDS`]
    /// words of memory, that stays valid while this handle or anything derived from it is alive.
    /// No other handle to the same block may exist.
    pub unsafe fn from_ptr(base: *mut u16) -> Self {
        TimerB7 {
            base: NonNull::new_unchecked(base),
        }
    }

    // Second handle to the same block, used by the per-channel objects
    #[inline(always)]
    pub(crate) unsafe fn alias(&self) -> Self {
        TimerB7 { base: self.base }
    }

    #[inline(always)]
    pub(crate) fn read(&self, offset: usize) -> u16 {
        unsafe { self.base.as_ptr().add(offset >> 1).read_volatile() }
    }

    #[inline(always)]
    pub(crate) fn write(&self, offset: usize, value: u16) {
        unsafe { self.base.as_ptr().add(offset >> 1).write_volatile(value) }
    }

    #[inline(always)]
    fn modify<F: FnOnce(u16) -> u16>(&self, offset: usize, f: F) {
        critical_section::with(|_| self.write(offset, f(self.read(offset))));
    }

    #[inline(always)]
    fn set_bits(&self, offset: usize, bits: u16) {
        self.modify(offset, |r| r | bits);
    }

    #[inline(always)]
    fn clear_bits(&self, offset: usize, bits: u16) {
        self.modify(offset, |r| r & !bits);
    }

    #[inline(always)]
    fn set_mc(&self, mc: Mc) {
        self.modify(TBXCTL, |r| {
            let r = Tbctl::from_bits_retain(r).difference(Tbctl::MC | Tbctl::TBIFG) | Tbctl::TBCLR;
            r.bits() | ((mc as u16) << 4)
        });
    }
}

pub trait TimerB {
    /// Reset timer countdown
    fn reset(&self);

    /// Set to upmode, reset timer, and clear interrupts
    fn upmode(&self);
    /// Set to continuous mode, reset timer, and clear interrupts
    fn continuous(&self);
    /// Set to up/down mode, reset timer, and clear interrupts
    fn updown(&self);

    /// Apply clock select and counter settings. Stops the timer and disables its interrupt.
    fn config_clock(&self, tbssel: Tbssel, div: TimerDiv, cntl: Cntl, tbclgrp: Tbclgrp);
    fn config_cntl(&self, cntl: Cntl);
    fn config_tbclgrp(&self, tbclgrp: Tbclgrp);

    /// Check if timer is stopped
    fn is_stopped(&self) -> bool;

    /// Stop timer
    fn stop(&self);

    /// Set expansion register clock divider settings
    fn set_tbidex(&self, tbidex: TimerExDiv);

    fn tbifg_rd(&self) -> bool;
    fn tbifg_clr(&self);

    fn tbie_set(&self);
    fn tbie_clr(&self);

    fn tbxiv_rd(&self) -> u16;

    /// Single raw read of the counter, which may race a counter increment
    fn tbxr_rd(&self) -> u16;
}

impl TimerB for TimerB7 {
    #[inline(always)]
    fn reset(&self) {
        self.set_bits(TBXCTL, Tbctl::TBCLR.bits());
    }

    #[inline(always)]
    fn upmode(&self) {
        self.set_mc(Mc::Up);
    }

    #[inline(always)]
    fn continuous(&self) {
        self.set_mc(Mc::Continuous);
    }

    #[inline(always)]
    fn updown(&self) {
        self.set_mc(Mc::UpDown);
    }

    #[inline(always)]
    fn config_clock(&self, tbssel: Tbssel, div: TimerDiv, cntl: Cntl, tbclgrp: Tbclgrp) {
        self.write(
            TBXCTL,
            ((tbclgrp as u16) << 13)
                | ((cntl as u16) << 11)
                | ((tbssel as u16) << 8)
                | ((div as u16) << 6),
        );
    }

    #[inline(always)]
    fn config_cntl(&self, cntl: Cntl) {
        self.modify(TBXCTL, |r| (r & !Tbctl::CNTL.bits()) | ((cntl as u16) << 11));
    }

    #[inline(always)]
    fn config_tbclgrp(&self, tbclgrp: Tbclgrp) {
        self.modify(TBXCTL, |r| (r & !Tbctl::TBCLGRP.bits()) | ((tbclgrp as u16) << 13));
    }

    #[inline(always)]
    fn is_stopped(&self) -> bool {
        !Tbctl::from_bits_retain(self.read(TBXCTL)).intersects(Tbctl::MC)
    }

    #[inline(always)]
    fn stop(&self) {
        self.clear_bits(TBXCTL, Tbctl::MC.bits());
    }

    #[inline(always)]
    fn set_tbidex(&self, tbidex: TimerExDiv) {
        self.write(TBXEX0, tbidex as u16 & TBIDEX);
    }

    #[inline(always)]
    fn tbifg_rd(&self) -> bool {
        Tbctl::from_bits_retain(self.read(TBXCTL)).contains(Tbctl::TBIFG)
    }

    #[inline(always)]
    fn tbifg_clr(&self) {
        self.clear_bits(TBXCTL, Tbctl::TBIFG.bits());
    }

    #[inline(always)]
    fn tbie_set(&self) {
        self.set_bits(TBXCTL, Tbctl::TBIE.bits());
    }

    #[inline(always)]
    fn tbie_clr(&self) {
        self.clear_bits(TBXCTL, Tbctl::TBIE.bits());
    }

    #[inline(always)]
    fn tbxiv_rd(&self) -> u16 {
        self.read(TBXIV)
    }

    #[inline(always)]
    fn tbxr_rd(&self) -> u16 {
        self.read(TBXR)
    }
}

/// Label for capture-compare register 0
pub struct CCR0;
/// Label for capture-compare register 1
pub struct CCR1;
/// Label for capture-compare register 2
pub struct CCR2;
/// Label for capture-compare register 3
pub struct CCR3;
/// Label for capture-compare register 4
pub struct CCR4;
/// Label for capture-compare register 5
pub struct CCR5;
/// Label for capture-compare register 6
pub struct CCR6;

pub trait CCRn<C> {
    fn set_ccrn(&self, count: u16);
    fn get_ccrn(&self) -> u16;

    /// Put the register in compare mode with the given output mode
    fn config_outmod(&self, outmod: Outmod);
    fn config_cap_mode(&self, cm: Cm, ccis: Ccis, sync: bool);
    /// Change only the capture input and trigger edge, keeping pending flags
    fn config_ccis_cm(&self, cm: Cm, ccis: Ccis);
    fn config_clld(&self, clld: Clld);

    fn ccifg_rd(&self) -> bool;
    fn ccifg_clr(&self);

    fn ccie_set(&self);
    fn ccie_clr(&self);

    fn cov_ccifg_rd(&self) -> (bool, bool);
    fn cov_ccifg_clr(&self);

    fn cci_rd(&self) -> bool;

    fn out_rd(&self) -> bool;
    fn out_wr(&self, high: bool);
}

macro_rules! ccrn_impl {
    ($CCRn:ident, $tbxcctln:expr, $tbxccrn:expr) => {
        impl CCRn<$CCRn> for TimerB7 {
            #[inline(always)]
            fn set_ccrn(&self, count: u16) {
                self.write($tbxccrn, count);
            }

            #[inline(always)]
            fn get_ccrn(&self) -> u16 {
                self.read($tbxccrn)
            }

            #[inline(always)]
            fn config_outmod(&self, outmod: Outmod) {
                self.modify($tbxcctln, |r| {
                    (r & !(Tbcctl::CAP | Tbcctl::OUTMOD).bits()) | ((outmod as u16) << 5)
                });
            }

            #[inline(always)]
            fn config_cap_mode(&self, cm: Cm, ccis: Ccis, sync: bool) {
                let scs = if sync { Tbcctl::SCS.bits() } else { 0 };
                self.modify($tbxcctln, |r| {
                    let keep = r & (Tbcctl::CCIE | Tbcctl::CLLD).bits();
                    keep | Tbcctl::CAP.bits() | scs | ((ccis as u16) << 12) | ((cm as u16) << 14)
                });
            }

            #[inline(always)]
            fn config_ccis_cm(&self, cm: Cm, ccis: Ccis) {
                self.modify($tbxcctln, |r| {
                    (r & !(Tbcctl::CCIS | Tbcctl::CM).bits())
                        | ((ccis as u16) << 12)
                        | ((cm as u16) << 14)
                });
            }

            #[inline(always)]
            fn config_clld(&self, clld: Clld) {
                self.modify($tbxcctln, |r| (r & !Tbcctl::CLLD.bits()) | ((clld as u16) << 9));
            }

            #[inline(always)]
            fn ccifg_rd(&self) -> bool {
                Tbcctl::from_bits_retain(self.read($tbxcctln)).contains(Tbcctl::CCIFG)
            }

            #[inline(always)]
            fn ccifg_clr(&self) {
                self.clear_bits($tbxcctln, Tbcctl::CCIFG.bits());
            }

            #[inline(always)]
            fn ccie_set(&self) {
                self.set_bits($tbxcctln, Tbcctl::CCIE.bits());
            }

            #[inline(always)]
            fn ccie_clr(&self) {
                self.clear_bits($tbxcctln, Tbcctl::CCIE.bits());
            }

            #[inline(always)]
            fn cov_ccifg_rd(&self) -> (bool, bool) {
                let cctl = Tbcctl::from_bits_retain(self.read($tbxcctln));
                (cctl.contains(Tbcctl::COV), cctl.contains(Tbcctl::CCIFG))
            }

            #[inline(always)]
            fn cov_ccifg_clr(&self) {
                self.clear_bits($tbxcctln, (Tbcctl::COV | Tbcctl::CCIFG).bits());
            }

            #[inline(always)]
            fn cci_rd(&self) -> bool {
                Tbcctl::from_bits_retain(self.read($tbxcctln)).contains(Tbcctl::CCI)
            }

            #[inline(always)]
            fn out_rd(&self) -> bool {
                Tbcctl::from_bits_retain(self.read($tbxcctln)).contains(Tbcctl::OUT)
            }

            #[inline(always)]
            fn out_wr(&self, high: bool) {
                if high {
                    self.set_bits($tbxcctln, Tbcctl::OUT.bits());
                } else {
                    self.clear_bits($tbxcctln, Tbcctl::OUT.bits());
                }
            }
        }
    };
}

ccrn_impl!(CCR0, 0x02, 0x12);
ccrn_impl!(CCR1, 0x04, 0x14);
ccrn_impl!(CCR2, 0x06, 0x16);
ccrn_impl!(CCR3, 0x08, 0x18);
ccrn_impl!(CCR4, 0x0A, 0x1A);
ccrn_impl!(CCR5, 0x0C, 0x1C);
ccrn_impl!(CCR6, 0x0E, 0x1E);


#[cfg(test)]
mod tests {
    use super::fake::FakeBlock;
    use super::*;

    fn cctl(tb: &TimerB7, n: usize) -> Tbcctl {
        Tbcctl::from_bits_retain(tb.read(0x02 + 2 * n))
    }

    #[test]
    fn config_clock_packs_every_field() {
        let mut block = FakeBlock::new();
        let tb = block.periph();
        tb.write(TBXCTL, 0xFFFF);
        tb.config_clock(Tbssel::Smclk, TimerDiv::_8, Cntl::_10Bit, Tbclgrp::Triplets);

        let ctl = tb.read(TBXCTL);
        assert_eq!(ctl, (2 << 13) | (2 << 11) | (2 << 8) | (3 << 6));
        assert!(tb.is_stopped());
    }

    #[test]
    fn mode_changes_clear_counter_and_flag() {
        let mut block = FakeBlock::new();
        let tb = block.periph();
        tb.write(TBXCTL, Tbctl::TBIFG.bits() | Tbctl::TBIE.bits());

        tb.upmode();
        let ctl = Tbctl::from_bits_retain(tb.read(TBXCTL));
        assert_eq!(ctl.bits() & Tbctl::MC.bits(), 1 << 4);
        assert!(ctl.contains(Tbctl::TBCLR | Tbctl::TBIE));
        assert!(!ctl.contains(Tbctl::TBIFG));

        tb.updown();
        assert_eq!(tb.read(TBXCTL) & Tbctl::MC.bits(), 3 << 4);
        tb.continuous();
        assert_eq!(tb.read(TBXCTL) & Tbctl::MC.bits(), 2 << 4);
        assert!(!tb.is_stopped());

        tb.stop();
        assert!(tb.is_stopped());
        assert!(Tbctl::from_bits_retain(tb.read(TBXCTL)).contains(Tbctl::TBIE));
    }

    #[test]
    fn counter_length_and_latch_group_keep_other_fields() {
        let mut block = FakeBlock::new();
        let tb = block.periph();
        tb.config_clock(Tbssel::Aclk, TimerDiv::_2, Cntl::_16Bit, Tbclgrp::Individual);
        tb.config_cntl(Cntl::_8Bit);
        tb.config_tbclgrp(Tbclgrp::All);

        assert_eq!(tb.read(TBXCTL), (3 << 13) | (3 << 11) | (1 << 8) | (1 << 6));
    }

    #[test]
    fn expansion_divider() {
        let mut block = FakeBlock::new();
        let tb = block.periph();
        tb.set_tbidex(TimerExDiv::_5);
        assert_eq!(tb.read(TBXEX0), 4);
    }

    #[test]
    fn ccr_offsets_do_not_overlap() {
        let mut block = FakeBlock::new();
        let tb = block.periph();
        CCRn::<CCR0>::set_ccrn(&tb, 100);
        CCRn::<CCR3>::set_ccrn(&tb, 300);
        CCRn::<CCR6>::set_ccrn(&tb, 600);

        assert_eq!(tb.read(0x12), 100);
        assert_eq!(tb.read(0x18), 300);
        assert_eq!(tb.read(0x1E), 600);
        assert_eq!(CCRn::<CCR3>::get_ccrn(&tb), 300);
        assert_eq!(tb.read(TBXR), 0);
    }

    #[test]
    fn capture_mode_bits() {
        let mut block = FakeBlock::new();
        let tb = block.periph();
        CCRn::<CCR2>::ccie_set(&tb);
        CCRn::<CCR2>::config_cap_mode(&tb, Cm::BothEdges, Ccis::InputB, true);

        let reg = cctl(&tb, 2);
        assert!(reg.contains(Tbcctl::CAP | Tbcctl::SCS | Tbcctl::CCIE));
        assert_eq!(reg.bits() & Tbcctl::CM.bits(), 3 << 14);
        assert_eq!(reg.bits() & Tbcctl::CCIS.bits(), 1 << 12);

        CCRn::<CCR2>::config_cap_mode(&tb, Cm::RisingEdge, Ccis::Gnd, false);
        let reg = cctl(&tb, 2);
        assert!(!reg.contains(Tbcctl::SCS));
        assert_eq!(reg.bits() & Tbcctl::CCIS.bits(), 2 << 12);
    }

    #[test]
    fn input_and_edge_change_keeps_flags() {
        let mut block = FakeBlock::new();
        let tb = block.periph();
        CCRn::<CCR5>::config_cap_mode(&tb, Cm::RisingEdge, Ccis::Vcc, true);
        tb.write(0x0C, tb.read(0x0C) | (Tbcctl::CCIFG | Tbcctl::COV).bits());

        CCRn::<CCR5>::config_ccis_cm(&tb, Cm::FallingEdge, Ccis::Gnd);
        let reg = cctl(&tb, 5);
        assert!(reg.contains(Tbcctl::CCIFG | Tbcctl::COV | Tbcctl::CAP | Tbcctl::SCS));
        assert_eq!(reg.bits() & Tbcctl::CCIS.bits(), 2 << 12);
        assert_eq!(reg.bits() & Tbcctl::CM.bits(), 2 << 14);
    }

    #[test]
    fn compare_mode_keeps_latch_load() {
        let mut block = FakeBlock::new();
        let tb = block.periph();
        CCRn::<CCR1>::config_cap_mode(&tb, Cm::RisingEdge, Ccis::InputA, true);
        CCRn::<CCR1>::config_clld(&tb, Clld::OnCompare);
        CCRn::<CCR1>::config_outmod(&tb, Outmod::ResetSet);

        let reg = cctl(&tb, 1);
        assert!(!reg.contains(Tbcctl::CAP));
        assert_eq!(reg.bits() & Tbcctl::OUTMOD.bits(), 7 << 5);
        assert_eq!(reg.bits() & Tbcctl::CLLD.bits(), 3 << 9);
    }

    #[test]
    fn flag_clearing() {
        let mut block = FakeBlock::new();
        let tb = block.periph();
        tb.write(0x08, (Tbcctl::COV | Tbcctl::CCIFG | Tbcctl::CCIE).bits());

        assert_eq!(CCRn::<CCR3>::cov_ccifg_rd(&tb), (true, true));
        CCRn::<CCR3>::cov_ccifg_clr(&tb);
        assert_eq!(CCRn::<CCR3>::cov_ccifg_rd(&tb), (false, false));
        assert!(cctl(&tb, 3).contains(Tbcctl::CCIE));
    }

    #[test]
    fn out_bit() {
        let mut block = FakeBlock::new();
        let tb = block.periph();
        CCRn::<CCR4>::out_wr(&tb, true);
        assert!(CCRn::<CCR4>::out_rd(&tb));
        CCRn::<CCR4>::out_wr(&tb, false);
        assert!(!CCRn::<CCR4>::out_rd(&tb));
    }
}

//! Timer abstraction
//!
//! Splits a Timer_B7 peripheral into a main [`Timer`], which owns the counter and capture-compare
//! register 0, and six [`SubTimer`]s, each backed by one of the remaining capture-compare
//! registers. The main timer counts up to the period stored in CCR0 (or freely in continuous
//! mode) while each subtimer raises its own flag when the counter matches its compare value.

use crate::counter::Counter;
use crate::hw_traits::timerb::{CCRn, Tbssel, TimerB};
use core::convert::Infallible;
use core::marker::PhantomData;

pub use crate::hw_traits::timerb::{
    Clld, Cntl, Outmod, Tbclgrp, TimerB7, TimerDiv, TimerExDiv, BLOCK_WORDS, CCR0, CCR1, CCR2,
    CCR3, CCR4, CCR5, CCR6,
};

/// Configures all HAL objects that use the TimerB timers
pub struct TimerConfig {
    sel: Tbssel,
    div: TimerDiv,
    ex_div: TimerExDiv,
    cntl: Cntl,
    tbclgrp: Tbclgrp,
}

impl TimerConfig {
    fn new(sel: Tbssel) -> Self {
        TimerConfig {
            sel,
            div: TimerDiv::_1,
            ex_div: TimerExDiv::_1,
            cntl: Cntl::_16Bit,
            tbclgrp: Tbclgrp::Individual,
        }
    }

    /// Configure timer clock source to ACLK
    #[inline]
    pub fn aclk() -> Self {
        Self::new(Tbssel::Aclk)
    }

    /// Configure timer clock source to SMCLK
    #[inline]
    pub fn smclk() -> Self {
        Self::new(Tbssel::Smclk)
    }

    /// Configure timer clock source to the external TBxCLK pin
    #[inline]
    pub fn tbclk() -> Self {
        Self::new(Tbssel::Tbxclk)
    }

    /// Configure timer clock source to the inverted external TBxCLK pin
    #[inline]
    pub fn inclk() -> Self {
        Self::new(Tbssel::Inclk)
    }

    /// Configure the normal clock divider and expansion clock divider settings
    #[inline]
    pub fn clk_div(self, div: TimerDiv, ex_div: TimerExDiv) -> Self {
        TimerConfig {
            div,
            ex_div,
            ..self
        }
    }

    /// Configure the width of the counter. Defaults to 16 bits.
    #[inline]
    pub fn counter_length(self, cntl: Cntl) -> Self {
        TimerConfig { cntl, ..self }
    }

    /// Configure which compare latches load together. Defaults to individual loading.
    #[inline]
    pub fn latch_group(self, tbclgrp: Tbclgrp) -> Self {
        TimerConfig { tbclgrp, ..self }
    }

    #[inline]
    pub(crate) fn write_regs(self, timer: &TimerB7) {
        timer.set_tbidex(self.ex_div);
        timer.config_clock(self.sel, self.div, self.cntl, self.tbclgrp);
        // Clearing after the divider change also resets the divider logic
        timer.reset();
    }
}

/// Collection of timer and subtimers derived from a Timer_B7 peripheral
pub struct TimerParts {
    /// Main timer
    pub timer: Timer,
    /// Subtimer 1 (derived from capture-compare register 1)
    pub subtimer1: SubTimer<CCR1>,
    /// Subtimer 2 (derived from capture-compare register 2)
    pub subtimer2: SubTimer<CCR2>,
    /// Subtimer 3 (derived from capture-compare register 3)
    pub subtimer3: SubTimer<CCR3>,
    /// Subtimer 4 (derived from capture-compare register 4)
    pub subtimer4: SubTimer<CCR4>,
    /// Subtimer 5 (derived from capture-compare register 5)
    pub subtimer5: SubTimer<CCR5>,
    /// Subtimer 6 (derived from capture-compare register 6)
    pub subtimer6: SubTimer<CCR6>,
}

impl TimerParts {
    /// Create new set of timers out of a Timer_B7 peripheral. The timer is left stopped.
    #[inline(always)]
    pub fn new(periph: TimerB7, config: TimerConfig) -> Self {
        config.write_regs(&periph);
        let parts = unsafe {
            TimerParts {
                subtimer1: SubTimer::new(periph.alias()),
                subtimer2: SubTimer::new(periph.alias()),
                subtimer3: SubTimer::new(periph.alias()),
                subtimer4: SubTimer::new(periph.alias()),
                subtimer5: SubTimer::new(periph.alias()),
                subtimer6: SubTimer::new(periph.alias()),
                timer: Timer { periph },
            }
        };
        CCRn::<CCR0>::config_outmod(&parts.timer.periph, Outmod::Out);
        parts
    }
}

/// Periodic countdown timer
pub struct Timer {
    periph: TimerB7,
}

impl Timer {
    /// Count up to `period` in up mode, then restart from 0. The timer flag is raised on every
    /// wrap to 0.
    #[inline]
    pub fn start(&mut self, period: u16) {
        // 2 reads 1 write if timer is already stopped, 2 reads 2 writes if timer is not stopped
        if !self.periph.is_stopped() {
            self.periph.stop();
        }
        CCRn::<CCR0>::set_ccrn(&self.periph, period);
        self.periph.upmode();
    }

    /// Count up to `period`, then back down to 0. The timer flag is raised when the count
    /// reaches 0.
    #[inline]
    pub fn start_updown(&mut self, period: u16) {
        if !self.periph.is_stopped() {
            self.periph.stop();
        }
        CCRn::<CCR0>::set_ccrn(&self.periph, period);
        self.periph.updown();
    }

    /// Count freely up to the maximum value of the configured counter length. The timer flag is
    /// raised on every overflow.
    #[inline]
    pub fn start_continuous(&mut self) {
        self.periph.continuous();
    }

    /// Halt the counter without clearing it
    #[inline]
    pub fn stop(&mut self) {
        self.periph.stop();
    }

    /// Check whether the counter is running
    #[inline]
    pub fn is_running(&self) -> bool {
        !self.periph.is_stopped()
    }

    /// Reset the counter, clock divider logic, and count direction
    #[inline]
    pub fn clear(&mut self) {
        self.periph.reset();
    }

    /// Check whether the timer flag is set, and clear it if it is
    #[inline]
    pub fn wait(&mut self) -> nb::Result<(), Infallible> {
        if self.periph.tbifg_rd() {
            self.periph.tbifg_clr();
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }

    /// Enable timer countdown expiration interrupts
    #[inline]
    pub fn enable_interrupts(&mut self) {
        self.periph.tbie_set();
    }

    /// Disable timer countdown expiration interrupts
    #[inline]
    pub fn disable_interrupts(&mut self) {
        self.periph.tbie_clr();
    }

    /// Check whether the timer flag is set without clearing it
    #[inline]
    pub fn interrupt_pending(&self) -> bool {
        self.periph.tbifg_rd()
    }

    /// Enable the CCR0 interrupt, raised when the count reaches the period. In up/down mode this
    /// is the only event at the top of the count. It has its own interrupt vector and never shows
    /// up in TBxIV.
    #[inline]
    pub fn enable_period_interrupt(&mut self) {
        CCRn::<CCR0>::ccie_set(&self.periph);
    }

    /// Disable the CCR0 interrupt
    #[inline]
    pub fn disable_period_interrupt(&mut self) {
        CCRn::<CCR0>::ccie_clr(&self.periph);
    }

    /// Check whether the count has reached the period, and clear the CCR0 flag if it has
    #[inline]
    pub fn wait_period(&mut self) -> nb::Result<(), Infallible> {
        if CCRn::<CCR0>::ccifg_rd(&self.periph) {
            CCRn::<CCR0>::ccifg_clr(&self.periph);
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }

    /// Change the counter width while keeping the other settings
    #[inline]
    pub fn set_counter_length(&mut self, cntl: Cntl) {
        self.periph.config_cntl(cntl);
    }

    /// Change which compare latches load together
    #[inline]
    pub fn set_latch_group(&mut self, tbclgrp: Tbclgrp) {
        self.periph.config_tbclgrp(tbclgrp);
    }

    /// Read the interrupt vector register, which clears the highest priority pending flag
    #[inline]
    pub fn interrupt_vector(&mut self) -> TimerVector {
        read_tbxiv(&self.periph)
    }

    /// Handle for reading the live counter
    #[inline]
    pub fn counter(&self) -> Counter {
        Counter::new(unsafe { self.periph.alias() })
    }
}

/// Timer that shares the counter of the main timer and fires when the count matches its own
/// compare value
pub struct SubTimer<C> {
    periph: TimerB7,
    _ccr: PhantomData<C>,
}

impl<C> SubTimer<C>
where
    TimerB7: CCRn<C>,
{
    fn new(periph: TimerB7) -> Self {
        CCRn::<C>::config_outmod(&periph, Outmod::Out);
        SubTimer {
            periph,
            _ccr: PhantomData,
        }
    }

    /// Set the count at which the subtimer fires, and clear any pending flag
    #[inline]
    pub fn set_count(&mut self, count: u16) {
        CCRn::<C>::set_ccrn(&self.periph, count);
        CCRn::<C>::ccifg_clr(&self.periph);
    }

    /// Current compare count
    #[inline]
    pub fn count(&self) -> u16 {
        CCRn::<C>::get_ccrn(&self.periph)
    }

    /// Check whether the subtimer flag is set, and clear it if it is
    #[inline]
    pub fn wait(&mut self) -> nb::Result<(), Infallible> {
        if CCRn::<C>::ccifg_rd(&self.periph) {
            CCRn::<C>::ccifg_clr(&self.periph);
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }

    /// Enable subtimer interrupts
    #[inline]
    pub fn enable_interrupts(&mut self) {
        CCRn::<C>::ccie_set(&self.periph);
    }

    /// Disable subtimer interrupts
    #[inline]
    pub fn disable_interrupts(&mut self) {
        CCRn::<C>::ccie_clr(&self.periph);
    }

    /// Select how the output signal reacts to compare matches
    #[inline]
    pub fn set_output_mode(&mut self, outmod: Outmod) {
        CCRn::<C>::config_outmod(&self.periph, outmod);
    }

    /// Select when a new compare count takes effect
    #[inline]
    pub fn set_latch_load(&mut self, clld: Clld) {
        CCRn::<C>::config_clld(&self.periph, clld);
    }

    /// Level of the OUT bit
    #[inline]
    pub fn output(&self) -> bool {
        CCRn::<C>::out_rd(&self.periph)
    }

    /// Drive the output directly. Only has a visible effect in [`Outmod::Out`].
    #[inline]
    pub fn set_output(&mut self, high: bool) {
        CCRn::<C>::out_wr(&self.periph, high);
    }
}

/// Sources of the TBxIV interrupt vector
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerVector {
    /// No pending interrupt
    NoInterrupt,
    /// Interrupt caused by capture-compare register 1
    SubTimer1,
    /// Interrupt caused by capture-compare register 2
    SubTimer2,
    /// Interrupt caused by capture-compare register 3
    SubTimer3,
    /// Interrupt caused by capture-compare register 4
    SubTimer4,
    /// Interrupt caused by capture-compare register 5
    SubTimer5,
    /// Interrupt caused by capture-compare register 6
    SubTimer6,
    /// Interrupt caused by main timer overflow
    MainTimer,
}

#[inline]
pub(crate) fn read_tbxiv<T: TimerB>(timer: &T) -> TimerVector {
    match timer.tbxiv_rd() {
        0x02 => TimerVector::SubTimer1,
        0x04 => TimerVector::SubTimer2,
        0x06 => TimerVector::SubTimer3,
        0x08 => TimerVector::SubTimer4,
        0x0A => TimerVector::SubTimer5,
        0x0C => TimerVector::SubTimer6,
        0x0E => TimerVector::MainTimer,
        _ => TimerVector::NoInterrupt,
    }
}

#[cfg(feature = "embedded-hal-02")]
mod ehal02 {
    use super::{Timer, TimerB};
    use embedded_hal_02::timer::{Cancel, CountDown, Periodic};

    impl CountDown for Timer {
        type Time = u16;

        #[inline]
        fn start<U: Into<Self::Time>>(&mut self, count: U) {
            Timer::start(self, count.into());
        }

        #[inline]
        fn wait(&mut self) -> nb::Result<(), void::Void> {
            match Timer::wait(self) {
                Ok(()) => Ok(()),
                Err(nb::Error::WouldBlock) => Err(nb::Error::WouldBlock),
                Err(nb::Error::Other(e)) => match e {},
            }
        }
    }

    impl Cancel for Timer {
        type Error = void::Void;

        #[inline(always)]
        fn cancel(&mut self) -> Result<(), Self::Error> {
            self.periph.stop();
            Ok(())
        }
    }

    impl Periodic for Timer {}
}

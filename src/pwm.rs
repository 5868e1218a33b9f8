//! PWM ports
//!
//! Configures a Timer_B7 peripheral into a PWM port. A PWM port consists of six PWM pins which
//! all share the same period, stored in capture-compare register 0, but have their own duty
//! cycles.
//!
//! Every pin starts out enabled in reset/set mode with a duty cycle of 0, so its output stays low
//! until a duty cycle is set.

use crate::hw_traits::timerb::{CCRn, TimerB};
use core::convert::Infallible;
use core::marker::PhantomData;
use embedded_hal::pwm::{ErrorType, SetDutyCycle};

pub use crate::timer::{
    Clld, Outmod, TimerB7, TimerConfig, TimerDiv, TimerExDiv, CCR0, CCR1, CCR2, CCR3, CCR4,
    CCR5, CCR6,
};

fn setup_pwm(timer: &TimerB7, config: TimerConfig, period: u16) {
    config.write_regs(timer);
    CCRn::<CCR0>::set_ccrn(timer, period);
    CCRn::<CCR0>::ccie_clr(timer);
    CCRn::<CCR0>::config_outmod(timer, Outmod::Out);
}

/// Collection of PWM pins derived from a Timer_B7 peripheral
pub struct PwmParts7 {
    /// PWM pin 1 (derived from capture-compare register 1)
    pub pwm1: Pwm<CCR1>,
    /// PWM pin 2 (derived from capture-compare register 2)
    pub pwm2: Pwm<CCR2>,
    /// PWM pin 3 (derived from capture-compare register 3)
    pub pwm3: Pwm<CCR3>,
    /// PWM pin 4 (derived from capture-compare register 4)
    pub pwm4: Pwm<CCR4>,
    /// PWM pin 5 (derived from capture-compare register 5)
    pub pwm5: Pwm<CCR5>,
    /// PWM pin 6 (derived from capture-compare register 6)
    pub pwm6: Pwm<CCR6>,
}

impl PwmParts7 {
    /// Create PWM pins with the same period
    pub fn new(timer: TimerB7, config: TimerConfig, period: u16) -> Self {
        setup_pwm(&timer, config, period);
        let parts = unsafe {
            Self {
                pwm1: Pwm::new(timer.alias()),
                pwm2: Pwm::new(timer.alias()),
                pwm3: Pwm::new(timer.alias()),
                pwm4: Pwm::new(timer.alias()),
                pwm5: Pwm::new(timer.alias()),
                pwm6: Pwm::new(timer.alias()),
            }
        };
        // Start the timer to run PWM
        timer.upmode();
        parts
    }
}

/// A PWM pin
pub struct Pwm<C> {
    timer: TimerB7,
    outmod: Outmod,
    enabled: bool,
    _ccrn: PhantomData<C>,
}

impl<C> Pwm<C>
where
    TimerB7: CCRn<C>,
{
    fn new(timer: TimerB7) -> Self {
        CCRn::<C>::set_ccrn(&timer, 0);
        CCRn::<C>::config_outmod(&timer, Outmod::ResetSet);
        Pwm {
            timer,
            outmod: Outmod::ResetSet,
            enabled: true,
            _ccrn: PhantomData,
        }
    }

    /// Set the number of cycles the output spends in its active phase each period
    #[inline]
    pub fn set_duty(&mut self, duty: u16) {
        CCRn::<C>::set_ccrn(&self.timer, duty);
    }

    /// Current duty cycle in timer cycles
    #[inline]
    pub fn duty(&self) -> u16 {
        CCRn::<C>::get_ccrn(&self.timer)
    }

    /// Maximum valid duty is equal to the period. If number of duty cycles exceeds number of
    /// period cycles, then signal stays high (equivalent to 100% duty cycle).
    #[inline]
    pub fn max_duty(&self) -> u16 {
        CCRn::<CCR0>::get_ccrn(&self.timer)
    }

    /// Change the output mode used while the pin is enabled. Reset/set produces a signal that is
    /// high for `duty` cycles at the start of each period.
    #[inline]
    pub fn set_output_mode(&mut self, outmod: Outmod) {
        self.outmod = outmod;
        if self.enabled {
            CCRn::<C>::config_outmod(&self.timer, outmod);
        }
    }

    /// Select when a new duty cycle takes effect. Loading on zero avoids glitches when the duty
    /// cycle is changed mid-period.
    #[inline]
    pub fn set_latch_load(&mut self, clld: Clld) {
        CCRn::<C>::config_clld(&self.timer, clld);
    }

    /// Drive the output low regardless of the duty cycle
    #[inline]
    pub fn disable(&mut self) {
        CCRn::<C>::out_wr(&self.timer, false);
        CCRn::<C>::config_outmod(&self.timer, Outmod::Out);
        self.enabled = false;
    }

    /// Resume generating the PWM signal
    #[inline]
    pub fn enable(&mut self) {
        CCRn::<C>::config_outmod(&self.timer, self.outmod);
        self.enabled = true;
    }

    /// Check whether the pin is generating its PWM signal
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl<C> ErrorType for Pwm<C>
where
    TimerB7: CCRn<C>,
{
    type Error = Infallible;
}

impl<C> SetDutyCycle for Pwm<C>
where
    TimerB7: CCRn<C>,
{
    #[inline]
    fn max_duty_cycle(&self) -> u16 {
        CCRn::<CCR0>::get_ccrn(&self.timer)
    }

    #[inline]
    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        self.set_duty(duty);
        Ok(())
    }
}

#[cfg(feature = "embedded-hal-02")]
mod ehal02 {
    use super::{CCRn, Pwm, TimerB7};
    use embedded_hal_02::PwmPin;

    impl<C> PwmPin for Pwm<C>
    where
        TimerB7: CCRn<C>,
    {
        /// Number of cycles
        type Duty = u16;

        #[inline]
        fn set_duty(&mut self, duty: Self::Duty) {
            Pwm::set_duty(self, duty);
        }

        #[inline]
        fn get_duty(&self) -> Self::Duty {
            self.duty()
        }

        #[inline]
        fn get_max_duty(&self) -> Self::Duty {
            self.max_duty()
        }

        #[inline]
        fn disable(&mut self) {
            Pwm::disable(self);
        }

        #[inline]
        fn enable(&mut self) {
            Pwm::enable(self);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw_traits::timerb::{fake::FakeBlock, Tbcctl, Tbctl, TBXCTL};

    fn outmod_bits(timer: &TimerB7, cctl: usize) -> u16 {
        (timer.read(cctl) & Tbcctl::OUTMOD.bits()) >> 5
    }

    #[test]
    fn new_port_runs_in_up_mode() {
        let mut block = FakeBlock::new();
        let parts = PwmParts7::new(block.periph(), TimerConfig::smclk(), 1000);
        let timer = &parts.pwm1.timer;

        assert_eq!(timer.read(0x12), 1000);
        assert_eq!(timer.read(TBXCTL) & Tbctl::MC.bits(), 1 << 4);
        for &cctl in &[0x04, 0x06, 0x08, 0x0A, 0x0C, 0x0E] {
            assert_eq!(outmod_bits(timer, cctl), Outmod::ResetSet as u16);
        }
        assert_eq!(parts.pwm6.duty(), 0);
        assert_eq!(parts.pwm3.max_duty(), 1000);
    }

    #[test]
    fn duty_cycle() {
        let mut block = FakeBlock::new();
        let mut parts = PwmParts7::new(block.periph(), TimerConfig::aclk(), 500);

        parts.pwm2.set_duty_cycle_percent(50).unwrap();
        assert_eq!(parts.pwm2.duty(), 250);
        assert_eq!(parts.pwm2.max_duty_cycle(), 500);

        parts.pwm4.set_duty(123);
        assert_eq!(parts.pwm4.timer.read(0x1A), 123);
    }

    #[test]
    fn disable_forces_output_low() {
        let mut block = FakeBlock::new();
        let mut parts = PwmParts7::new(block.periph(), TimerConfig::aclk(), 500);
        let pwm = &mut parts.pwm5;

        pwm.disable();
        assert!(!pwm.is_enabled());
        assert_eq!(outmod_bits(&pwm.timer, 0x0C), Outmod::Out as u16);
        assert!(!Tbcctl::from_bits_retain(pwm.timer.read(0x0C)).contains(Tbcctl::OUT));

        // Mode changes while disabled apply on the next enable
        pwm.set_output_mode(Outmod::SetReset);
        assert_eq!(outmod_bits(&pwm.timer, 0x0C), Outmod::Out as u16);
        pwm.enable();
        assert!(pwm.is_enabled());
        assert_eq!(outmod_bits(&pwm.timer, 0x0C), Outmod::SetReset as u16);
    }
}
